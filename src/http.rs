//! Shared HTTP client and API-key auth utilities.

use std::sync::OnceLock;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use crate::error::CreoleError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// Per-request deadlines are applied by callers with
/// [`with_timeout`](crate::util::timeout::with_timeout), so the client itself
/// only carries a generous connect timeout.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new())
    })
}

/// Build default headers for the CreoleCentric `ApiKey` scheme.
pub fn api_key_headers(api_key: &str) -> HeaderMap {
    let mut headers = json_headers();
    if let Ok(val) = HeaderValue::from_str(&format!("ApiKey {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// Headers for unauthenticated JSON requests.
pub fn json_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers
}

/// Map a non-2xx HTTP status to an error.
pub fn status_to_error(status: u16, body: &str) -> CreoleError {
    match status {
        401 | 403 => CreoleError::Authentication(extract_detail(body)),
        429 => CreoleError::RateLimited(extract_detail(body)),
        _ => CreoleError::api(status, body),
    }
}

/// Pull a human-readable message out of a DRF-style `{"detail": ...}` body.
fn extract_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("detail")
                .or_else(|| v.get("error"))
                .and_then(|d| d.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

/// Join a base URL and an endpoint path without doubling slashes.
pub fn join_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_header_uses_apikey_scheme() {
        let headers = api_key_headers("cc_test");
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "ApiKey cc_test");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn status_401_maps_to_authentication_with_detail() {
        let err = status_to_error(401, r#"{"detail":"Invalid API key"}"#);
        assert!(matches!(err, CreoleError::Authentication(msg) if msg == "Invalid API key"));
    }

    #[test]
    fn other_status_keeps_raw_body() {
        let err = status_to_error(404, "not here");
        assert!(matches!(err, CreoleError::Api { status: 404, body } if body == "not here"));
    }

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(
            join_url("https://x.test/api/v1/", "/tts/jobs/"),
            "https://x.test/api/v1/tts/jobs/"
        );
        assert_eq!(join_url("http://h", "health/"), "http://h/health/");
    }
}
