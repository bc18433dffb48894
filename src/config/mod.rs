//! Configuration (layered: code > env > `.env` file).

pub mod receiver;

pub use receiver::ReceiverConfig;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{CreoleError, Result};
use crate::util::retry::RetryPolicy;

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://creolecentric.com/api/v1";
/// Per-request deadline used when nothing else is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub const API_KEY_VAR: &str = "CREOLECENTRIC_API_KEY";
pub const API_URL_VAR: &str = "CREOLECENTRIC_API_URL";
pub const TIMEOUT_VAR: &str = "CREOLECENTRIC_TIMEOUT_SECS";

/// Settings for [`CreoleClient`](crate::client::CreoleClient).
#[derive(Clone)]
pub struct ClientConfig {
    api_key: Option<String>,
    base_url: String,
    pub timeout: Duration,
    pub retry_policy: RetryPolicy,
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &self.api_key.as_deref().map(redact))
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .field("retry_policy", &self.retry_policy)
            .finish()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::default().with_api_key(api_key)
    }

    /// Load from `CREOLECENTRIC_*` environment variables, reading `.env` first.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(key) = non_empty(lookup(API_KEY_VAR)) {
            config.api_key = Some(key);
        }
        if let Some(url) = non_empty(lookup(API_URL_VAR)) {
            config = config.with_base_url(url);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, TIMEOUT_VAR)? {
            config.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    /// The API key, or a configuration error naming the variable to set.
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(CreoleError::Configuration(format!(
                "{API_KEY_VAR} environment variable not set"
            ))),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Show only the first characters of a secret.
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(6).collect();
    format!("{prefix}...")
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse an optional variable, rejecting present-but-invalid values.
pub(crate) fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match non_empty(lookup(name)) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            CreoleError::Configuration(format!("{name} has invalid value '{raw}': {e}"))
        }),
    }
}
