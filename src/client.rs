//! CreoleCentric REST client: job submission, polling, and catalog queries.

use std::time::Duration;

use reqwest::header::HeaderMap;
use reqwest::Method;
use serde::de::DeserializeOwned;
use tokio::time::Instant;

use crate::config::ClientConfig;
use crate::error::{CreoleError, Result};
use crate::http::{api_key_headers, join_url, json_headers, shared_client, status_to_error};
use crate::types::{
    CancelResponse, CreateJobRequest, CreditBalance, HealthStatus, JobDetails, JobHandle, JobList,
    JobStatusResponse, Model, UserProfile, Voice, VoiceSettings,
};
use crate::util::retry::jittered;
use crate::util::timeout::with_timeout;

/// How the gap between status polls evolves.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PollBackoff {
    /// Poll every `poll_interval`.
    #[default]
    Fixed,
    /// Grow the interval by `multiplier` after each poll (with ±25% jitter),
    /// capped at `max_interval`.
    Jittered {
        multiplier: f64,
        max_interval: Duration,
    },
}

impl PollBackoff {
    fn next_interval(&self, current: Duration) -> Duration {
        match *self {
            Self::Fixed => current,
            Self::Jittered {
                multiplier,
                max_interval,
            } => {
                let grown = Duration::from_secs_f64(current.as_secs_f64() * multiplier.max(1.0));
                jittered(grown).min(max_interval)
            }
        }
    }
}

/// Options for [`CreoleClient::wait_for_job`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub backoff: PollBackoff,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(2),
            backoff: PollBackoff::Fixed,
        }
    }
}

impl WaitOptions {
    pub fn new(timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            timeout,
            poll_interval,
            backoff: PollBackoff::Fixed,
        }
    }

    pub fn with_backoff(mut self, backoff: PollBackoff) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Client for the CreoleCentric TTS API.
#[derive(Debug, Clone)]
pub struct CreoleClient {
    config: ClientConfig,
}

impl CreoleClient {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    /// Build a client from `CREOLECENTRIC_*` environment variables.
    ///
    /// Fails if no API key is configured.
    pub fn from_env() -> Result<Self> {
        let config = ClientConfig::from_env()?;
        config.require_api_key()?;
        Ok(Self::new(config))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Health, account, catalog
    // ---------------------------------------------------------------------

    /// `GET /health/`. Works without an API key.
    pub async fn check_health(&self) -> Result<HealthStatus> {
        self.get("/health/", &[], false).await
    }

    pub async fn get_credit_balance(&self) -> Result<CreditBalance> {
        self.get("/credits/balance/", &[], true).await
    }

    pub async fn get_user_info(&self) -> Result<UserProfile> {
        self.get("/users/profile/", &[], true).await
    }

    pub async fn get_voices(&self) -> Result<Vec<Voice>> {
        self.get("/tts/voices/", &[], true).await
    }

    pub async fn get_models(&self) -> Result<Vec<Model>> {
        self.get("/tts/models/", &[], true).await
    }

    pub async fn get_voice_settings(&self) -> Result<VoiceSettings> {
        self.get("/tts/voice-settings/", &[], true).await
    }

    // ---------------------------------------------------------------------
    // Jobs
    // ---------------------------------------------------------------------

    /// Submit a synthesis job.
    pub async fn create_job(&self, request: &CreateJobRequest) -> Result<JobHandle> {
        validate_job_request(request)?;
        let body = serde_json::to_value(request)?;
        let handle: JobHandle = self
            .send(Method::POST, "/tts/jobs/", &[], Some(&body), true)
            .await?;
        tracing::info!(
            job_id = %handle.job_id,
            status = %handle.status,
            credits_used = ?handle.credits_used,
            "TTS job created"
        );
        Ok(handle)
    }

    pub async fn get_job_status(&self, job_id: &str) -> Result<JobStatusResponse> {
        let endpoint = job_endpoint(job_id, "status/")?;
        self.get(&endpoint, &[], true).await
    }

    pub async fn get_job_details(&self, job_id: &str) -> Result<JobDetails> {
        let endpoint = job_endpoint(job_id, "")?;
        self.get(&endpoint, &[], true).await
    }

    pub async fn list_jobs(&self, limit: u32, offset: u32) -> Result<JobList> {
        let query = [("limit", limit.to_string()), ("offset", offset.to_string())];
        self.get("/tts/jobs/list/", &query, true).await
    }

    /// Cancel a pending or processing job.
    pub async fn cancel_job(&self, job_id: &str) -> Result<CancelResponse> {
        let endpoint = job_endpoint(job_id, "cancel/")?;
        let response: CancelResponse = self
            .send(Method::POST, &endpoint, &[], None, true)
            .await?;
        tracing::info!(job_id, status = ?response.status, "TTS job cancel requested");
        Ok(response)
    }

    /// Poll until the job reaches a terminal status or `options.timeout` elapses.
    ///
    /// Sleeps never extend past the deadline and one final poll happens at
    /// the deadline. Every poll, retries included, must answer before
    /// `deadline + poll_interval`, so the call returns within
    /// `timeout + poll_interval`. Giving up yields
    /// [`CreoleError::PollTimeout`]; a single failed request keeps its own
    /// error.
    pub async fn wait_for_job(
        &self,
        job_id: &str,
        options: WaitOptions,
    ) -> Result<JobStatusResponse> {
        let deadline = Instant::now() + options.timeout;
        let poll_cutoff = deadline + options.poll_interval;
        let mut interval = options.poll_interval;

        loop {
            let status =
                match tokio::time::timeout_at(poll_cutoff, self.get_job_status(job_id)).await {
                    Ok(result) => result?,
                    Err(_) => {
                        tracing::warn!(job_id, "Status poll still pending at the wait deadline");
                        return Err(poll_timeout(job_id, options.timeout));
                    }
                };
            if status.status.is_terminal() {
                tracing::info!(job_id, status = %status.status, "Job finished");
                return Ok(status);
            }

            tracing::info!(job_id, status = %status.status, "Job still in progress");

            let now = Instant::now();
            if now >= deadline {
                tracing::warn!(
                    job_id,
                    timeout_secs = options.timeout.as_secs_f64(),
                    "Job did not complete in time"
                );
                return Err(poll_timeout(job_id, options.timeout));
            }

            tokio::time::sleep(interval.min(deadline - now)).await;
            interval = options.backoff.next_interval(interval);
        }
    }

    /// Immediate synthesis for short texts; returns raw audio bytes.
    pub async fn express_tts(&self, text: &str, voice_id: &str) -> Result<Vec<u8>> {
        if text.trim().is_empty() {
            return Err(CreoleError::Validation("Text cannot be empty".to_string()));
        }
        let body = serde_json::json!({ "text": text, "voice_id": voice_id });
        let url = join_url(self.config.base_url(), "/tts/express/");
        let headers = self.headers(true)?;

        with_timeout(self.config.timeout, async {
            let response = shared_client()
                .post(url)
                .headers(headers)
                .json(&body)
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.unwrap_or_default();
                return Err(status_to_error(status.as_u16(), &text));
            }
            Ok(response.bytes().await?.to_vec())
        })
        .await
    }

    // ---------------------------------------------------------------------
    // Transport
    // ---------------------------------------------------------------------

    /// GETs are idempotent, so they go through the retry policy.
    async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        authenticated: bool,
    ) -> Result<T> {
        self.config
            .retry_policy
            .execute(|| self.send(Method::GET, endpoint, query, None, authenticated))
            .await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
        authenticated: bool,
    ) -> Result<T> {
        let url = join_url(self.config.base_url(), endpoint);
        let headers = self.headers(authenticated)?;

        tracing::debug!(%method, %url, "Sending API request");

        with_timeout(self.config.timeout, async {
            let mut request = shared_client()
                .request(method, url)
                .headers(headers)
                .query(query);
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;

            if !status.is_success() {
                tracing::debug!(status = status.as_u16(), body = %text, "API request failed");
                return Err(status_to_error(status.as_u16(), &text));
            }

            parse_body(&text)
        })
        .await
    }

    fn headers(&self, authenticated: bool) -> Result<HeaderMap> {
        if authenticated {
            Ok(api_key_headers(self.config.require_api_key()?))
        } else {
            Ok(match self.config.api_key() {
                Some(key) => api_key_headers(key),
                None => json_headers(),
            })
        }
    }
}

fn poll_timeout(job_id: &str, timeout: Duration) -> CreoleError {
    CreoleError::PollTimeout {
        job_id: job_id.to_string(),
        timeout_ms: timeout.as_millis() as u64,
    }
}

/// Empty 2xx bodies decode as `{}`.
fn parse_body<T: DeserializeOwned>(text: &str) -> Result<T> {
    if text.trim().is_empty() {
        return Ok(serde_json::from_str("{}")?);
    }
    Ok(serde_json::from_str(text)?)
}

fn validate_job_request(request: &CreateJobRequest) -> Result<()> {
    if request.text.trim().is_empty() {
        return Err(CreoleError::Validation("Text cannot be empty".to_string()));
    }
    if request.voice_id.trim().is_empty() {
        return Err(CreoleError::Validation("Voice id cannot be empty".to_string()));
    }
    if request.model_id.trim().is_empty() {
        return Err(CreoleError::Validation("Model id cannot be empty".to_string()));
    }
    Ok(())
}

fn job_endpoint(job_id: &str, suffix: &str) -> Result<String> {
    let job_id = job_id.trim();
    if job_id.is_empty() {
        return Err(CreoleError::Validation("Job id cannot be empty".to_string()));
    }
    if job_id.contains(['/', '?', '#']) {
        return Err(CreoleError::Validation(format!(
            "Job id contains invalid characters: {job_id}"
        )));
    }
    Ok(format!("/tts/jobs/{job_id}/{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_endpoint_builds_paths() {
        assert_eq!(job_endpoint("abc", "status/").unwrap(), "/tts/jobs/abc/status/");
        assert_eq!(job_endpoint("abc", "").unwrap(), "/tts/jobs/abc/");
    }

    #[test]
    fn job_endpoint_rejects_path_injection() {
        assert!(matches!(
            job_endpoint("../credits", "status/"),
            Err(CreoleError::Validation(_))
        ));
        assert!(matches!(job_endpoint("  ", ""), Err(CreoleError::Validation(_))));
    }

    #[test]
    fn fixed_backoff_keeps_interval() {
        let d = Duration::from_secs(2);
        assert_eq!(PollBackoff::Fixed.next_interval(d), d);
    }

    #[test]
    fn jittered_backoff_is_capped() {
        let backoff = PollBackoff::Jittered {
            multiplier: 4.0,
            max_interval: Duration::from_secs(5),
        };
        let next = backoff.next_interval(Duration::from_secs(2));
        assert_eq!(next, Duration::from_secs(5));
    }

    #[test]
    fn empty_body_decodes_as_object() {
        let parsed: CancelResponse = parse_body("").unwrap();
        assert_eq!(parsed, CancelResponse::default());
    }
}
