//! TTS job types: status, requests, and service responses.

use std::fmt;
use std::str::FromStr;

use bon::Builder;
use serde::{Deserialize, Serialize};
use strum::EnumString;

/// Free-form JSON fields the service may add to a response.
pub type ExtraFields = serde_json::Map<String, serde_json::Value>;

/// Job status as reported by `GET /tts/jobs/{id}/status/`.
///
/// Unknown statuses are kept verbatim in [`JobStatus::Other`] so a newer
/// service never breaks status decoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum JobStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
    #[strum(default)]
    Other(String),
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "pending",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Other(s) => s,
        }
    }

    /// Whether polling should stop at this status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl Default for JobStatus {
    fn default() -> Self {
        Self::Other("unknown".to_string())
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match JobStatus::from_str(&value) {
            Ok(status) => status,
            Err(_) => Self::Other(value),
        }
    }
}

impl From<JobStatus> for String {
    fn from(value: JobStatus) -> Self {
        value.as_str().to_string()
    }
}

/// Body of `POST /tts/jobs/`.
///
/// ```
/// use creolecentric::types::CreateJobRequest;
///
/// let request = CreateJobRequest::builder()
///     .text("Bonjou!")
///     .voice_id("voice_2")
///     .speed(1.1)
///     .build();
/// assert_eq!(request.model_id, "model_1");
/// ```
#[derive(Debug, Clone, Builder, Serialize, Deserialize, PartialEq)]
pub struct CreateJobRequest {
    #[builder(into)]
    pub text: String,
    #[builder(into, default = String::from("voice_1"))]
    pub voice_id: String,
    #[builder(into, default = String::from("model_1"))]
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f64>,
    /// Where the service should push progress events for this job.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub webhook_url: Option<String>,
    /// Any further options, flattened into the request body.
    #[serde(flatten)]
    #[builder(default)]
    pub options: ExtraFields,
}

impl CreateJobRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self::builder().text(text).build()
    }
}

/// Response of `POST /tts/jobs/`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobHandle {
    pub job_id: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub credits_used: Option<f64>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Response of `GET /tts/jobs/{id}/status/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobStatusResponse {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Full job record from `GET /tts/jobs/{id}/` and the job list.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobDetails {
    #[serde(default)]
    pub job_id: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub voice_id: Option<String>,
    #[serde(default)]
    pub model_id: Option<String>,
    #[serde(default)]
    pub credits_used: Option<f64>,
    #[serde(default)]
    pub audio_url: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub completed_at: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Response of `GET /tts/jobs/list/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct JobList {
    #[serde(default)]
    pub results: Vec<JobDetails>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub next: Option<String>,
    #[serde(default)]
    pub previous: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Response of `POST /tts/jobs/{id}/cancel/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CancelResponse {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_parses_known_and_unknown_values() {
        assert_eq!(JobStatus::from("completed".to_string()), JobStatus::Completed);
        assert_eq!(JobStatus::from("CANCELLED".to_string()), JobStatus::Cancelled);
        assert_eq!(
            JobStatus::from("warming_up".to_string()),
            JobStatus::Other("warming_up".to_string())
        );
        assert_eq!(JobStatus::Other("x".into()).to_string(), "x");
    }

    #[test]
    fn only_completed_failed_cancelled_are_terminal() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(!JobStatus::Other("delivered".into()).is_terminal());
    }

    #[test]
    fn create_request_flattens_extra_options() {
        let mut options = ExtraFields::new();
        options.insert("output_format".into(), json!("wav"));
        let request = CreateJobRequest::builder()
            .text("Bonjou")
            .options(options)
            .build();

        let body = serde_json::to_value(&request).unwrap();
        assert_eq!(
            body,
            json!({
                "text": "Bonjou",
                "voice_id": "voice_1",
                "model_id": "model_1",
                "output_format": "wav"
            })
        );
    }

    #[test]
    fn status_response_tolerates_missing_fields() {
        let parsed: JobStatusResponse =
            serde_json::from_value(json!({"status": "processing", "eta": 3})).unwrap();
        assert_eq!(parsed.status, JobStatus::Processing);
        assert_eq!(parsed.audio_url, None);
        assert_eq!(parsed.extra.get("eta"), Some(&json!(3)));
    }
}
