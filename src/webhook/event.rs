//! Inbound webhook payloads and the immutable events recorded from them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::EnumString;
use uuid::Uuid;

use crate::error::{CreoleError, Result};

/// Job id recorded when a payload does not carry one.
pub const UNKNOWN_JOB_ID: &str = "unknown";

/// The closed set of event types the service sends, plus a fallback.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum WebhookEventKind {
    #[strum(serialize = "tts_queued")]
    Queued,
    #[strum(serialize = "tts_started")]
    Started,
    #[strum(serialize = "tts_synthesized")]
    Synthesized,
    #[strum(serialize = "tts_uploaded")]
    Uploaded,
    #[strum(serialize = "tts_delivered")]
    Delivered,
    #[strum(serialize = "tts_failed")]
    Failed,
    /// Any other `event` string, kept verbatim.
    #[strum(default)]
    Unrecognized(String),
}

impl WebhookEventKind {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "tts_queued",
            Self::Started => "tts_started",
            Self::Synthesized => "tts_synthesized",
            Self::Uploaded => "tts_uploaded",
            Self::Delivered => "tts_delivered",
            Self::Failed => "tts_failed",
            Self::Unrecognized(s) => s,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized(_))
    }
}

impl fmt::Display for WebhookEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for WebhookEventKind {
    fn from(value: String) -> Self {
        WebhookEventKind::from_str(&value).unwrap_or(Self::Unrecognized(value))
    }
}

impl From<WebhookEventKind> for String {
    fn from(value: WebhookEventKind) -> Self {
        value.as_str().to_string()
    }
}

/// Optional typed fields a payload may carry.
///
/// Decoded leniently: a field with an unexpected JSON type is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WebhookDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_position: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_file_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credits_used: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WebhookDetails {
    fn from_payload(payload: &serde_json::Map<String, serde_json::Value>) -> Self {
        fn field<T: serde::de::DeserializeOwned>(
            payload: &serde_json::Map<String, serde_json::Value>,
            name: &str,
        ) -> Option<T> {
            payload
                .get(name)
                .filter(|v| !v.is_null())
                .and_then(|v| serde_json::from_value(v.clone()).ok())
        }

        Self {
            queue_position: field(payload, "queue_position"),
            duration_seconds: field(payload, "duration_seconds"),
            s3_url: field(payload, "s3_url"),
            audio_file_url: field(payload, "audio_file_url"),
            credits_used: field(payload, "credits_used"),
            error_message: field(payload, "error_message"),
        }
    }
}

/// A structurally valid inbound payload, not yet recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookPayload {
    pub kind: WebhookEventKind,
    pub job_id: String,
    pub status: Option<String>,
    /// Sender-supplied timestamp, informational only.
    pub timestamp: Option<String>,
    pub details: WebhookDetails,
    pub raw: serde_json::Value,
}

impl WebhookPayload {
    /// Parse a request body.
    ///
    /// The body must be a JSON object with a string `event` field; anything
    /// else is a [`CreoleError::MalformedWebhook`].
    pub fn parse(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(CreoleError::MalformedWebhook("No data provided".to_string()));
        }
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| CreoleError::MalformedWebhook(format!("Invalid JSON: {e}")))?;
        Self::from_value(value)
    }

    pub fn from_value(raw: serde_json::Value) -> Result<Self> {
        let object = raw.as_object().ok_or_else(|| {
            CreoleError::MalformedWebhook("Payload must be a JSON object".to_string())
        })?;

        let kind = match object.get("event") {
            Some(serde_json::Value::String(event)) if !event.trim().is_empty() => {
                WebhookEventKind::from(event.clone())
            }
            Some(_) => {
                return Err(CreoleError::MalformedWebhook(
                    "Field 'event' must be a non-empty string".to_string(),
                ))
            }
            None => {
                return Err(CreoleError::MalformedWebhook(
                    "Missing 'event' field".to_string(),
                ))
            }
        };

        let job_id = match object.get("job_id") {
            Some(serde_json::Value::String(id)) if !id.is_empty() => id.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => UNKNOWN_JOB_ID.to_string(),
        };

        let text = |name: &str| object.get(name).and_then(|v| v.as_str()).map(str::to_string);

        Ok(Self {
            kind,
            job_id,
            status: text("status"),
            timestamp: text("timestamp"),
            details: WebhookDetails::from_payload(object),
            raw,
        })
    }
}

/// One accepted webhook delivery. Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: Uuid,
    /// Position in ingest order, strictly increasing.
    pub sequence: u64,
    #[serde(rename = "event")]
    pub kind: WebhookEventKind,
    pub job_id: String,
    pub status: Option<String>,
    pub timestamp: Option<String>,
    /// Stamped by the receiver; never taken from the payload.
    pub received_at: DateTime<Utc>,
    #[serde(flatten)]
    pub details: WebhookDetails,
    pub payload: serde_json::Value,
}

impl WebhookEvent {
    pub(crate) fn record(payload: WebhookPayload, sequence: u64, received_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence,
            kind: payload.kind,
            job_id: payload.job_id,
            status: payload.status,
            timestamp: payload.timestamp,
            received_at,
            details: payload.details,
            payload: payload.raw,
        }
    }
}
