//! Service health, account, and catalog types.

use serde::{Deserialize, Serialize};

use super::job::ExtraFields;

/// Response of `GET /health/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Response of `GET /credits/balance/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CreditBalance {
    #[serde(default)]
    pub total_credits: f64,
    #[serde(default)]
    pub subscription_credits: f64,
    #[serde(default)]
    pub purchased_credits: f64,
    #[serde(default)]
    pub subscription_plan: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Response of `GET /users/profile/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// A voice from `GET /tts/voices/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Voice {
    pub voice_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// A model from `GET /tts/models/`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Model {
    pub model_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub extra: ExtraFields,
}

/// Voice settings configuration; the shape is owned by the service.
pub type VoiceSettings = serde_json::Value;
