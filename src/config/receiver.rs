//! Webhook receiver configuration.

use std::path::PathBuf;
use std::time::Duration;

use super::parse_var;
use crate::error::Result;
use crate::webhook::download::DEFAULT_MAX_AUDIO_BYTES;
use crate::webhook::store::RetentionPolicy;

/// Webhook receiver configuration loaded from environment variables.
///
/// | Env Var                          | Default     |
/// |----------------------------------|-------------|
/// | `HOST`                           | `0.0.0.0`   |
/// | `PORT`                           | `5000`      |
/// | `WEBHOOK_DOWNLOAD_DIR`           | `downloads` |
/// | `WEBHOOK_DOWNLOAD_AUDIO`         | `true`      |
/// | `WEBHOOK_DOWNLOAD_TIMEOUT_SECS`  | `60`        |
/// | `WEBHOOK_MAX_DOWNLOAD_BYTES`     | 100 MiB     |
/// | `WEBHOOK_MAX_EVENTS`             | `10000`     |
/// | `WEBHOOK_MAX_EVENT_AGE_SECS`     | unset       |
/// | `REQUEST_TIMEOUT_SECS`           | `30`        |
#[derive(Debug, Clone)]
pub struct ReceiverConfig {
    pub host: String,
    pub port: u16,
    pub download_dir: PathBuf,
    pub download_audio: bool,
    pub download_timeout: Duration,
    pub download_max_bytes: u64,
    pub retention: RetentionPolicy,
    pub request_timeout_secs: u64,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            download_dir: PathBuf::from("downloads"),
            download_audio: true,
            download_timeout: Duration::from_secs(60),
            download_max_bytes: DEFAULT_MAX_AUDIO_BYTES,
            retention: RetentionPolicy::default(),
            request_timeout_secs: 30,
        }
    }
}

impl ReceiverConfig {
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST").filter(|h| !h.trim().is_empty()) {
            config.host = host;
        }
        if let Some(port) = parse_var::<u16>(&lookup, "PORT")? {
            config.port = port;
        }
        if let Some(dir) = lookup("WEBHOOK_DOWNLOAD_DIR").filter(|d| !d.trim().is_empty()) {
            config.download_dir = PathBuf::from(dir);
        }
        if let Some(enabled) = parse_var::<bool>(&lookup, "WEBHOOK_DOWNLOAD_AUDIO")? {
            config.download_audio = enabled;
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "WEBHOOK_DOWNLOAD_TIMEOUT_SECS")? {
            config.download_timeout = Duration::from_secs(secs);
        }
        if let Some(bytes) = parse_var::<u64>(&lookup, "WEBHOOK_MAX_DOWNLOAD_BYTES")? {
            config.download_max_bytes = bytes;
        }
        if let Some(max) = parse_var::<usize>(&lookup, "WEBHOOK_MAX_EVENTS")? {
            config.retention.max_events = max.max(1);
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "WEBHOOK_MAX_EVENT_AGE_SECS")? {
            config.retention.max_age = Some(Duration::from_secs(secs));
        }
        if let Some(secs) = parse_var::<u64>(&lookup, "REQUEST_TIMEOUT_SECS")? {
            config.request_timeout_secs = secs;
        }

        Ok(config)
    }

    /// `host:port` for binding the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
