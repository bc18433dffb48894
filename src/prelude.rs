//! Convenience re-exports for common use.

pub use crate::client::{CreoleClient, PollBackoff, WaitOptions};
pub use crate::config::{ClientConfig, ReceiverConfig};
pub use crate::error::{CreoleError, Result};
pub use crate::types::{CreateJobRequest, JobHandle, JobStatus, JobStatusResponse};
pub use crate::webhook::{JobState, RetentionPolicy, WebhookEvent, WebhookReceiver};
