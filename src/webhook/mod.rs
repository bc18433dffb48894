//! Webhook receiver for job-progress notifications.
//!
//! The service pushes `tts_*` events at least once per transition. The
//! [`WebhookReceiver`] records every structurally valid delivery in an
//! ordered, bounded [`EventStore`], folds it into a per-job [`JobState`],
//! and runs best-effort side effects such as downloading delivered audio.

pub mod download;
pub mod event;
pub mod receiver;
#[cfg(feature = "server")]
pub mod server;
pub mod store;
pub mod tracker;

pub use download::{AudioDownloader, AudioSink, DownloadStatus, FileAudioSink, Schedule};
pub use event::{WebhookDetails, WebhookEvent, WebhookEventKind, WebhookPayload};
pub use receiver::{HealthReport, IngestOutcome, JobView, WebhookReceiver};
pub use store::{EventStore, RetentionPolicy, StoreStats};
pub use tracker::{JobRecord, JobState, JobTracker, Transition};
