//! Webhook ingestion: validate, record, reconcile, dispatch.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;

use super::download::{AudioDownloader, DownloadStatus, FileAudioSink, Schedule};
use super::event::{WebhookEvent, WebhookEventKind, WebhookPayload};
use super::store::{EventStore, RetentionPolicy, StoreStats};
use super::tracker::{JobRecord, JobTracker, Transition};
use crate::config::ReceiverConfig;
use crate::error::Result;

/// Result of a successful [`WebhookReceiver::ingest`].
#[derive(Debug, Clone, PartialEq)]
pub struct IngestOutcome {
    pub event: WebhookEvent,
    pub transition: Transition,
    /// Set when the event was accepted but looked wrong (unknown type, stale).
    pub warning: Option<String>,
    pub download: Option<Schedule>,
}

impl IngestOutcome {
    pub fn message(&self) -> String {
        format!("Webhook {} processed", self.event.kind)
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub events_received: u64,
    pub events_retained: usize,
    pub jobs_tracked: usize,
}

/// Reconciled job view returned by [`WebhookReceiver::job_view`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobView {
    #[serde(flatten)]
    pub record: JobRecord,
    pub download: Option<DownloadStatus>,
}

/// Owns the event log, the job tracker, and the audio downloader.
///
/// Built once at server start and shared with every handler.
#[derive(Debug)]
pub struct WebhookReceiver {
    store: EventStore,
    tracker: JobTracker,
    downloader: Option<Arc<AudioDownloader>>,
}

impl Default for WebhookReceiver {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}

impl WebhookReceiver {
    /// A receiver without audio downloads.
    pub fn new(retention: RetentionPolicy) -> Self {
        Self {
            store: EventStore::new(retention),
            tracker: JobTracker::new(),
            downloader: None,
        }
    }

    pub fn from_config(config: &ReceiverConfig) -> Self {
        let receiver = Self::new(config.retention);
        if config.download_audio {
            let sink = Arc::new(FileAudioSink::new(config.download_dir.clone()));
            let downloader = AudioDownloader::new(sink, config.download_timeout)
                .with_max_bytes(config.download_max_bytes);
            receiver.with_downloader(Arc::new(downloader))
        } else {
            receiver
        }
    }

    pub fn with_downloader(mut self, downloader: Arc<AudioDownloader>) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn downloader(&self) -> Option<&Arc<AudioDownloader>> {
        self.downloader.as_ref()
    }

    /// Accept a raw request body.
    ///
    /// Fails only for malformed bodies, which are never recorded. Everything
    /// structurally valid is appended, including unknown event types.
    pub fn ingest(&self, body: &[u8]) -> Result<IngestOutcome> {
        match WebhookPayload::parse(body) {
            Ok(payload) => Ok(self.ingest_payload(payload)),
            Err(e) => {
                tracing::warn!(error = %e, "Rejected webhook");
                Err(e)
            }
        }
    }

    pub fn ingest_payload(&self, payload: WebhookPayload) -> IngestOutcome {
        let (event, transition) = self
            .store
            .append_with(payload, |event| self.tracker.apply(event));

        tracing::info!(
            event = %event.kind,
            job_id = %event.job_id,
            status = event.status.as_deref().unwrap_or("unknown"),
            sequence = event.sequence,
            "Received webhook"
        );

        let mut warning = None;
        if !event.kind.is_recognized() {
            tracing::warn!(event = %event.kind, job_id = %event.job_id, "Unknown event type");
            warning = Some(format!("Unknown event type: {}", event.kind));
        }

        let download = match transition {
            Transition::Stale { current, attempted } => {
                tracing::warn!(
                    event = %event.kind,
                    job_id = %event.job_id,
                    %current,
                    %attempted,
                    "Stale webhook ignored for job state"
                );
                warning.get_or_insert_with(|| {
                    format!("Stale event: job {} is already {current}", event.job_id)
                });
                None
            }
            Transition::Duplicate { state } => {
                tracing::info!(job_id = %event.job_id, %state, "Duplicate webhook delivery");
                self.dispatch(&event)
            }
            Transition::Advanced { .. } | Transition::Ignored { .. } => self.dispatch(&event),
        };
        self.prune();

        IngestOutcome {
            event,
            transition,
            warning,
            download,
        }
    }

    /// Per-kind handling. Side effects are best-effort and never fail ingest.
    fn dispatch(&self, event: &WebhookEvent) -> Option<Schedule> {
        let job_id = event.job_id.as_str();
        let details = &event.details;
        match &event.kind {
            WebhookEventKind::Queued => {
                tracing::info!(job_id, queue_position = ?details.queue_position, "Job queued");
                None
            }
            WebhookEventKind::Started => {
                tracing::info!(job_id, "Job processing started");
                None
            }
            WebhookEventKind::Synthesized => {
                tracing::info!(job_id, duration_seconds = ?details.duration_seconds, "Job synthesized");
                None
            }
            WebhookEventKind::Uploaded => {
                tracing::info!(job_id, s3_url = ?details.s3_url, "Job audio uploaded");
                None
            }
            WebhookEventKind::Delivered => {
                tracing::info!(
                    job_id,
                    audio_url = ?details.audio_file_url,
                    s3_url = ?details.s3_url,
                    duration_seconds = ?details.duration_seconds,
                    credits_used = ?details.credits_used,
                    "Job completed successfully"
                );
                let url = details.audio_file_url.as_deref()?;
                let downloader = self.downloader.as_ref()?;
                Some(downloader.schedule(job_id, url))
            }
            WebhookEventKind::Failed => {
                tracing::error!(
                    job_id,
                    error_message = details.error_message.as_deref().unwrap_or("Unknown error"),
                    "Job failed"
                );
                None
            }
            WebhookEventKind::Unrecognized(_) => None,
        }
    }

    /// Drop per-job state for jobs whose events have all left the log.
    fn prune(&self) {
        self.store.prune_orphans(|job_id| {
            self.tracker.forget(job_id);
            if let Some(downloader) = &self.downloader {
                downloader.forget(job_id);
            }
            tracing::debug!(job_id, "Job state evicted with its last event");
        });
    }

    /// Every retained event, oldest first.
    pub fn all_events(&self) -> Vec<WebhookEvent> {
        self.store.snapshot()
    }

    pub fn events_for_job(&self, job_id: &str) -> Vec<WebhookEvent> {
        self.store.for_job(job_id)
    }

    pub fn recent_events(&self, limit: usize) -> Vec<WebhookEvent> {
        self.store.recent(limit)
    }

    pub fn job_state(&self, job_id: &str) -> Option<JobRecord> {
        self.prune();
        self.tracker.get(job_id)
    }

    pub fn job_view(&self, job_id: &str) -> Option<JobView> {
        self.prune();
        let record = self.tracker.get(job_id)?;
        let download = self.downloader.as_ref().and_then(|d| d.status(job_id));
        Some(JobView { record, download })
    }

    pub fn stats(&self) -> StoreStats {
        self.store.stats()
    }

    pub fn health(&self) -> HealthReport {
        self.prune();
        let stats = self.store.stats();
        HealthReport {
            status: "healthy",
            events_received: stats.received,
            events_retained: stats.retained,
            jobs_tracked: self.tracker.len(),
        }
    }

    /// Let in-flight downloads finish (bounded by `grace`).
    pub async fn shutdown(&self, grace: Duration) {
        if let Some(downloader) = &self.downloader {
            downloader.shutdown(grace).await;
        }
        let stats = self.store.stats();
        tracing::info!(
            events_received = stats.received,
            events_retained = stats.retained,
            "Webhook receiver stopped"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CreoleError;
    use crate::webhook::tracker::JobState;

    #[test]
    fn malformed_body_is_rejected_and_not_logged() {
        let receiver = WebhookReceiver::default();
        let err = receiver.ingest(b"definitely not json").unwrap_err();
        assert!(matches!(err, CreoleError::MalformedWebhook(_)));
        assert!(receiver.all_events().is_empty());
        assert_eq!(receiver.health().events_received, 0);
    }

    #[test]
    fn unknown_event_is_accepted_with_warning() {
        let receiver = WebhookReceiver::default();
        let outcome = receiver
            .ingest(br#"{"event":"tts_mystery","job_id":"j1","extra":[1,2]}"#)
            .unwrap();

        assert_eq!(outcome.warning.as_deref(), Some("Unknown event type: tts_mystery"));
        assert_eq!(outcome.message(), "Webhook tts_mystery processed");
        let events = receiver.all_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].payload["extra"], serde_json::json!([1, 2]));
    }

    #[test]
    fn stale_event_is_logged_but_state_holds() {
        let receiver = WebhookReceiver::default();
        receiver
            .ingest(br#"{"event":"tts_delivered","job_id":"j1"}"#)
            .unwrap();
        let outcome = receiver
            .ingest(br#"{"event":"tts_started","job_id":"j1"}"#)
            .unwrap();

        assert!(outcome.transition.is_stale());
        assert!(outcome.warning.unwrap().contains("already delivered"));
        assert_eq!(receiver.events_for_job("j1").len(), 2);
        assert_eq!(receiver.job_state("j1").unwrap().state, JobState::Delivered);
    }

    #[test]
    fn delivered_without_downloader_schedules_nothing() {
        let receiver = WebhookReceiver::default();
        let outcome = receiver
            .ingest(br#"{"event":"tts_delivered","job_id":"j1","audio_file_url":"http://x/a.mp3"}"#)
            .unwrap();
        assert_eq!(outcome.download, None);
    }

    #[test]
    fn job_state_is_bounded_by_retention() {
        let receiver = WebhookReceiver::new(RetentionPolicy {
            max_events: 2,
            max_age: None,
        });
        for i in 0..500 {
            let body = format!(r#"{{"event":"tts_queued","job_id":"job-{i}"}}"#);
            receiver.ingest(body.as_bytes()).unwrap();
        }

        let health = receiver.health();
        assert_eq!(health.events_retained, 2);
        assert_eq!(health.jobs_tracked, 2);
        assert!(receiver.job_state("job-0").is_none());
        assert_eq!(receiver.job_state("job-499").unwrap().state, JobState::Queued);
    }

    #[test]
    fn job_with_a_retained_event_keeps_its_state() {
        let receiver = WebhookReceiver::new(RetentionPolicy {
            max_events: 2,
            max_age: None,
        });
        receiver.ingest(br#"{"event":"tts_queued","job_id":"a"}"#).unwrap();
        receiver.ingest(br#"{"event":"tts_started","job_id":"a"}"#).unwrap();
        receiver.ingest(br#"{"event":"tts_queued","job_id":"b"}"#).unwrap();

        assert_eq!(receiver.job_state("a").unwrap().state, JobState::Processing);
        assert_eq!(receiver.health().jobs_tracked, 2);
    }
}
