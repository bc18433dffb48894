//! Per-job state reconciliation from webhook events.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::{WebhookEvent, WebhookEventKind};

/// Locally reconciled job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Unknown,
    Queued,
    Processing,
    Synthesized,
    Uploaded,
    Delivered,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed | Self::Cancelled)
    }

    /// Position on the success path; terminal states share the top rank.
    fn rank(self) -> u8 {
        match self {
            Self::Unknown => 0,
            Self::Queued => 1,
            Self::Processing => 2,
            Self::Synthesized => 3,
            Self::Uploaded => 4,
            Self::Delivered | Self::Failed | Self::Cancelled => 5,
        }
    }

    /// The state an event drives a job toward, if any.
    ///
    /// Unrecognized events only count when they report a `cancelled` status.
    pub fn target_of(kind: &WebhookEventKind, status: Option<&str>) -> Option<Self> {
        match kind {
            WebhookEventKind::Queued => Some(Self::Queued),
            WebhookEventKind::Started => Some(Self::Processing),
            WebhookEventKind::Synthesized => Some(Self::Synthesized),
            WebhookEventKind::Uploaded => Some(Self::Uploaded),
            WebhookEventKind::Delivered => Some(Self::Delivered),
            WebhookEventKind::Failed => Some(Self::Failed),
            WebhookEventKind::Unrecognized(_) => status
                .filter(|s| s.eq_ignore_ascii_case("cancelled"))
                .map(|_| Self::Cancelled),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Synthesized => "synthesized",
            Self::Uploaded => "uploaded",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What applying one event did to its job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Transition {
    /// The job moved forward (or into a terminal state).
    Advanced { from: JobState, to: JobState },
    /// Same state as already recorded; a redelivery.
    Duplicate { state: JobState },
    /// Older than what is already known, or after a terminal state.
    /// Logged, never applied.
    Stale { current: JobState, attempted: JobState },
    /// The event carries no state information.
    Ignored { current: JobState },
}

impl Transition {
    pub fn is_stale(&self) -> bool {
        matches!(self, Self::Stale { .. })
    }

    pub fn state(&self) -> JobState {
        match *self {
            Self::Advanced { to, .. } => to,
            Self::Duplicate { state } => state,
            Self::Stale { current, .. } | Self::Ignored { current } => current,
        }
    }
}

/// Reconciled view of one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub state: JobState,
    /// Event type that last changed `state`.
    pub last_event: String,
    pub last_sequence: u64,
    pub updated_at: DateTime<Utc>,
    /// Every event seen for the job, including stale and duplicate ones.
    pub events_seen: u64,
    pub audio_url: Option<String>,
    pub error_message: Option<String>,
}

impl JobRecord {
    fn new(job_id: &str, event: &WebhookEvent) -> Self {
        Self {
            job_id: job_id.to_string(),
            state: JobState::Unknown,
            last_event: event.kind.to_string(),
            last_sequence: event.sequence,
            updated_at: event.received_at,
            events_seen: 0,
            audio_url: None,
            error_message: None,
        }
    }
}

/// Folds events into per-job state.
#[derive(Debug, Default)]
pub struct JobTracker {
    jobs: Mutex<HashMap<String, JobRecord>>,
}

impl JobTracker {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, JobRecord>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply one event. Terminal states are final; nothing regresses.
    pub fn apply(&self, event: &WebhookEvent) -> Transition {
        let mut jobs = self.lock();
        let record = jobs
            .entry(event.job_id.clone())
            .or_insert_with(|| JobRecord::new(&event.job_id, event));
        record.events_seen += 1;

        let current = record.state;
        let Some(target) = JobState::target_of(&event.kind, event.status.as_deref()) else {
            return Transition::Ignored { current };
        };

        let transition = if current == target {
            Transition::Duplicate { state: current }
        } else if current.is_terminal() || target.rank() < current.rank() {
            Transition::Stale {
                current,
                attempted: target,
            }
        } else {
            Transition::Advanced {
                from: current,
                to: target,
            }
        };

        if let Transition::Advanced { to, .. } = transition {
            record.state = to;
            record.last_event = event.kind.to_string();
            record.last_sequence = event.sequence;
            record.updated_at = event.received_at;
            if let Some(url) = &event.details.audio_file_url {
                record.audio_url = Some(url.clone());
            }
            if to == JobState::Failed {
                record.error_message = event
                    .details
                    .error_message
                    .clone()
                    .or_else(|| Some("Unknown error".to_string()));
            }
        }

        transition
    }

    pub fn get(&self, job_id: &str) -> Option<JobRecord> {
        self.lock().get(job_id).cloned()
    }

    /// Drop a job's record once the log no longer holds any of its events.
    pub fn forget(&self, job_id: &str) -> Option<JobRecord> {
        self.lock().remove(job_id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::event::WebhookPayload;
    use serde_json::json;

    fn event(seq: u64, kind: &str, job_id: &str) -> WebhookEvent {
        let payload =
            WebhookPayload::from_value(json!({"event": kind, "job_id": job_id})).unwrap();
        WebhookEvent::record(payload, seq, Utc::now())
    }

    #[test]
    fn success_path_advances_to_delivered() {
        let tracker = JobTracker::new();
        for (seq, kind) in [
            "tts_queued",
            "tts_started",
            "tts_synthesized",
            "tts_uploaded",
            "tts_delivered",
        ]
        .into_iter()
        .enumerate()
        {
            let t = tracker.apply(&event(seq as u64, kind, "j"));
            assert!(matches!(t, Transition::Advanced { .. }), "{kind}: {t:?}");
        }
        let record = tracker.get("j").unwrap();
        assert_eq!(record.state, JobState::Delivered);
        assert_eq!(record.last_event, "tts_delivered");
        assert_eq!(record.events_seen, 5);
    }

    #[test]
    fn late_progress_after_terminal_is_stale() {
        let tracker = JobTracker::new();
        tracker.apply(&event(0, "tts_queued", "j"));
        tracker.apply(&event(1, "tts_delivered", "j"));

        let t = tracker.apply(&event(2, "tts_started", "j"));
        assert_eq!(
            t,
            Transition::Stale {
                current: JobState::Delivered,
                attempted: JobState::Processing
            }
        );
        let t = tracker.apply(&event(3, "tts_failed", "j"));
        assert!(t.is_stale());
        assert_eq!(tracker.get("j").unwrap().state, JobState::Delivered);
        assert_eq!(tracker.get("j").unwrap().last_sequence, 1);
    }

    #[test]
    fn out_of_order_progress_does_not_regress() {
        let tracker = JobTracker::new();
        tracker.apply(&event(0, "tts_uploaded", "j"));
        let t = tracker.apply(&event(1, "tts_queued", "j"));
        assert!(t.is_stale());
        assert_eq!(tracker.get("j").unwrap().state, JobState::Uploaded);
    }

    #[test]
    fn repeated_terminal_event_is_duplicate() {
        let tracker = JobTracker::new();
        tracker.apply(&event(0, "tts_delivered", "j"));
        let t = tracker.apply(&event(1, "tts_delivered", "j"));
        assert_eq!(
            t,
            Transition::Duplicate {
                state: JobState::Delivered
            }
        );
    }

    #[test]
    fn failure_is_reachable_from_any_non_terminal_state() {
        let tracker = JobTracker::new();
        tracker.apply(&event(0, "tts_synthesized", "j"));
        let t = tracker.apply(&event(1, "tts_failed", "j"));
        assert_eq!(
            t,
            Transition::Advanced {
                from: JobState::Synthesized,
                to: JobState::Failed
            }
        );
        assert_eq!(
            tracker.get("j").unwrap().error_message.as_deref(),
            Some("Unknown error")
        );
    }

    #[test]
    fn unrecognized_event_only_counts_for_cancellation() {
        let tracker = JobTracker::new();
        let t = tracker.apply(&event(0, "tts_mystery", "j"));
        assert_eq!(
            t,
            Transition::Ignored {
                current: JobState::Unknown
            }
        );

        let payload = WebhookPayload::from_value(
            json!({"event": "tts_cancelled", "job_id": "j", "status": "cancelled"}),
        )
        .unwrap();
        let t = tracker.apply(&WebhookEvent::record(payload, 1, Utc::now()));
        assert_eq!(t.state(), JobState::Cancelled);
    }

    #[test]
    fn forget_drops_the_record() {
        let tracker = JobTracker::new();
        tracker.apply(&event(0, "tts_queued", "j"));
        tracker.apply(&event(1, "tts_queued", "k"));

        assert_eq!(tracker.forget("j").map(|r| r.state), Some(JobState::Queued));
        assert!(tracker.get("j").is_none());
        assert_eq!(tracker.len(), 1);
        assert!(tracker.forget("j").is_none());
    }
}
