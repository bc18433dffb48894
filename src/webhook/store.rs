//! Append-only, bounded event log.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;

use super::event::{WebhookEvent, WebhookPayload};

/// How long recorded events are kept.
///
/// Eviction is oldest-first and is the only way an event leaves the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionPolicy {
    /// Upper bound on retained events (at least 1).
    pub max_events: usize,
    /// Events older than this (by `received_at`) are dropped.
    pub max_age: Option<Duration>,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            max_events: 10_000,
            max_age: None,
        }
    }
}

/// Counters describing the log since construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Events accepted since start, including evicted ones.
    pub received: u64,
    pub retained: usize,
    pub evicted: u64,
}

#[derive(Debug, Default)]
struct StoreInner {
    events: VecDeque<WebhookEvent>,
    next_sequence: u64,
    evicted: u64,
    /// Retained events per job id.
    per_job: HashMap<String, usize>,
    /// Jobs whose last retained event was evicted, not yet pruned.
    orphaned: HashSet<String>,
}

impl StoreInner {
    fn push(&mut self, event: WebhookEvent) {
        self.orphaned.remove(&event.job_id);
        *self.per_job.entry(event.job_id.clone()).or_default() += 1;
        self.events.push_back(event);
    }

    fn pop_oldest(&mut self) {
        let Some(event) = self.events.pop_front() else {
            return;
        };
        self.evicted += 1;
        if let Some(count) = self.per_job.get_mut(&event.job_id) {
            *count -= 1;
            if *count == 0 {
                self.per_job.remove(&event.job_id);
                self.orphaned.insert(event.job_id);
            }
        }
    }

    fn evict(&mut self, policy: &RetentionPolicy) {
        while self.events.len() > policy.max_events.max(1) {
            self.pop_oldest();
        }

        let Some(max_age) = policy.max_age else {
            return;
        };
        let Ok(max_age) = chrono::Duration::from_std(max_age) else {
            return;
        };
        let cutoff = Utc::now() - max_age;
        while self
            .events
            .front()
            .is_some_and(|event| event.received_at < cutoff)
        {
            self.pop_oldest();
        }
    }
}

/// Ordered webhook event log shared by all request handlers.
///
/// Appends are serialized by a mutex; sequence numbers and `received_at` are
/// assigned under that lock, so log order, sequence order, and timestamp
/// order always agree. Reads copy a snapshot under the lock.
#[derive(Debug)]
pub struct EventStore {
    inner: Mutex<StoreInner>,
    policy: RetentionPolicy,
}

impl Default for EventStore {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}

impl EventStore {
    pub fn new(policy: RetentionPolicy) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            policy,
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record a payload and return the stored event.
    pub fn append(&self, payload: WebhookPayload) -> WebhookEvent {
        self.append_with(payload, |_| ()).0
    }

    /// Record a payload, then run `after` on the new event while the log is
    /// still locked, so per-event follow-up work observes ingest order.
    pub fn append_with<R>(
        &self,
        payload: WebhookPayload,
        after: impl FnOnce(&WebhookEvent) -> R,
    ) -> (WebhookEvent, R) {
        let mut inner = self.lock();
        let sequence = inner.next_sequence;
        inner.next_sequence += 1;

        let event = WebhookEvent::record(payload, sequence, Utc::now());
        inner.push(event.clone());
        inner.evict(&self.policy);

        let result = after(&event);
        (event, result)
    }

    /// Every retained event, oldest first.
    pub fn snapshot(&self) -> Vec<WebhookEvent> {
        let mut inner = self.lock();
        inner.evict(&self.policy);
        inner.events.iter().cloned().collect()
    }

    /// Retained events for one job, in log order.
    pub fn for_job(&self, job_id: &str) -> Vec<WebhookEvent> {
        let mut inner = self.lock();
        inner.evict(&self.policy);
        inner
            .events
            .iter()
            .filter(|event| event.job_id == job_id)
            .cloned()
            .collect()
    }

    /// The newest `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<WebhookEvent> {
        let mut inner = self.lock();
        inner.evict(&self.policy);
        inner.events.iter().rev().take(limit).cloned().collect()
    }

    pub fn stats(&self) -> StoreStats {
        let mut inner = self.lock();
        inner.evict(&self.policy);
        StoreStats {
            received: inner.next_sequence,
            retained: inner.events.len(),
            evicted: inner.evicted,
        }
    }

    /// Call `forget` for every job that no longer has a retained event.
    ///
    /// `forget` runs under the log lock, so no event for the job can arrive
    /// in between.
    pub fn prune_orphans(&self, mut forget: impl FnMut(&str)) {
        let mut inner = self.lock();
        inner.evict(&self.policy);
        for job_id in std::mem::take(&mut inner.orphaned) {
            forget(&job_id);
        }
    }

    /// Number of distinct jobs with at least one retained event.
    pub fn jobs_retained(&self) -> usize {
        let mut inner = self.lock();
        inner.evict(&self.policy);
        inner.per_job.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(event: &str, job_id: &str) -> WebhookPayload {
        WebhookPayload::from_value(json!({"event": event, "job_id": job_id})).unwrap()
    }

    #[test]
    fn sequences_follow_append_order() {
        let store = EventStore::default();
        store.append(payload("tts_queued", "a"));
        store.append(payload("tts_queued", "b"));
        store.append(payload("tts_started", "a"));

        let events = store.snapshot();
        let sequences: Vec<u64> = events.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1, 2]);
        assert!(events.windows(2).all(|w| w[0].received_at <= w[1].received_at));
    }

    #[test]
    fn for_job_is_an_ordered_subsequence() {
        let store = EventStore::default();
        store.append(payload("tts_queued", "a"));
        store.append(payload("tts_queued", "b"));
        store.append(payload("tts_started", "a"));

        let a: Vec<u64> = store.for_job("a").iter().map(|e| e.sequence).collect();
        assert_eq!(a, vec![0, 2]);
        assert!(store.for_job("missing").is_empty());
    }

    #[test]
    fn max_events_evicts_oldest_first() {
        let store = EventStore::new(RetentionPolicy {
            max_events: 2,
            max_age: None,
        });
        for job in ["a", "b", "c"] {
            store.append(payload("tts_queued", job));
        }

        let jobs: Vec<String> = store.snapshot().into_iter().map(|e| e.job_id).collect();
        assert_eq!(jobs, vec!["b", "c"]);
        assert_eq!(
            store.stats(),
            StoreStats {
                received: 3,
                retained: 2,
                evicted: 1
            }
        );
    }

    #[test]
    fn max_age_zero_drops_everything_on_read() {
        let store = EventStore::new(RetentionPolicy {
            max_events: 10,
            max_age: Some(Duration::ZERO),
        });
        store.append(payload("tts_queued", "a"));
        std::thread::sleep(Duration::from_millis(5));

        assert!(store.snapshot().is_empty());
        assert_eq!(store.stats().received, 1);
    }

    #[test]
    fn recent_is_newest_first() {
        let store = EventStore::default();
        for job in ["a", "b", "c"] {
            store.append(payload("tts_queued", job));
        }
        let jobs: Vec<String> = store.recent(2).into_iter().map(|e| e.job_id).collect();
        assert_eq!(jobs, vec!["c", "b"]);
    }

    #[test]
    fn stats_apply_age_eviction() {
        let store = EventStore::new(RetentionPolicy {
            max_events: 10,
            max_age: Some(Duration::from_millis(1)),
        });
        store.append(payload("tts_queued", "a"));
        std::thread::sleep(Duration::from_millis(5));

        let stats = store.stats();
        assert_eq!(stats.retained, 0);
        assert_eq!(stats.evicted, 1);
        assert!(store.recent(5).is_empty());
    }

    #[test]
    fn pruning_reports_jobs_without_retained_events() {
        let store = EventStore::new(RetentionPolicy {
            max_events: 2,
            max_age: None,
        });
        for job in ["a", "b", "a", "c"] {
            store.append(payload("tts_queued", job));
        }

        let mut forgotten = Vec::new();
        store.prune_orphans(|job_id| forgotten.push(job_id.to_string()));
        assert_eq!(forgotten, vec!["b"]);
        assert_eq!(store.jobs_retained(), 2);

        // Already reported once.
        let mut again = Vec::new();
        store.prune_orphans(|job_id| again.push(job_id.to_string()));
        assert!(again.is_empty());
    }

    #[test]
    fn pruning_skips_jobs_that_came_back() {
        let store = EventStore::new(RetentionPolicy {
            max_events: 1,
            max_age: None,
        });
        store.append(payload("tts_queued", "a"));
        store.append(payload("tts_queued", "b"));
        store.append(payload("tts_started", "a"));

        let mut forgotten = Vec::new();
        store.prune_orphans(|job_id| forgotten.push(job_id.to_string()));
        assert_eq!(forgotten, vec!["b"]);
    }
}
