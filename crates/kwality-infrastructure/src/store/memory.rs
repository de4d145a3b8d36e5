//! In-memory report store.
//!
//! Thread-safe `DashMap` keyed by job id. Writes are whole-report
//! replacements from the owning worker; reads are lock-free consistent.
//! State changes are rebroadcast to subscribers, and a sweeper task evicts
//! terminal reports past their retention window.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use kwality_domain::entities::{Report, ReportSummary};
use kwality_domain::ports::{JobEvent, JobEventSink, ReportFilter, ReportStore};
use kwality_domain::value_objects::JobId;

/// Default capacity of the event rebroadcast channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// In-memory report store with change notifications.
pub struct MemoryReportStore {
    reports: DashMap<JobId, Report>,
    events: broadcast::Sender<JobEvent>,
}

impl MemoryReportStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            reports: DashMap::new(),
            events,
        }
    }

    /// Subscribe to job state changes.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.events.subscribe()
    }

    /// Spawn the retention sweeper: terminal reports older than `retention`
    /// are evicted every `interval`.
    pub fn spawn_retention_sweeper(
        self: &Arc<Self>,
        retention: Duration,
        interval: Duration,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                store.evict_expired(retention);
            }
        })
    }

    /// Evict terminal reports whose completion is older than `retention`.
    pub fn evict_expired(&self, retention: Duration) -> usize {
        let now = chrono::Utc::now().timestamp();
        let cutoff = now - i64::try_from(retention.as_secs()).unwrap_or(i64::MAX);
        let expired: Vec<JobId> = self
            .reports
            .iter()
            .filter(|entry| {
                entry.status.is_terminal()
                    && entry.completed_at.is_some_and(|done| done < cutoff)
            })
            .map(|entry| *entry.key())
            .collect();
        let count = expired.len();
        for id in expired {
            self.reports.remove(&id);
        }
        if count > 0 {
            kwality_domain::debug!("store", "Evicted expired reports", &count);
        }
        count
    }
}

impl Default for MemoryReportStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportStore for MemoryReportStore {
    fn put(&self, report: Report) {
        self.reports.insert(report.job_id, report);
    }

    fn get(&self, id: &JobId) -> Option<Report> {
        self.reports.get(id).map(|r| r.clone())
    }

    fn list(&self, filter: &ReportFilter) -> Vec<ReportSummary> {
        let mut summaries: Vec<ReportSummary> = self
            .reports
            .iter()
            .filter(|entry| {
                filter
                    .status
                    .as_ref()
                    .is_none_or(|wanted| &entry.status == wanted)
            })
            .map(|entry| entry.summary())
            .collect();
        summaries.sort_by_key(|s| std::cmp::Reverse(s.submitted_at));
        summaries
    }

    fn remove(&self, id: &JobId) -> Option<Report> {
        self.reports.remove(id).map(|(_, report)| report)
    }

    fn len(&self) -> usize {
        self.reports.len()
    }
}

impl JobEventSink for MemoryReportStore {
    fn publish(&self, event: JobEvent) {
        // No subscribers is fine; the channel drops the event.
        let _ = self.events.send(event);
    }
}
