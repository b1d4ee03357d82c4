// SPDX-License-Identifier: MIT
//! In-process sync metrics exposed as `GET /metrics` in Prometheus text
//! format. No external library — counters and histogram buckets are
//! `AtomicU64` incremented inline.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

/// Which flow a sync attempt belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncType {
    Webhook,
    Reconcile,
    UserSync,
    Retry,
    GroupSync,
}

impl SyncType {
    pub const ALL: [SyncType; 5] = [
        SyncType::Webhook,
        SyncType::Reconcile,
        SyncType::UserSync,
        SyncType::Retry,
        SyncType::GroupSync,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SyncType::Webhook => "webhook",
            SyncType::Reconcile => "reconcile",
            SyncType::UserSync => "user_sync",
            SyncType::Retry => "retry",
            SyncType::GroupSync => "group_sync",
        }
    }
}

/// Outcome classification of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Received,
    Success,
    Error,
    Partial,
}

impl SyncStatus {
    pub const ALL: [SyncStatus; 4] = [
        SyncStatus::Received,
        SyncStatus::Success,
        SyncStatus::Error,
        SyncStatus::Partial,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SyncStatus::Received => "received",
            SyncStatus::Success => "success",
            SyncStatus::Error => "error",
            SyncStatus::Partial => "partial",
        }
    }
}

/// Upper bounds (seconds) for the duration histogram buckets.
const BUCKET_BOUNDS: [f64; 8] = [0.05, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0];

struct DurationHistogram {
    /// Cumulative counts per bucket bound (the +Inf bucket is `count`).
    buckets: [AtomicU64; BUCKET_BOUNDS.len()],
    sum_micros: AtomicU64,
    count: AtomicU64,
}

impl DurationHistogram {
    fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            sum_micros: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    fn observe(&self, d: Duration) {
        let secs = d.as_secs_f64();
        for (i, bound) in BUCKET_BOUNDS.iter().enumerate() {
            if secs <= *bound {
                self.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
        self.sum_micros.fetch_add(d.as_micros() as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }
}

/// Counters, histograms and gauges shared across loops and the webhook path.
pub struct SyncMetrics {
    /// `[type][status]` attempt counters.
    counters: [[AtomicU64; 4]; 5],
    durations: [DurationHistogram; 5],
    /// Unix seconds of the last fully successful reconcile pass; 0 = never.
    last_reconcile_success: AtomicI64,
    started_at: Instant,
}

/// Shared handle — cheaply clonable.
pub type SharedMetrics = Arc<SyncMetrics>;

impl SyncMetrics {
    pub fn new() -> Self {
        Self {
            counters: std::array::from_fn(|_| std::array::from_fn(|_| AtomicU64::new(0))),
            durations: std::array::from_fn(|_| DurationHistogram::new()),
            last_reconcile_success: AtomicI64::new(0),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, sync_type: SyncType, status: SyncStatus) {
        self.counters[type_index(sync_type)][status_index(status)]
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_duration(&self, sync_type: SyncType, d: Duration) {
        self.durations[type_index(sync_type)].observe(d);
    }

    pub fn set_last_reconcile_success(&self, at: DateTime<Utc>) {
        self.last_reconcile_success
            .store(at.timestamp(), Ordering::Relaxed);
    }

    pub fn counter(&self, sync_type: SyncType, status: SyncStatus) -> u64 {
        self.counters[type_index(sync_type)][status_index(status)].load(Ordering::Relaxed)
    }

    /// Render everything in Prometheus text format. The retry queue depth is
    /// passed in because reading it takes a lock (not stored here).
    pub fn render_prometheus(&self, retry_queue_depth: u64) -> String {
        let mut out = String::with_capacity(4096);

        out.push_str("# HELP dirsyncd_uptime_seconds Daemon uptime in seconds.\n");
        out.push_str("# TYPE dirsyncd_uptime_seconds gauge\n");
        out.push_str(&format!(
            "dirsyncd_uptime_seconds {}\n",
            self.started_at.elapsed().as_secs()
        ));

        out.push_str("# HELP dirsyncd_sync_total Sync attempts by type and status.\n");
        out.push_str("# TYPE dirsyncd_sync_total counter\n");
        for t in SyncType::ALL {
            for s in SyncStatus::ALL {
                out.push_str(&format!(
                    "dirsyncd_sync_total{{type=\"{}\",status=\"{}\"}} {}\n",
                    t.as_str(),
                    s.as_str(),
                    self.counter(t, s)
                ));
            }
        }

        out.push_str("# HELP dirsyncd_sync_duration_seconds Sync duration by type.\n");
        out.push_str("# TYPE dirsyncd_sync_duration_seconds histogram\n");
        for t in SyncType::ALL {
            let h = &self.durations[type_index(t)];
            for (i, bound) in BUCKET_BOUNDS.iter().enumerate() {
                out.push_str(&format!(
                    "dirsyncd_sync_duration_seconds_bucket{{type=\"{}\",le=\"{}\"}} {}\n",
                    t.as_str(),
                    bound,
                    h.buckets[i].load(Ordering::Relaxed)
                ));
            }
            let count = h.count.load(Ordering::Relaxed);
            out.push_str(&format!(
                "dirsyncd_sync_duration_seconds_bucket{{type=\"{}\",le=\"+Inf\"}} {}\n",
                t.as_str(),
                count
            ));
            out.push_str(&format!(
                "dirsyncd_sync_duration_seconds_sum{{type=\"{}\"}} {}\n",
                t.as_str(),
                h.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
            ));
            out.push_str(&format!(
                "dirsyncd_sync_duration_seconds_count{{type=\"{}\"}} {}\n",
                t.as_str(),
                count
            ));
        }

        out.push_str(
            "# HELP dirsyncd_last_reconcile_success_timestamp Unix time of the last fully successful reconcile pass (0 = never).\n",
        );
        out.push_str("# TYPE dirsyncd_last_reconcile_success_timestamp gauge\n");
        out.push_str(&format!(
            "dirsyncd_last_reconcile_success_timestamp {}\n",
            self.last_reconcile_success.load(Ordering::Relaxed)
        ));

        out.push_str("# HELP dirsyncd_retry_queue_depth Subjects currently awaiting retry.\n");
        out.push_str("# TYPE dirsyncd_retry_queue_depth gauge\n");
        out.push_str(&format!("dirsyncd_retry_queue_depth {retry_queue_depth}\n"));

        out
    }
}

impl Default for SyncMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn type_index(t: SyncType) -> usize {
    match t {
        SyncType::Webhook => 0,
        SyncType::Reconcile => 1,
        SyncType::UserSync => 2,
        SyncType::Retry => 3,
        SyncType::GroupSync => 4,
    }
}

fn status_index(s: SyncStatus) -> usize {
    match s {
        SyncStatus::Received => 0,
        SyncStatus::Success => 1,
        SyncStatus::Error => 2,
        SyncStatus::Partial => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_per_type_and_status() {
        let m = SyncMetrics::new();
        m.inc(SyncType::Webhook, SyncStatus::Received);
        m.inc(SyncType::Webhook, SyncStatus::Success);
        m.inc(SyncType::Webhook, SyncStatus::Success);
        m.inc(SyncType::GroupSync, SyncStatus::Partial);

        assert_eq!(m.counter(SyncType::Webhook, SyncStatus::Received), 1);
        assert_eq!(m.counter(SyncType::Webhook, SyncStatus::Success), 2);
        assert_eq!(m.counter(SyncType::GroupSync, SyncStatus::Partial), 1);
        assert_eq!(m.counter(SyncType::Retry, SyncStatus::Error), 0);
    }

    #[test]
    fn render_contains_labeled_series_and_gauges() {
        let m = SyncMetrics::new();
        m.inc(SyncType::Reconcile, SyncStatus::Success);
        m.observe_duration(SyncType::Reconcile, Duration::from_millis(250));
        m.set_last_reconcile_success(Utc::now());

        let text = m.render_prometheus(3);
        assert!(text.contains("dirsyncd_sync_total{type=\"reconcile\",status=\"success\"} 1"));
        assert!(text.contains("dirsyncd_sync_duration_seconds_bucket{type=\"reconcile\",le=\"0.5\"} 1"));
        assert!(text.contains("dirsyncd_sync_duration_seconds_count{type=\"reconcile\"} 1"));
        assert!(text.contains("dirsyncd_retry_queue_depth 3"));
        assert!(!text.contains("dirsyncd_last_reconcile_success_timestamp 0\n"));
    }

    #[test]
    fn histogram_buckets_are_cumulative() {
        let m = SyncMetrics::new();
        m.observe_duration(SyncType::Retry, Duration::from_millis(40));
        m.observe_duration(SyncType::Retry, Duration::from_secs(2));

        let text = m.render_prometheus(0);
        assert!(text.contains("dirsyncd_sync_duration_seconds_bucket{type=\"retry\",le=\"0.05\"} 1"));
        assert!(text.contains("dirsyncd_sync_duration_seconds_bucket{type=\"retry\",le=\"5\"} 2"));
        assert!(text.contains("dirsyncd_sync_duration_seconds_bucket{type=\"retry\",le=\"+Inf\"} 2"));
    }
}
