//! Bounded retry queue for failed per-user syncs.
//!
//! One entry per subject UID — enqueueing an already-queued subject is a
//! no-op. The queue is capacity-bounded: inserting past capacity evicts the
//! oldest entry with a warning rather than growing without bound. Retry
//! delays follow a fixed escalating table instead of a computed exponential,
//! clamped at the last entry once the attempt count runs past the table.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Escalating retry delays, one per attempt.
const BACKOFF_SECS: [i64; 5] = [5, 15, 45, 120, 300];

/// Attempts after which an item is dropped instead of re-queued.
pub const MAX_ATTEMPTS: u32 = 5;

pub const DEFAULT_CAPACITY: usize = 256;

/// Delay before the next attempt, given how many attempts already failed.
pub fn backoff(attempts: u32) -> Duration {
    let idx = (attempts as usize).min(BACKOFF_SECS.len() - 1);
    Duration::seconds(BACKOFF_SECS[idx])
}

/// One subject awaiting another sync attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryItem {
    #[serde(rename = "subjectUID")]
    pub uid: String,
    pub attempts: u32,
    #[serde(rename = "nextRetryAt")]
    pub next_retry_at: DateTime<Utc>,
}

/// FIFO retry queue. The lock is held only for list manipulation — callers
/// perform the actual sync attempt outside of it.
pub struct RetryQueue {
    items: Mutex<Vec<RetryItem>>,
    capacity: usize,
}

impl RetryQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    /// Queue a subject for its first retry. Returns `false` when the subject
    /// was already queued (dedup) — the earlier schedule wins.
    pub async fn enqueue(&self, uid: &str) -> bool {
        self.insert(uid, 0).await
    }

    /// Re-queue a subject after another failed attempt. Returns `false` when
    /// the subject was dropped for exceeding [`MAX_ATTEMPTS`] or was already
    /// queued.
    pub async fn reenqueue(&self, uid: &str, attempts: u32) -> bool {
        if attempts >= MAX_ATTEMPTS {
            warn!(uid, attempts, "giving up on subject after max retry attempts");
            return false;
        }
        self.insert(uid, attempts).await
    }

    async fn insert(&self, uid: &str, attempts: u32) -> bool {
        let mut items = self.items.lock().await;
        if items.iter().any(|i| i.uid == uid) {
            debug!(uid, "subject already queued for retry");
            return false;
        }
        if items.len() >= self.capacity {
            let evicted = items.remove(0);
            warn!(
                evicted = %evicted.uid,
                capacity = self.capacity,
                "retry queue full — evicting oldest entry"
            );
        }
        let next_retry_at = Utc::now() + backoff(attempts);
        items.push(RetryItem {
            uid: uid.to_string(),
            attempts,
            next_retry_at,
        });
        true
    }

    /// Atomically remove and return every item due at `now`.
    pub async fn drain_ready(&self, now: DateTime<Utc>) -> Vec<RetryItem> {
        let mut items = self.items.lock().await;
        let mut ready = Vec::new();
        let mut waiting = Vec::new();
        for item in items.drain(..) {
            if item.next_retry_at <= now {
                ready.push(item);
            } else {
                waiting.push(item);
            }
        }
        *items = waiting;
        ready
    }

    pub async fn len(&self) -> usize {
        self.items.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.lock().await.is_empty()
    }

    /// Copy of the current items, for persistence.
    pub async fn snapshot(&self) -> Vec<RetryItem> {
        self.items.lock().await.clone()
    }

    /// Replace the queue contents from a persisted snapshot.
    pub async fn restore(&self, restored: Vec<RetryItem>) {
        let mut items = self.items.lock().await;
        *items = restored;
        items.truncate(self.capacity);
    }
}
