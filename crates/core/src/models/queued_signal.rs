//! QueuedSignal: a Signal wrapped with priority-queue bookkeeping

use crate::models::Signal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A `Signal` as it sits in the priority queue.
///
/// Invariants: `expires_at > queued_at`; `attempts <= max_attempts`;
/// `processed == true` implies the signal has been dispatched to
/// exactly one executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedSignal {
    pub signal: Signal,
    pub priority: f64,
    pub queued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub processed: bool,
}

impl QueuedSignal {
    pub fn new(signal: Signal, priority: f64, ttl: chrono::Duration, max_attempts: u32) -> Self {
        let queued_at = Utc::now();
        Self {
            signal,
            priority,
            queued_at,
            expires_at: queued_at + ttl,
            attempts: 0,
            max_attempts,
            processed: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Dedup key: symbol + action + floor(strength/10), per the
    /// deduplication window contract.
    pub fn dedup_key(&self) -> String {
        format!(
            "{}:{:?}:{}",
            self.signal.symbol,
            self.signal.action,
            (self.signal.strength / 10.0).floor() as i64
        )
    }
}
