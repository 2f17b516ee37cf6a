//! BlacklistEntry: process-local exponential backoff for failing symbols

use crate::Symbol;
use chrono::{DateTime, Utc};

const BASE_BACKOFF_SECS: i64 = 30;
const MAX_BACKOFF_SECS: i64 = 4 * 3600;

#[derive(Debug, Clone)]
pub struct BlacklistEntry {
    pub symbol: Symbol,
    pub failure_count: u32,
    pub last_failed_at: DateTime<Utc>,
    pub backoff_until: DateTime<Utc>,
}

impl BlacklistEntry {
    /// `backoff_until = last_failed_at + min(2^failure_count * 30s, 4h)`
    pub fn new(symbol: Symbol) -> Self {
        let mut entry = Self {
            symbol,
            failure_count: 0,
            last_failed_at: Utc::now(),
            backoff_until: Utc::now(),
        };
        entry.record_failure();
        entry
    }

    pub fn record_failure(&mut self) {
        self.failure_count += 1;
        self.last_failed_at = Utc::now();
        let exponent = (self.failure_count - 1).min(20);
        let backoff_secs =
            (BASE_BACKOFF_SECS.saturating_mul(1i64 << exponent)).min(MAX_BACKOFF_SECS);
        self.backoff_until = self.last_failed_at + chrono::Duration::seconds(backoff_secs);
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.backoff_until
    }
}
