//! CircuitBreakerState shared by the signal worker pool

use chrono::{DateTime, Utc};

const OPEN_THRESHOLD: u32 = 10;
const RESUME_AFTER_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct CircuitBreakerState {
    pub consecutive_errors: u32,
    pub is_open: bool,
    pub opened_at: Option<DateTime<Utc>>,
    pub resume_at: Option<DateTime<Utc>>,
}

impl Default for CircuitBreakerState {
    fn default() -> Self {
        Self {
            consecutive_errors: 0,
            is_open: false,
            opened_at: None,
            resume_at: None,
        }
    }
}

impl CircuitBreakerState {
    /// Returns `true` if this failure just opened the breaker.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_errors += 1;
        if !self.is_open && self.consecutive_errors >= OPEN_THRESHOLD {
            let now = Utc::now();
            self.is_open = true;
            self.opened_at = Some(now);
            self.resume_at = Some(now + chrono::Duration::seconds(RESUME_AFTER_SECS));
            return true;
        }
        false
    }

    pub fn record_success(&mut self) {
        self.consecutive_errors = 0;
    }

    /// Closes the breaker if resume_at has passed, or unconditionally
    /// on a manual reset.
    pub fn maybe_resume(&mut self, now: DateTime<Utc>) -> bool {
        if self.is_open {
            if let Some(resume_at) = self.resume_at {
                if now >= resume_at {
                    self.reset();
                    return true;
                }
            }
        }
        false
    }

    pub fn reset(&mut self) {
        self.consecutive_errors = 0;
        self.is_open = false;
        self.opened_at = None;
        self.resume_at = None;
    }
}
