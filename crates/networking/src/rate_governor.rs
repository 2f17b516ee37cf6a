//! C1 — global token bucket plus per-endpoint spacing for exchange calls.
//!
//! One `RateGovernor` per process. Two independent buckets (market-data,
//! trading) each combine a minimum per-call spacing with a refilling
//! token budget; higher-priority callers are served first when tokens
//! are contended.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Mutex;
use std::time::Duration;

use signal_core::{Error, RequestPriority, Result};
use tokio::sync::Notify;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    MarketData,
    Trading,
}

struct BucketState {
    tokens: f64,
    max_tokens: f64,
    refill_per_sec: f64,
    last_refill: Instant,
    last_call: Option<Instant>,
    spacing: Duration,
}

impl BucketState {
    fn new(rate_per_sec: f64, spacing: Duration) -> Self {
        Self {
            tokens: rate_per_sec,
            max_tokens: rate_per_sec,
            refill_per_sec: rate_per_sec,
            last_refill: Instant::now(),
            last_call: None,
            spacing,
        }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.max_tokens);
        self.last_refill = now;
    }

    fn spacing_ready_at(&self) -> Instant {
        match self.last_call {
            Some(last) => last + self.spacing,
            None => Instant::now(),
        }
    }

    fn try_consume(&mut self) -> bool {
        self.refill();
        if self.tokens >= 1.0 && Instant::now() >= self.spacing_ready_at() {
            self.tokens -= 1.0;
            self.last_call = Some(Instant::now());
            true
        } else {
            false
        }
    }
}

#[derive(Eq, PartialEq)]
struct Waiter {
    priority: RequestPriority,
    sequence: u64,
}

impl Ord for Waiter {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; we want lower RequestPriority value
        // (more urgent) to sort first, and FIFO (lower sequence) within
        // a priority tier.
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.sequence.cmp(&self.sequence))
    }
}

impl PartialOrd for Waiter {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

struct Bucket {
    state: Mutex<BucketState>,
    queue: Mutex<BinaryHeap<Waiter>>,
    notify: Notify,
    sequence: Mutex<u64>,
}

impl Bucket {
    fn new(rate_per_sec: f64, spacing: Duration) -> Self {
        Self {
            state: Mutex::new(BucketState::new(rate_per_sec, spacing)),
            queue: Mutex::new(BinaryHeap::new()),
            notify: Notify::new(),
            sequence: Mutex::new(0),
        }
    }

    async fn acquire(&self, priority: RequestPriority, deadline: Option<Duration>) -> Result<()> {
        let sequence = {
            let mut seq = self.sequence.lock().unwrap();
            *seq += 1;
            *seq
        };
        self.queue.lock().unwrap().push(Waiter { priority, sequence });

        let started = Instant::now();
        loop {
            {
                let is_front = self
                    .queue
                    .lock()
                    .unwrap()
                    .peek()
                    .map(|w| w.sequence == sequence)
                    .unwrap_or(false);

                if is_front {
                    let mut state = self.state.lock().unwrap();
                    if state.try_consume() {
                        self.queue.lock().unwrap().pop();
                        return Ok(());
                    }
                }
            }

            if let Some(deadline) = deadline {
                if started.elapsed() >= deadline {
                    self.queue.lock().unwrap().retain(|w| w.sequence != sequence);
                    return Err(Error::RateTimeout {
                        endpoint: "rate_governor".to_string(),
                    });
                }
            }

            let wait = tokio::time::timeout(Duration::from_millis(25), self.notify.notified());
            let _ = wait.await;
            self.notify.notify_waiters();
        }
    }
}

/// Per-call guard returned by `Acquire`; currently a marker, kept for
/// symmetry with components that need to release an explicit resource.
pub struct ReleaseToken;

pub struct RateGovernor {
    market_data: Bucket,
    trading: Bucket,
}

impl RateGovernor {
    pub fn new(
        market_data_rate_per_sec: f64,
        market_data_spacing_ms: u64,
        trading_rate_per_sec: f64,
        trading_spacing_ms: u64,
    ) -> Self {
        Self {
            market_data: Bucket::new(
                market_data_rate_per_sec,
                Duration::from_millis(market_data_spacing_ms),
            ),
            trading: Bucket::new(trading_rate_per_sec, Duration::from_millis(trading_spacing_ms)),
        }
    }

    pub fn default_governor() -> Self {
        Self::new(25.0, 300, 2.0, 500)
    }

    pub async fn acquire(
        &self,
        endpoint: Endpoint,
        priority: RequestPriority,
        deadline: Option<Duration>,
    ) -> Result<ReleaseToken> {
        let bucket = match endpoint {
            Endpoint::MarketData => &self.market_data,
            Endpoint::Trading => &self.trading,
        };
        bucket.acquire(priority, deadline).await?;
        Ok(ReleaseToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_succeeds_when_tokens_available() {
        let gov = RateGovernor::new(10.0, 0, 10.0, 0);
        let result = gov
            .acquire(Endpoint::MarketData, RequestPriority::Medium, Some(Duration::from_secs(1)))
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn acquire_times_out_when_bucket_is_empty() {
        let gov = RateGovernor::new(1.0, 0, 1.0, 0);
        gov.acquire(Endpoint::MarketData, RequestPriority::Medium, None)
            .await
            .unwrap();

        let result = gov
            .acquire(
                Endpoint::MarketData,
                RequestPriority::Medium,
                Some(Duration::from_millis(50)),
            )
            .await;

        assert!(matches!(result, Err(Error::RateTimeout { .. })));
    }

    #[tokio::test]
    async fn higher_priority_is_served_first_when_contended() {
        let gov = RateGovernor::new(1.0, 0, 1.0, 0);
        // Drain the single initial token.
        gov.acquire(Endpoint::MarketData, RequestPriority::Low, None)
            .await
            .unwrap();

        let high = gov.acquire(Endpoint::MarketData, RequestPriority::Critical, Some(Duration::from_secs(2)));
        let low = gov.acquire(Endpoint::MarketData, RequestPriority::Low, Some(Duration::from_secs(2)));

        let (high_res, low_res) = tokio::join!(high, low);
        assert!(high_res.is_ok());
        assert!(low_res.is_ok());
    }
}
