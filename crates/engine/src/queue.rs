//! C5 — bounded priority queue of `QueuedSignal`s with dedup and TTL.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{Duration as ChronoDuration, Utc};
use signal_core::{Error, QueueEvent, QueuedSignal, Result, Signal, SignalQueueConfig};
use tokio::sync::{broadcast, Notify};
use tracing::{debug, warn};

struct DedupEntry {
    seen_at: chrono::DateTime<Utc>,
}

struct State {
    entries: HashMap<String, QueuedSignal>,
    dedup: HashMap<String, DedupEntry>,
}

/// Bounded max-heap of `QueuedSignal`s, keyed on a priority computed at
/// enqueue time from strength/recency/volume.
pub struct PrioritySignalQueue {
    cfg: SignalQueueConfig,
    state: Mutex<State>,
    events: broadcast::Sender<QueueEvent>,
    notify: Notify,
}

impl PrioritySignalQueue {
    pub fn new(cfg: SignalQueueConfig) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            cfg,
            state: Mutex::new(State {
                entries: HashMap::new(),
                dedup: HashMap::new(),
            }),
            events,
            notify: Notify::new(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Resolves once at least one signal has been enqueued since the
    /// last call. A drain loop should await this, then keep calling
    /// `dequeue` until it returns `None`, so concurrently-arriving
    /// signals actually compete on priority before dispatch.
    pub async fn notified(&self) {
        self.notify.notified().await
    }

    /// `priority = 100 * (w_s * strength/100 + w_r * recency + w_v * volumeBoost)`.
    pub fn compute_priority(&self, signal: &Signal, volume_above_average: bool) -> f64 {
        let w = &self.cfg.priority_weights;
        let recency = 1.0; // freshly generated signals are maximally recent
        let volume_boost = if volume_above_average { 1.0 } else { 0.5 };

        100.0 * (w.strength * (signal.strength / 100.0) + w.recency * recency + w.volume * volume_boost)
    }

    pub fn enqueue(
        &self,
        signal: Signal,
        ttl: Option<ChronoDuration>,
        volume_above_average: bool,
    ) -> Result<String> {
        let priority = self.compute_priority(&signal, volume_above_average);
        let ttl = ttl.unwrap_or_else(|| ChronoDuration::from_std(self.cfg.default_ttl).unwrap());
        let queued = QueuedSignal::new(signal, priority, ttl, self.cfg.max_attempts);
        let dedup_key = queued.dedup_key();

        let mut state = self.state.lock().unwrap();

        let now = Utc::now();
        let window = ChronoDuration::from_std(self.cfg.deduplication_window).unwrap();
        if let Some(seen) = state.dedup.get(&dedup_key) {
            if now - seen.seen_at < window {
                return Err(Error::SignalDuplicate {
                    symbol: queued.signal.symbol.clone(),
                });
            }
        }

        if state.entries.len() >= self.cfg.max_size {
            let lowest = state
                .entries
                .iter()
                .filter(|(_, q)| !q.processed)
                .min_by(|(_, a), (_, b)| {
                    a.priority
                        .partial_cmp(&b.priority)
                        .unwrap()
                        .then(b.queued_at.cmp(&a.queued_at))
                })
                .map(|(id, _)| id.clone());

            match lowest {
                Some(id) => {
                    state.entries.remove(&id);
                }
                None => return Err(Error::QueueFull(self.cfg.max_size)),
            }
        }

        let id = queued.signal.id.clone();
        state.dedup.insert(dedup_key, DedupEntry { seen_at: now });
        state.entries.insert(id.clone(), queued);
        drop(state);
        debug!("enqueued signal {} priority={:.1}", id, priority);
        self.notify.notify_one();
        Ok(id)
    }

    /// Returns the highest-priority unprocessed, unexpired signal;
    /// marks it processed and increments attempts.
    pub fn dequeue(&self) -> Option<QueuedSignal> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();

        let best_id = state
            .entries
            .iter()
            .filter(|(_, q)| !q.processed && !q.is_expired(now))
            .max_by(|(_, a), (_, b)| {
                a.priority
                    .partial_cmp(&b.priority)
                    .unwrap()
                    .then(b.queued_at.cmp(&a.queued_at))
            })
            .map(|(id, _)| id.clone())?;

        let entry = state.entries.get_mut(&best_id).unwrap();
        entry.processed = true;
        entry.attempts += 1;
        Some(entry.clone())
    }

    /// If `attempts < maxAttempts`, resets `processed` for retry; else
    /// drops and emits `SignalFailed`.
    pub fn mark_failed(&self, id: &str, error: Error) {
        let mut state = self.state.lock().unwrap();
        let Some(entry) = state.entries.get_mut(id) else {
            return;
        };

        if entry.can_retry() {
            entry.processed = false;
        } else {
            state.entries.remove(id);
            warn!("signal {} exhausted retries: {}", id, error);
            let _ = self.events.send(QueueEvent::SignalFailed {
                id: id.to_string(),
                error,
            });
        }
    }

    /// No-op returning false if the id is already gone (idempotent).
    pub fn mark_completed(&self, id: &str) -> bool {
        self.state.lock().unwrap().entries.remove(id).is_some()
    }

    /// Periodic sweep: evicts expired signals, emitting `SignalExpired`.
    pub fn sweep_expired(&self) {
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        let expired: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, q)| q.is_expired(now))
            .map(|(id, _)| id.clone())
            .collect();

        for id in expired {
            state.entries.remove(&id);
            let _ = self.events.send(QueueEvent::SignalExpired { id });
        }
    }

    pub fn len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use signal_core::Action;

    fn signal(symbol: &str, strength: f64) -> Signal {
        Signal::new(symbol.to_string(), Action::Buy, strength, "test")
    }

    #[test]
    fn priority_ordering_matches_strength_ranking() {
        let queue = PrioritySignalQueue::new(SignalQueueConfig::default());
        queue.enqueue(signal("BTC-USDT", 90.0), None, true).unwrap();
        queue.enqueue(signal("ETH-USDT", 70.0), None, true).unwrap();
        queue.enqueue(signal("XRP-USDT", 85.0), None, true).unwrap();

        let first = queue.dequeue().unwrap();
        let second = queue.dequeue().unwrap();
        let third = queue.dequeue().unwrap();

        assert_eq!(first.signal.symbol, "BTC-USDT");
        assert_eq!(second.signal.symbol, "XRP-USDT");
        assert_eq!(third.signal.symbol, "ETH-USDT");
    }

    #[test]
    fn duplicate_within_dedup_window_is_rejected() {
        let queue = PrioritySignalQueue::new(SignalQueueConfig::default());
        queue.enqueue(signal("BTC-USDT", 81.0), None, true).unwrap();
        let err = queue.enqueue(signal("BTC-USDT", 85.0), None, true).unwrap_err();
        assert!(matches!(err, Error::SignalDuplicate { .. }));
    }

    #[test]
    fn mark_failed_then_completed_is_idempotent() {
        let queue = PrioritySignalQueue::new(SignalQueueConfig::default());
        let id = queue.enqueue(signal("BTC-USDT", 80.0), None, true).unwrap();
        let dequeued = queue.dequeue().unwrap();
        assert_eq!(dequeued.attempts, 1);

        assert!(queue.mark_completed(&id));
        assert!(!queue.mark_completed(&id));
    }

    #[test]
    fn queue_at_capacity_evicts_lowest_priority_unprocessed() {
        let mut cfg = SignalQueueConfig::default();
        cfg.max_size = 2;
        let queue = PrioritySignalQueue::new(cfg);

        queue.enqueue(signal("AAA-USDT", 20.0), None, false).unwrap();
        queue.enqueue(signal("BBB-USDT", 90.0), None, true).unwrap();
        queue.enqueue(signal("CCC-USDT", 50.0), None, true).unwrap();

        assert_eq!(queue.len(), 2);
        let remaining: Vec<String> = (0..2)
            .filter_map(|_| queue.dequeue())
            .map(|q| q.signal.symbol)
            .collect();
        assert!(!remaining.contains(&"AAA-USDT".to_string()));
    }
}
