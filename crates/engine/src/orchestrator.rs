//! C9 — owns the component graph, runs the scan loop, and wires every
//! inter-component event into the next call it should trigger.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};
use signal_core::{
    Action, BlacklistEntry, EngineConfig, OrchestratorEvent, QueuedSignal, RequestPriority, Symbol,
    WorkerPoolEvent,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};

use crate::market_data_cache::MarketDataCache;
use crate::positions::PositionManager;
use crate::queue::PrioritySignalQueue;
use crate::risk::{AccountState, RiskValidator};
use crate::workers::{SignalWorkerPool, SymbolTask};
use crate::TradeExecutorPool;

pub struct TradingBot {
    cfg: EngineConfig,
    market_data: Arc<MarketDataCache>,
    workers: Arc<SignalWorkerPool>,
    queue: Arc<PrioritySignalQueue>,
    risk: Arc<RiskValidator>,
    executors: Arc<TradeExecutorPool>,
    positions: Arc<PositionManager>,
    blacklist: Mutex<HashMap<Symbol, BlacklistEntry>>,
    events: broadcast::Sender<OrchestratorEvent>,
    running: AtomicBool,
    cycle_count: AtomicU64,
}

impl TradingBot {
    pub fn new(
        cfg: EngineConfig,
        market_data: Arc<MarketDataCache>,
        workers: Arc<SignalWorkerPool>,
        queue: Arc<PrioritySignalQueue>,
        risk: Arc<RiskValidator>,
        executors: Arc<TradeExecutorPool>,
        positions: Arc<PositionManager>,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(512);
        Arc::new(Self {
            cfg,
            market_data,
            workers,
            queue,
            risk,
            executors,
            positions,
            blacklist: Mutex::new(HashMap::new()),
            events,
            running: AtomicBool::new(false),
            cycle_count: AtomicU64::new(0),
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn is_blacklisted(&self, symbol: &str) -> bool {
        let blacklist = self.blacklist.lock().await;
        blacklist
            .get(symbol)
            .map(|entry| entry.is_active(Utc::now()))
            .unwrap_or(false)
    }

    async fn upsert_blacklist(&self, symbol: &Symbol) {
        let mut blacklist = self.blacklist.lock().await;
        blacklist
            .entry(symbol.clone())
            .and_modify(|e| e.record_failure())
            .or_insert_with(|| BlacklistEntry::new(symbol.clone()));
    }

    /// Starts every subsystem and blocks until the first symbol wave is ready.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("trading bot starting");

        self.workers.spawn_workers();
        self.executors.spawn_executors();

        let mut worker_events = self.workers.subscribe_events();
        let bot = self.clone();
        tokio::spawn(async move { bot.handle_worker_events(&mut worker_events).await });

        self.spawn_queue_sweep();
        self.spawn_queue_consumer();
        self.spawn_position_monitor();

        let mut wave_rx = self.workers.subscribe_events();
        let workers = self.workers.clone();
        tokio::spawn(async move {
            if let Err(e) = workers.load_symbol_universe().await {
                warn!("failed to load symbol universe: {}", e);
            }
        });

        loop {
            match wave_rx.recv().await {
                Ok(WorkerPoolEvent::SymbolWaveAdded { .. }) => break,
                Ok(_) => continue,
                Err(_) => break,
            }
        }

        let bot = self.clone();
        tokio::spawn(async move { bot.scan_loop().await });

        info!("trading bot started");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.market_data.emergency_stop();
        info!("trading bot stopped");
    }

    fn spawn_queue_sweep(self: &Arc<Self>) {
        let bot = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(5));
            loop {
                interval.tick().await;
                if !bot.is_running() {
                    return;
                }
                bot.queue.sweep_expired();
            }
        });
    }

    /// Drains C5 independently of signal production, so signals that
    /// arrive within the same window actually compete on priority
    /// before dispatch rather than being dequeued the instant they're
    /// enqueued. Wakes on `queue.notified()`, with a periodic fallback
    /// tick in case a wakeup race ever drops a notification.
    fn spawn_queue_consumer(self: &Arc<Self>) {
        let bot = self.clone();
        tokio::spawn(async move {
            loop {
                if !bot.is_running() {
                    return;
                }
                tokio::select! {
                    _ = bot.queue.notified() => {}
                    _ = tokio::time::sleep(std::time::Duration::from_millis(200)) => {}
                }
                while let Some(dequeued) = bot.queue.dequeue() {
                    bot.dispatch_dequeued(dequeued).await;
                }
            }
        });
    }

    async fn dispatch_dequeued(&self, dequeued: QueuedSignal) {
        let id = dequeued.signal.id.clone();
        if self
            .executors
            .add_signal(dequeued, self.cfg.default_position_size)
            .await
            .is_err()
        {
            self.queue.mark_failed(
                &id,
                signal_core::Error::Unknown("executor rejected queued signal".to_string()),
            );
        } else {
            self.queue.mark_completed(&id);
        }
    }

    fn spawn_position_monitor(self: &Arc<Self>) {
        let bot = self.clone();
        tokio::spawn(async move {
            let interval_duration = bot.cfg.position_manager.monitoring_interval;
            let mut interval = tokio::time::interval(interval_duration);
            loop {
                interval.tick().await;
                if !bot.is_running() {
                    return;
                }
                bot.positions.monitor_tick().await;
            }
        });
    }

    async fn scan_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.cfg.scan_interval);
        loop {
            interval.tick().await;
            if !self.is_running() {
                return;
            }
            self.scan_once().await;
        }
    }

    async fn scan_once(&self) {
        let cycle = self.cycle_count.fetch_add(1, Ordering::SeqCst) + 1;

        let active = self.positions.active_symbols().await;
        if active.len() >= self.cfg.trade_executors.max_concurrent_trades {
            let _ = self.events.send(OrchestratorEvent::ActivityEvent {
                message: "skipping scan cycle: at max concurrent trades".to_string(),
            });
            return;
        }

        if cycle % 3 == 0 {
            let _ = self.events.send(OrchestratorEvent::ActivityEvent {
                message: "reconciling positions with exchange".to_string(),
            });
        }

        let mut candidates = Vec::new();
        for symbol in self.workers.universe() {
            if candidates.len() >= 50 {
                break;
            }
            if active.contains(&symbol) {
                continue;
            }
            if self.is_blacklisted(&symbol).await {
                continue;
            }
            candidates.push(symbol);
        }

        for symbol in candidates {
            if let Err(e) = self
                .workers
                .submit(SymbolTask {
                    symbol,
                    priority: RequestPriority::Critical,
                })
                .await
            {
                warn!("failed to submit symbol task: {}", e);
            }
        }
    }

    async fn handle_worker_events(self: Arc<Self>, rx: &mut broadcast::Receiver<WorkerPoolEvent>) {
        loop {
            match rx.recv().await {
                Ok(WorkerPoolEvent::SignalGenerated(signal)) => {
                    self.handle_signal(signal).await;
                }
                Ok(WorkerPoolEvent::TaskFailed { symbol, .. }) => {
                    self.upsert_blacklist(&symbol).await;
                }
                Ok(WorkerPoolEvent::CircuitBreakerOpened { .. }) => {
                    self.market_data.emergency_stop();
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    }

    async fn handle_signal(&self, signal: signal_core::Signal) {
        if signal.action == Action::Hold || signal.strength < self.cfg.min_signal_strength {
            return;
        }

        let side = match signal.action {
            Action::Buy => signal_core::Side::Buy,
            Action::Sell => signal_core::Side::Sell,
            Action::Hold => return,
        };

        let ticker = match self.market_data.get_ticker(&signal.symbol).await {
            Ok(t) => t,
            Err(e) => {
                warn!("could not fetch ticker for risk validation of {}: {}", signal.symbol, e);
                return;
            }
        };

        let entry_price = ticker.last_price;
        let (stop_loss, take_profit) = match side {
            signal_core::Side::Buy => (
                entry_price * (1.0 - self.cfg.stop_loss_percent / 100.0),
                entry_price * (1.0 + self.cfg.take_profit_percent / 100.0),
            ),
            signal_core::Side::Sell => (
                entry_price * (1.0 + self.cfg.stop_loss_percent / 100.0),
                entry_price * (1.0 - self.cfg.take_profit_percent / 100.0),
            ),
        };

        let quantity = self.cfg.default_position_size / entry_price;
        let account = AccountState {
            equity: self.cfg.default_position_size * 10.0,
            daily_realized_loss: 0.0,
            drawdown_percent: 0.0,
        };

        let assessment = self
            .risk
            .validate(side, quantity, entry_price, stop_loss, take_profit, account);

        if !assessment.is_valid {
            let _ = self.events.send(OrchestratorEvent::TradeRejected {
                code: "RISK_REJECTED",
                message: assessment.errors.join("; "),
            });
            return;
        }

        let volume_above_average = ticker.volume_24h > 0.0;

        if signal.strength >= self.cfg.min_signal_strength + 10.0 && self.cfg.immediate_execution {
            let priority = self.queue.compute_priority(&signal, volume_above_average);
            let ttl = ChronoDuration::from_std(self.cfg.signal_queue.default_ttl).unwrap();
            let queued = QueuedSignal::new(signal.clone(), priority, ttl, self.cfg.signal_queue.max_attempts);

            if self
                .executors
                .execute_immediately(queued, self.cfg.default_position_size)
                .await
                .is_err()
            {
                // ExecuteImmediately found no idle executor; fall back to
                // the priority queue like any other signal.
                let _ = self.queue.enqueue(signal, None, volume_above_average);
            }
            return;
        }

        if let Ok(id) = self.queue.enqueue(signal.clone(), None, volume_above_average) {
            let _ = self.events.send(OrchestratorEvent::ActivityEvent {
                message: format!("queued signal {} for {}", id, signal.symbol),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_min_signal_strength_matches_spec() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.min_signal_strength, 50.0);
    }
}
