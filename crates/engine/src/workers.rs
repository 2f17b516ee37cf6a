//! C4 — fixed worker pool that turns `SymbolTask`s into `Signal`s, plus
//! the progressive symbol-universe loader the pool owns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use signal_core::{
    CircuitBreakerState, Error, IndicatorConfig, RequestPriority, Result, Signal,
    SignalWorkerConfig, Symbol, SymbolStatus, WorkerPoolEvent,
};
use signal_networking::api_manager::ApiRequestManager;
use tokio::sync::{broadcast, mpsc, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use crate::indicators::evaluate_indicators;
use crate::market_data_cache::MarketDataCache;

#[derive(Debug, Clone)]
pub struct SymbolTask {
    pub symbol: Symbol,
    pub priority: RequestPriority,
}

pub struct SignalWorkerPool {
    cfg: SignalWorkerConfig,
    indicator_cfg: IndicatorConfig,
    market_data: Arc<MarketDataCache>,
    api: Arc<ApiRequestManager>,
    kline_interval: String,
    task_tx: mpsc::Sender<SymbolTask>,
    task_rx: AsyncMutex<mpsc::Receiver<SymbolTask>>,
    breaker: std::sync::Mutex<CircuitBreakerState>,
    breaker_open: AtomicBool,
    events: broadcast::Sender<WorkerPoolEvent>,
    universe: std::sync::Mutex<Vec<Symbol>>,
}

impl SignalWorkerPool {
    pub fn new(
        cfg: SignalWorkerConfig,
        indicator_cfg: IndicatorConfig,
        kline_interval: impl Into<String>,
        market_data: Arc<MarketDataCache>,
        api: Arc<ApiRequestManager>,
    ) -> Arc<Self> {
        let (task_tx, task_rx) = mpsc::channel(cfg.max_concurrent_tasks.max(1) * 4);
        let (events, _) = broadcast::channel(512);

        Arc::new(Self {
            cfg,
            indicator_cfg,
            market_data,
            api,
            kline_interval: kline_interval.into(),
            task_tx,
            task_rx: AsyncMutex::new(task_rx),
            breaker: std::sync::Mutex::new(CircuitBreakerState::default()),
            breaker_open: AtomicBool::new(false),
            events,
            universe: std::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WorkerPoolEvent> {
        self.events.subscribe()
    }

    pub fn is_breaker_open(&self) -> bool {
        self.breaker_open.load(Ordering::Relaxed)
    }

    pub fn reset_breaker(&self) {
        self.breaker.lock().unwrap().reset();
        self.breaker_open.store(false, Ordering::Relaxed);
        let _ = self.events.send(WorkerPoolEvent::CircuitBreakerClosed);
    }

    fn check_breaker_resume(&self) {
        let mut breaker = self.breaker.lock().unwrap();
        if breaker.maybe_resume(chrono::Utc::now()) {
            self.breaker_open.store(false, Ordering::Relaxed);
            let _ = self.events.send(WorkerPoolEvent::CircuitBreakerClosed);
        }
    }

    fn record_success(&self) {
        self.breaker.lock().unwrap().record_success();
    }

    fn record_failure(&self) {
        let opened = self.breaker.lock().unwrap().record_failure();
        if opened {
            self.breaker_open.store(true, Ordering::Relaxed);
            let resume_at = self.breaker.lock().unwrap().resume_at.unwrap();
            warn!("signal worker pool circuit breaker opened until {}", resume_at);
            let _ = self.events.send(WorkerPoolEvent::CircuitBreakerOpened { resume_at });
        }
    }

    /// Enqueues a task; suspends if the internal bounded queue is full.
    pub async fn submit(&self, task: SymbolTask) -> Result<()> {
        self.task_tx
            .send(task)
            .await
            .map_err(|_| Error::StateInconsistency("worker pool queue closed".to_string()))
    }

    /// Spawns `cfg.max_workers` worker tasks that pull from the shared queue.
    pub fn spawn_workers(self: &Arc<Self>) {
        for id in 0..self.cfg.max_workers {
            let pool = self.clone();
            tokio::spawn(async move { pool.worker_loop(id).await });
        }
    }

    async fn worker_loop(self: Arc<Self>, id: usize) {
        loop {
            self.check_breaker_resume();
            if self.is_breaker_open() {
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                continue;
            }

            let task = {
                let mut rx = self.task_rx.lock().await;
                rx.recv().await
            };
            let Some(task) = task else {
                debug!("worker {} exiting: task channel closed", id);
                return;
            };

            match tokio::time::timeout(self.cfg.task_timeout, self.process_task(&task)).await {
                Ok(Ok(())) => self.record_success(),
                Ok(Err(e)) => {
                    self.record_failure();
                    let _ = self.events.send(WorkerPoolEvent::TaskFailed {
                        symbol: task.symbol.clone(),
                        error: e,
                    });
                }
                Err(_) => {
                    self.record_failure();
                    let _ = self.events.send(WorkerPoolEvent::TaskFailed {
                        symbol: task.symbol.clone(),
                        error: Error::StateInconsistency("task timed out".to_string()),
                    });
                }
            }
        }
    }

    async fn process_task(&self, task: &SymbolTask) -> Result<()> {
        let ticker = self.market_data.get_ticker(&task.symbol).await?;
        if ticker.quote_volume_24h < self.cfg.min_volume_usdt {
            let hold = Signal::hold(task.symbol.clone(), "volume below minimum");
            let _ = self.events.send(WorkerPoolEvent::SignalGenerated(hold));
            return Ok(());
        }

        let klines = self
            .market_data
            .get_klines(&task.symbol, &self.kline_interval, 100)
            .await?;

        let signal = evaluate_indicators(&klines, &task.symbol, &self.indicator_cfg);
        let _ = self.events.send(WorkerPoolEvent::SignalGenerated(signal));
        Ok(())
    }

    /// Fetches the full tradable universe, ranks by 24h volume, and
    /// emits the first wave immediately with subsequent waves following.
    pub async fn load_symbol_universe(&self) -> Result<()> {
        let raw_symbols = self.api.get_symbols(RequestPriority::High).await?;
        let symbols: Vec<signal_core::SymbolInfo> = serde_json::from_value(raw_symbols)?;

        let candidates: Vec<Symbol> = symbols
            .into_iter()
            .filter(|s| matches!(s.status, SymbolStatus::Trading) && s.quote_asset == "USDT")
            .map(|s| s.symbol)
            .collect();

        let mut ranked: Vec<(Symbol, f64)> = Vec::with_capacity(candidates.len());
        for batch in candidates.chunks(20) {
            let futures = batch
                .iter()
                .map(|symbol| self.api.get_ticker(symbol, RequestPriority::Low));
            let results = futures_util::future::join_all(futures).await;
            for (symbol, result) in batch.iter().zip(results) {
                match result {
                    Ok(value) => {
                        if let Ok(ticker) = serde_json::from_value::<signal_core::Ticker>(value) {
                            ranked.push((symbol.clone(), ticker.quote_volume_24h));
                        }
                    }
                    Err(e) => debug!("volume fetch failed for {}: {}", symbol, e),
                }
            }
        }

        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap());

        let mut qualifying: Vec<Symbol> = ranked
            .iter()
            .filter(|(_, volume)| *volume >= self.cfg.min_volume_usdt)
            .map(|(symbol, _)| symbol.clone())
            .collect();

        if qualifying.len() < 50 {
            qualifying = ranked.iter().take(50).map(|(s, _)| s.clone()).collect();
        }
        qualifying.truncate(self.cfg.max_universe_size);

        info!("symbol universe loaded: {} symbols", qualifying.len());
        *self.universe.lock().unwrap() = qualifying.clone();
        let _ = self.events.send(WorkerPoolEvent::SymbolsProcessed {
            count: qualifying.len(),
        });

        let first_wave: Vec<Symbol> = qualifying
            .iter()
            .take(self.cfg.first_wave_size)
            .cloned()
            .collect();
        let _ = self.events.send(WorkerPoolEvent::SymbolWaveAdded {
            symbols: first_wave,
        });

        for remaining in qualifying[self.cfg.first_wave_size.min(qualifying.len())..]
            .chunks(self.cfg.first_wave_size.max(1))
        {
            let _ = self.events.send(WorkerPoolEvent::SymbolWaveAdded {
                symbols: remaining.to_vec(),
            });
        }

        Ok(())
    }

    pub fn universe(&self) -> Vec<Symbol> {
        self.universe.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn breaker_starts_closed() {
        let cfg = SignalWorkerConfig::default();
        assert_eq!(cfg.circuit_breaker_threshold, 10);
    }
}
