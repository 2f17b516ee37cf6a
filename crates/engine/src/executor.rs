//! C7 — fixed pool of trade executors turning `QueuedSignal`s into
//! placed orders, ledger rows, and registered `ManagedPosition`s.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use signal_core::{
    Error, ExecutorEvent, ManagedPosition, NewTrade, OrderRequest, OrderType, PositionSide,
    QueuedSignal, RequestPriority, Result, Side, Symbol, TaskAction, TradeExecutorConfig,
    TradeTask,
};
use signal_networking::api_manager::ApiRequestManager;
use signal_networking::exchange::ExchangeClient;
use signal_persistence::Ledger;
use tokio::sync::{broadcast, mpsc, Mutex as AsyncMutex, RwLock};
use tracing::{info, warn};

use crate::positions::PositionManager;

const STALE_SIGNAL_AGE_SECS: i64 = 60;
const LOCAL_RATE_WINDOW_SECS: i64 = 1;

pub struct TradeExecutorPool {
    cfg: TradeExecutorConfig,
    api: Arc<ApiRequestManager>,
    exchange: Arc<dyn ExchangeClient>,
    ledger: Arc<Ledger>,
    positions: Arc<PositionManager>,
    task_tx: mpsc::Sender<TradeTask>,
    task_rx: AsyncMutex<mpsc::Receiver<TradeTask>>,
    active_positions: RwLock<HashSet<Symbol>>,
    last_local_dispatch: std::sync::Mutex<chrono::DateTime<Utc>>,
    idle_executors: AtomicBool,
    events: broadcast::Sender<ExecutorEvent>,
    stop_loss_pct: f64,
    take_profit_pct: f64,
    dry_run: bool,
}

impl TradeExecutorPool {
    pub fn new(
        cfg: TradeExecutorConfig,
        api: Arc<ApiRequestManager>,
        exchange: Arc<dyn ExchangeClient>,
        ledger: Arc<Ledger>,
        positions: Arc<PositionManager>,
        stop_loss_pct: f64,
        take_profit_pct: f64,
        dry_run: bool,
    ) -> Arc<Self> {
        let (task_tx, task_rx) = mpsc::channel(cfg.max_executors.max(1) * 4);
        let (events, _) = broadcast::channel(512);

        Arc::new(Self {
            cfg,
            api,
            exchange,
            ledger,
            positions,
            task_tx,
            task_rx: AsyncMutex::new(task_rx),
            active_positions: RwLock::new(HashSet::new()),
            last_local_dispatch: std::sync::Mutex::new(Utc::now() - chrono::Duration::seconds(10)),
            idle_executors: AtomicBool::new(true),
            events,
            stop_loss_pct,
            take_profit_pct,
            dry_run,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ExecutorEvent> {
        self.events.subscribe()
    }

    pub fn spawn_executors(self: &Arc<Self>) {
        for id in 0..self.cfg.max_executors {
            let pool = self.clone();
            tokio::spawn(async move { pool.executor_loop(id).await });
        }
    }

    async fn active_count(&self) -> usize {
        self.active_positions.read().await.len()
    }

    fn local_rate_limited(&self) -> bool {
        let mut last = self.last_local_dispatch.lock().unwrap();
        let now = Utc::now();
        if (now - *last) < chrono::Duration::seconds(LOCAL_RATE_WINDOW_SECS) {
            true
        } else {
            *last = now;
            false
        }
    }

    /// Builds the actionable task the spec's TradeTask model describes.
    /// HOLD signals never reach the executor pool.
    fn build_task(&self, queued_signal: QueuedSignal, position_size: f64) -> Result<TradeTask> {
        let action = match queued_signal.signal.action {
            signal_core::Action::Buy => TaskAction::Buy,
            signal_core::Action::Sell => TaskAction::Sell,
            signal_core::Action::Hold => {
                return Err(Error::InvalidData("HOLD signal reached executor".to_string()))
            }
        };
        Ok(TradeTask::from_queued(
            queued_signal,
            action,
            position_size,
            self.cfg.max_slippage_percent,
            self.cfg.retry_attempts,
        ))
    }

    /// Enqueues the task, refusing on the conditions in the rejection surface.
    pub async fn add_signal(&self, queued_signal: QueuedSignal, position_size: f64) -> Result<()> {
        if self.local_rate_limited() {
            return Err(self.reject("RATE_LIMITED", "local dispatch window exceeded"));
        }
        if self.active_count().await >= self.cfg.max_concurrent_trades {
            return Err(self.reject("MAX_CONCURRENT_TRADES", "max concurrent trades reached"));
        }
        if self
            .active_positions
            .read()
            .await
            .contains(&queued_signal.signal.symbol)
        {
            return Err(self.reject("POSITION_EXISTS", "symbol already has an active position"));
        }

        let task = self.build_task(queued_signal, position_size)?;
        self.task_tx
            .send(task)
            .await
            .map_err(|_| self.reject("QUEUE_CLOSED", "executor task channel closed"))
    }

    /// Tries to claim an idle executor without queueing; falls back to `add_signal`.
    pub async fn execute_immediately(&self, queued_signal: QueuedSignal, position_size: f64) -> Result<()> {
        if self.idle_executors.swap(false, Ordering::SeqCst) {
            let task = self.build_task(queued_signal, position_size);
            let result = match task {
                Ok(task) => self.run_execution(&task).await,
                Err(e) => Err(e),
            };
            self.idle_executors.store(true, Ordering::SeqCst);
            result
        } else {
            self.add_signal(queued_signal, position_size).await
        }
    }

    fn reject(&self, code: &'static str, message: &str) -> Error {
        let _ = self.events.send(ExecutorEvent::TradeRejected {
            code,
            message: message.to_string(),
            details: String::new(),
        });
        Error::StateInconsistency(message.to_string())
    }

    async fn executor_loop(self: Arc<Self>, id: usize) {
        loop {
            let task = {
                let mut rx = self.task_rx.lock().await;
                rx.recv().await
            };
            let Some(mut task) = task else {
                tracing::debug!("executor {} exiting: task channel closed", id);
                return;
            };

            loop {
                let outcome = tokio::time::timeout(self.cfg.execution_timeout, self.run_execution(&task)).await;
                match outcome {
                    Ok(Ok(())) => break,
                    Ok(Err(_)) | Err(_) => {
                        task.attempts += 1;
                        if !task.can_retry() {
                            let _ = self.events.send(ExecutorEvent::TaskFailed {
                                symbol: task.symbol.clone(),
                                error: Error::StateInconsistency("execution retries exhausted".to_string()),
                            });
                            break;
                        }
                    }
                }
            }
        }
    }

    async fn run_execution(&self, task: &TradeTask) -> Result<()> {
        let signal = &task.queued_signal.signal;
        let symbol = signal.symbol.clone();

        if signal.age(Utc::now()) > chrono::Duration::seconds(STALE_SIGNAL_AGE_SECS) {
            return self.fail(&symbol, Error::SignalStale {
                age_secs: signal.age(Utc::now()).num_seconds().max(0) as u64,
            });
        }

        let balance = self
            .api
            .get_balance("USDT", RequestPriority::High)
            .await
            .and_then(|v| serde_json::from_value::<signal_core::Balance>(v).map_err(Into::into));
        let balance = match balance {
            Ok(b) => b,
            Err(e) => return self.fail(&symbol, e),
        };
        if balance.asset_free < task.position_size {
            return self.fail(
                &symbol,
                Error::InsufficientBalance {
                    required: task.position_size,
                    available: balance.asset_free,
                },
            );
        }

        if self.positions.has_position(&symbol).await {
            return self.fail(&symbol, Error::PositionExists(symbol.clone()));
        }

        let price = match self.api.get_ticker(&symbol, RequestPriority::High).await {
            Ok(v) => match serde_json::from_value::<signal_core::Ticker>(v) {
                Ok(t) => t.last_price,
                Err(e) => return self.fail(&symbol, e.into()),
            },
            Err(e) => return self.fail(&symbol, e),
        };

        let side = match task.action {
            TaskAction::Buy => Side::Buy,
            TaskAction::Sell => Side::Sell,
        };
        let position_side = match side {
            Side::Buy => PositionSide::Long,
            Side::Sell => PositionSide::Short,
        };

        let (stop_loss, take_profit) = match position_side {
            PositionSide::Long => (
                price * (1.0 - self.stop_loss_pct / 100.0),
                price * (1.0 + self.take_profit_pct / 100.0),
            ),
            PositionSide::Short => (
                price * (1.0 + self.stop_loss_pct / 100.0),
                price * (1.0 - self.take_profit_pct / 100.0),
            ),
        };

        let quantity = task.position_size / price;

        if self.dry_run {
            info!(
                "dry-run: would place {:?} order for {} qty={:.6} price={:.2} sl={:.2} tp={:.2}",
                side, symbol, quantity, price, stop_loss, take_profit
            );
            let _ = self.events.send(ExecutorEvent::TradeExecuted {
                symbol: symbol.clone(),
                order_id: format!("DRY-RUN-{}", signal.id),
                position: ManagedPosition::new(
                    symbol.clone(),
                    position_side,
                    price,
                    quantity,
                    stop_loss,
                    take_profit,
                    String::new(),
                ),
            });
            return Ok(());
        }

        let request = OrderRequest {
            symbol: symbol.clone(),
            side,
            position_side,
            quantity,
            stop_loss: Some(stop_loss),
            take_profit: Some(take_profit),
        };

        let ack = match self.exchange.place_order(request).await {
            Ok(ack) => ack,
            Err(e) => return self.fail(&symbol, e),
        };

        let indicators_json = serde_json::to_string(&signal.indicators).unwrap_or_default();
        let new_trade = NewTrade {
            order_id: ack.order_id.clone(),
            symbol: symbol.clone(),
            side,
            position_side,
            order_type: OrderType::Market,
            quantity,
            price,
            stop_loss_price: Some(stop_loss),
            take_profit_price: Some(take_profit),
            signal_strength: signal.strength,
            signal_reason: signal.reason.clone(),
            indicators: indicators_json,
        };

        if let Err(e) = self.ledger.insert_new(&new_trade).await {
            warn!("failed to write ledger row for {}: {}", symbol, e);
        }

        let managed = ManagedPosition::new(
            symbol.clone(),
            position_side,
            price,
            quantity,
            stop_loss,
            take_profit,
            ack.order_id.clone(),
        );
        self.positions.register(managed.clone()).await;
        self.active_positions.write().await.insert(symbol.clone());
        self.api.invalidate_method(signal_networking::api_manager::Method::Positions);

        info!("executed trade for {} order_id={}", symbol, ack.order_id);
        let _ = self.events.send(ExecutorEvent::TradeExecuted {
            symbol,
            order_id: ack.order_id,
            position: managed,
        });

        Ok(())
    }

    fn fail(&self, symbol: &str, error: Error) -> Result<()> {
        warn!("trade execution failed for {}: {}", symbol, error);
        let _ = self.events.send(ExecutorEvent::TaskFailed {
            symbol: symbol.to_string(),
            error: error.clone(),
        });
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_spec_ranges() {
        let cfg = TradeExecutorConfig::default();
        assert!(cfg.max_executors >= 3 && cfg.max_executors <= 8);
        assert!(cfg.max_concurrent_trades >= 5 && cfg.max_concurrent_trades <= 15);
    }
}
