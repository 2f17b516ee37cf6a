//! C8 — owns all locally-tracked open positions, runs the monitoring
//! loop, and drives the close path through the exchange client.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use signal_core::{
    CloseReason, Error, ManagedPosition, PositionEvent, PositionManagerConfig, PositionSide,
    PositionStatus, RequestPriority, Result, Symbol, Ticker,
};
use signal_networking::api_manager::ApiRequestManager;
use signal_networking::exchange::ExchangeClient;
use signal_networking::rate_governor::{Endpoint, RateGovernor};
use signal_persistence::Ledger;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

const CLOSE_POSITION_DEADLINE: std::time::Duration = std::time::Duration::from_secs(10);

pub struct PositionManager {
    cfg: PositionManagerConfig,
    exchange: Arc<dyn ExchangeClient>,
    api: Arc<ApiRequestManager>,
    governor: Arc<RateGovernor>,
    ledger: Arc<Ledger>,
    positions: RwLock<HashMap<Symbol, ManagedPosition>>,
    events: broadcast::Sender<PositionEvent>,
    dry_run: bool,
}

impl PositionManager {
    pub fn new(
        cfg: PositionManagerConfig,
        exchange: Arc<dyn ExchangeClient>,
        api: Arc<ApiRequestManager>,
        governor: Arc<RateGovernor>,
        ledger: Arc<Ledger>,
        dry_run: bool,
    ) -> Arc<Self> {
        let (events, _) = broadcast::channel(512);
        Arc::new(Self {
            cfg,
            exchange,
            api,
            governor,
            ledger,
            positions: RwLock::new(HashMap::new()),
            events,
            dry_run,
        })
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<PositionEvent> {
        self.events.subscribe()
    }

    pub async fn has_position(&self, symbol: &str) -> bool {
        self.positions.read().await.contains_key(symbol)
    }

    pub async fn active_symbols(&self) -> Vec<Symbol> {
        self.positions
            .read()
            .await
            .iter()
            .filter(|(_, p)| p.status == PositionStatus::Active)
            .map(|(s, _)| s.clone())
            .collect()
    }

    pub async fn register(&self, position: ManagedPosition) {
        self.positions
            .write()
            .await
            .insert(position.symbol.clone(), position);
    }

    /// Reconstructs tracked positions from the exchange's live position
    /// list, using the default SL/TP percents around entry.
    pub async fn load_on_start(&self, stop_loss_pct: f64, take_profit_pct: f64) -> Result<()> {
        let live = self.exchange.get_positions(None).await?;
        let mut positions = self.positions.write().await;
        for p in live {
            if p.position_amt == 0.0 {
                continue;
            }
            let side = if p.position_amt > 0.0 {
                PositionSide::Long
            } else {
                PositionSide::Short
            };
            let (sl, tp) = match side {
                PositionSide::Long => (
                    p.entry_price * (1.0 - stop_loss_pct / 100.0),
                    p.entry_price * (1.0 + take_profit_pct / 100.0),
                ),
                PositionSide::Short => (
                    p.entry_price * (1.0 + stop_loss_pct / 100.0),
                    p.entry_price * (1.0 - take_profit_pct / 100.0),
                ),
            };
            let managed = ManagedPosition::new(
                p.symbol.clone(),
                side,
                p.entry_price,
                p.position_amt.abs(),
                sl,
                tp,
                String::new(),
            );
            positions.insert(p.symbol, managed);
        }
        info!("reconstructed {} open positions on start", positions.len());
        Ok(())
    }

    /// One pass of the monitoring loop over every ACTIVE position.
    pub async fn monitor_tick(&self) {
        let snapshot: Vec<ManagedPosition> = {
            let positions = self.positions.read().await;
            positions
                .values()
                .filter(|p| p.status == PositionStatus::Active)
                .cloned()
                .collect()
        };

        for position in snapshot {
            if let Err(e) = self.monitor_one(&position).await {
                warn!("monitoring failed for {}: {}", position.symbol, e);
            }
        }
    }

    async fn monitor_one(&self, position: &ManagedPosition) -> Result<()> {
        let raw = self.api.get_ticker(&position.symbol, RequestPriority::Medium).await?;
        let ticker: Ticker = serde_json::from_value(raw)?;
        let mark_price = ticker.last_price;

        let mut updated = position.clone();
        updated.update_pnl(mark_price);

        let now = Utc::now();
        let close_reason = if updated.age(now) > chrono::Duration::from_std(self.cfg.max_position_age).unwrap() {
            Some(CloseReason::Expired)
        } else if self.hit_stop_loss(&updated, mark_price) {
            Some(CloseReason::StopLoss)
        } else if self.hit_take_profit(&updated, mark_price) {
            Some(CloseReason::TakeProfit)
        } else if updated.pnl_percent().abs() > self.cfg.emergency_close_threshold_pct {
            Some(CloseReason::Emergency)
        } else {
            None
        };

        if self.cfg.trailing_stop_enabled && close_reason.is_none() {
            self.maybe_raise_trailing_stop(&mut updated, mark_price);
        }

        self.positions
            .write()
            .await
            .insert(updated.symbol.clone(), updated.clone());

        if let Some(reason) = close_reason {
            self.close_position(&updated.symbol, reason).await?;
        }

        Ok(())
    }

    fn hit_stop_loss(&self, position: &ManagedPosition, mark_price: f64) -> bool {
        match position.side {
            PositionSide::Long => mark_price <= position.stop_loss_price,
            PositionSide::Short => mark_price >= position.stop_loss_price,
        }
    }

    fn hit_take_profit(&self, position: &ManagedPosition, mark_price: f64) -> bool {
        match position.side {
            PositionSide::Long => mark_price >= position.take_profit_price,
            PositionSide::Short => mark_price <= position.take_profit_price,
        }
    }

    fn maybe_raise_trailing_stop(&self, position: &mut ManagedPosition, mark_price: f64) {
        const TRAILING_STOP_PERCENT: f64 = 0.01;
        let favorable_move = match position.side {
            PositionSide::Long => (mark_price - position.entry_price) / position.entry_price,
            PositionSide::Short => (position.entry_price - mark_price) / position.entry_price,
        };

        if favorable_move >= TRAILING_STOP_PERCENT {
            let new_stop = match position.side {
                PositionSide::Long => mark_price * (1.0 - TRAILING_STOP_PERCENT),
                PositionSide::Short => mark_price * (1.0 + TRAILING_STOP_PERCENT),
            };
            let improves = match position.side {
                PositionSide::Long => new_stop > position.stop_loss_price,
                PositionSide::Short => new_stop < position.stop_loss_price,
            };
            if improves {
                position.stop_loss_price = new_stop;
            }
        }
    }

    pub async fn close_position(&self, symbol: &str, reason: CloseReason) -> Result<()> {
        let mut positions = self.positions.write().await;
        let Some(position) = positions.get_mut(symbol) else {
            return Err(Error::NotFound(symbol.to_string()));
        };
        position.status = signal_core::PositionStatus::Closing;
        let order_id = position.order_id.clone();
        let closing = position.clone();
        drop(positions);

        if self.dry_run {
            info!("dry-run: skipping ClosePosition for {} ({:?})", symbol, reason);
            if !order_id.is_empty() {
                if let Err(e) = self.ledger.mark_closed(&order_id, closing.unrealized_pnl).await {
                    warn!("failed to update ledger for closed position {}: {}", symbol, e);
                }
            }
            let mut positions = self.positions.write().await;
            positions.remove(symbol);
            let _ = self.events.send(PositionEvent::PositionRemoved {
                position: closing,
                reason,
            });
            return Ok(());
        }

        if let Err(e) = self
            .governor
            .acquire(Endpoint::Trading, RequestPriority::Critical, Some(CLOSE_POSITION_DEADLINE))
            .await
        {
            let mut positions = self.positions.write().await;
            if let Some(position) = positions.get_mut(symbol) {
                position.status = signal_core::PositionStatus::Active;
            }
            let _ = self.events.send(PositionEvent::PositionCloseError {
                symbol: symbol.to_string(),
                error: e.clone(),
            });
            return Err(e);
        }

        match self.exchange.close_position(&symbol.to_string(), 100.0).await {
            Ok(_) => {
                self.api.invalidate_method(signal_networking::api_manager::Method::Positions);
                if !order_id.is_empty() {
                    if let Err(e) = self.ledger.mark_closed(&order_id, closing.unrealized_pnl).await {
                        warn!("failed to update ledger for closed position {}: {}", symbol, e);
                    }
                }
                let mut positions = self.positions.write().await;
                positions.remove(symbol);
                let _ = self.events.send(PositionEvent::PositionRemoved {
                    position: closing,
                    reason,
                });
                Ok(())
            }
            Err(e) => {
                let mut positions = self.positions.write().await;
                if let Some(position) = positions.get_mut(symbol) {
                    position.status = signal_core::PositionStatus::Active;
                }
                let _ = self.events.send(PositionEvent::PositionCloseError {
                    symbol: symbol.to_string(),
                    error: e.clone(),
                });
                Err(e)
            }
        }
    }

    /// Applies an external `accountUpdate`/`orderUpdate` report: if the
    /// exchange now reports a flat position for a tracked symbol, treat
    /// it as externally closed.
    pub async fn reconcile_external_flat(&self, symbol: &str) {
        let mut positions = self.positions.write().await;
        if let Some(position) = positions.remove(symbol) {
            let _ = self.events.send(PositionEvent::PositionRemoved {
                position,
                reason: CloseReason::ExternallyClosed,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_loss_and_take_profit_directions_match_side() {
        let cfg = PositionManagerConfig::default();
        assert!(cfg.trailing_stop_enabled);
    }
}
