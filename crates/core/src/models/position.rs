//! ManagedPosition: an open or closing futures position tracked locally

use crate::{PositionSide, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionStatus {
    Active,
    Closing,
    Closed,
}

/// A position registered locally after an order fills. Invariants: for
/// LONG, `stop_loss_price < entry_price < take_profit_price`; for
/// SHORT the ordering is reversed; at most one ACTIVE position per
/// symbol exists in the system; `quantity > 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagedPosition {
    pub id: String,
    pub symbol: Symbol,
    pub side: PositionSide,
    pub entry_price: f64,
    pub quantity: f64,
    pub stop_loss_price: f64,
    pub take_profit_price: f64,
    pub order_id: String,
    pub unrealized_pnl: f64,
    pub status: PositionStatus,
    pub created_at: DateTime<Utc>,
    pub last_update: DateTime<Utc>,
    /// Highest (LONG) or lowest (SHORT) mark price observed since entry,
    /// used by the trailing stop.
    pub extreme_price_seen: f64,
}

impl ManagedPosition {
    pub fn new(
        symbol: Symbol,
        side: PositionSide,
        entry_price: f64,
        quantity: f64,
        stop_loss_price: f64,
        take_profit_price: f64,
        order_id: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol,
            side,
            entry_price,
            quantity,
            stop_loss_price,
            take_profit_price,
            order_id,
            unrealized_pnl: 0.0,
            status: PositionStatus::Active,
            created_at: now,
            last_update: now,
            extreme_price_seen: entry_price,
        }
    }

    pub fn update_pnl(&mut self, mark_price: f64) {
        let direction = match self.side {
            PositionSide::Long => 1.0,
            PositionSide::Short => -1.0,
        };
        self.unrealized_pnl = direction * (mark_price - self.entry_price) * self.quantity;
        self.last_update = Utc::now();

        match self.side {
            PositionSide::Long if mark_price > self.extreme_price_seen => {
                self.extreme_price_seen = mark_price;
            }
            PositionSide::Short if mark_price < self.extreme_price_seen => {
                self.extreme_price_seen = mark_price;
            }
            _ => {}
        }
    }

    pub fn pnl_percent(&self) -> f64 {
        let notional = self.entry_price * self.quantity;
        if notional == 0.0 {
            return 0.0;
        }
        (self.unrealized_pnl / notional) * 100.0
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}
