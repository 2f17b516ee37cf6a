//! Trade ledger row — one per order, persisted externally

use crate::{PositionSide, Side, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Limit,
    Market,
    StopMarket,
    TakeProfitMarket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Expired,
    Rejected,
}

/// One row per order in the external trade ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: i64,
    pub order_id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub position_side: PositionSide,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub quantity: f64,
    pub price: f64,
    pub executed_qty: f64,
    pub avg_price: f64,
    pub stop_price: Option<f64>,
    pub take_profit_price: Option<f64>,
    pub stop_loss_price: Option<f64>,
    pub commission: f64,
    pub commission_asset: Option<String>,
    pub realized_pnl: f64,
    pub signal_strength: f64,
    pub signal_reason: String,
    pub indicators: String,
    pub executed_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to insert a new row before the order confirms a fill.
#[derive(Debug, Clone)]
pub struct NewTrade {
    pub order_id: String,
    pub symbol: Symbol,
    pub side: Side,
    pub position_side: PositionSide,
    pub order_type: OrderType,
    pub quantity: f64,
    pub price: f64,
    pub stop_loss_price: Option<f64>,
    pub take_profit_price: Option<f64>,
    pub signal_strength: f64,
    pub signal_reason: String,
    pub indicators: String,
}
