//! Canonical shapes that every exchange REST/WS adapter normalizes into.
//!
//! The wire formats vary (object vs positional-array klines, array vs
//! nested-array vs single-object balances) — adapters in
//! `signal-networking` normalize raw JSON into these structs so the
//! rest of the pipeline only ever deals with one shape per concept.

use crate::Symbol;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymbolStatus {
    Trading,
    Other(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub symbol: Symbol,
    pub status: SymbolStatus,
    pub quote_asset: String,
}

/// Free and total balance of the account's quote asset (USDT live,
/// VST demo).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Balance {
    pub asset_free: f64,
    pub asset_total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangePosition {
    pub symbol: Symbol,
    pub position_amt: f64,
    pub entry_price: f64,
    pub mark_price: f64,
    pub unrealized_profit: f64,
    pub liquidation_price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: Symbol,
    pub side: crate::Side,
    pub position_side: crate::PositionSide,
    pub quantity: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: String,
}
