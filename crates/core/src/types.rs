//! Shared newtypes and small value types

use serde::{Deserialize, Serialize};

/// Trading pair symbol, e.g. "BTC-USDT". Primary key throughout the pipeline.
pub type Symbol = String;

/// Price of one unit in quote currency.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Price(pub f64);

impl Price {
    pub fn new(v: f64) -> Self {
        Price(v)
    }

    pub fn as_f64(&self) -> f64 {
        self.0
    }
}

/// Quantity of the base asset.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Quantity(pub f64);

impl Quantity {
    pub fn new(v: f64) -> Self {
        Quantity(v)
    }

    pub fn as_f64(&self) -> f64 {
        self.0
    }

    /// Truncate to 8 fractional digits, the exchange's reported precision.
    pub fn truncated(&self) -> Self {
        Quantity((self.0 * 1e8).floor() / 1e8)
    }
}

/// Notional value in quote currency (quantity * price).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Notional(pub f64);

impl Notional {
    pub fn new(v: f64) -> Self {
        Notional(v)
    }

    pub fn as_f64(&self) -> f64 {
        self.0
    }
}

/// Percentage value (e.g. strength confidence, ROI).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Percent(pub f64);

impl Percent {
    pub fn new(v: f64) -> Self {
        Percent(v)
    }

    pub fn as_f64(&self) -> f64 {
        self.0
    }
}

/// Request priority, lower numeric value dispatches first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum RequestPriority {
    Critical = 1,
    High = 2,
    Medium = 3,
    Low = 4,
}

impl Default for RequestPriority {
    fn default() -> Self {
        RequestPriority::Medium
    }
}

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

/// Position side on the futures venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
}

/// Directional recommendation emitted by indicator evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}
