//! Ticker model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Normalized 24h ticker snapshot for a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub last_price: f64,
    pub bid: f64,
    pub ask: f64,
    pub high_24h: f64,
    pub low_24h: f64,
    pub volume_24h: f64,
    pub quote_volume_24h: f64,
    pub change_pct: f64,
    pub last_update: DateTime<Utc>,
}

impl Ticker {
    pub fn mid_price(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}
