//! Signal model produced by indicator evaluation

use crate::{Action, Symbol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A directional recommendation with a confidence score, computed from
/// price and volume indicators. Created by workers, consumed exactly
/// once by the executor pool, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub symbol: Symbol,
    pub action: Action,
    /// Confidence score in [0, 100]
    pub strength: f64,
    pub reason: String,
    pub indicators: HashMap<String, f64>,
    pub created_at: DateTime<Utc>,
}

impl Signal {
    pub fn new(symbol: Symbol, action: Action, strength: f64, reason: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            symbol,
            action,
            strength: strength.clamp(0.0, 100.0),
            reason: reason.into(),
            indicators: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_indicators(mut self, indicators: HashMap<String, f64>) -> Self {
        self.indicators = indicators;
        self
    }

    pub fn hold(symbol: Symbol, reason: impl Into<String>) -> Self {
        Self::new(symbol, Action::Hold, 0.0, reason)
    }

    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.created_at
    }
}
