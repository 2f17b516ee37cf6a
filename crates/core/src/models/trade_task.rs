//! TradeTask: an actionable order derived from a QueuedSignal

use crate::models::QueuedSignal;
use crate::Symbol;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Action a `TradeTask` carries out. HOLD signals never become a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeTask {
    pub id: String,
    pub queued_signal: QueuedSignal,
    pub symbol: Symbol,
    pub action: TaskAction,
    /// Position size in quote currency
    pub position_size: f64,
    pub max_slippage: f64,
    pub priority: f64,
    pub attempts: u32,
    pub max_attempts: u32,
    pub created_at: DateTime<Utc>,
}

impl TradeTask {
    pub fn from_queued(
        queued_signal: QueuedSignal,
        action: TaskAction,
        position_size: f64,
        max_slippage: f64,
        max_attempts: u32,
    ) -> Self {
        let symbol = queued_signal.signal.symbol.clone();
        let priority = queued_signal.priority;
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            queued_signal,
            symbol,
            action,
            position_size,
            max_slippage,
            priority,
            attempts: 0,
            max_attempts,
            created_at: Utc::now(),
        }
    }

    pub fn can_retry(&self) -> bool {
        self.attempts < self.max_attempts
    }
}
