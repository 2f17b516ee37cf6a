//! Typed event payloads emitted by each component.
//!
//! The source system fans these out through string-keyed emitters; here
//! each component gets a sealed enum of event variants with a typed
//! payload so subscribers register typed handlers instead of matching on
//! event-name strings.

use crate::models::{ManagedPosition, QueuedSignal, Signal};
use crate::{Error, Symbol};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub enum CacheEvent {
    TickerUpdate { symbol: Symbol, price: f64 },
    SignificantPriceChange { symbol: Symbol, change_pct: f64 },
}

#[derive(Debug, Clone)]
pub enum WorkerPoolEvent {
    SignalGenerated(Signal),
    TaskFailed { symbol: Symbol, error: Error },
    CircuitBreakerOpened { resume_at: DateTime<Utc> },
    CircuitBreakerClosed,
    SymbolsProcessed { count: usize },
    SymbolWaveAdded { symbols: Vec<Symbol> },
}

#[derive(Debug, Clone)]
pub enum QueueEvent {
    SignalExpired { id: String },
    SignalFailed { id: String, error: Error },
}

#[derive(Debug, Clone)]
pub enum ExecutorEvent {
    TradeExecuted {
        symbol: Symbol,
        order_id: String,
        position: ManagedPosition,
    },
    TradeRejected {
        code: &'static str,
        message: String,
        details: String,
    },
    TaskFailed {
        symbol: Symbol,
        error: Error,
    },
}

#[derive(Debug, Clone)]
pub enum PositionEvent {
    PositionRemoved { position: ManagedPosition, reason: CloseReason },
    PositionCloseError { symbol: Symbol, error: Error },
    EmergencyStop { symbol: Symbol },
    MoveToBreakEven { symbol: Symbol },
    ActivateTrailingStop { symbol: Symbol },
    DailyLimitExceeded { loss_usdt: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    Expired,
    StopLoss,
    TakeProfit,
    Emergency,
    Manual,
    ExternallyClosed,
}

#[derive(Debug, Clone)]
pub enum OrchestratorEvent {
    ActivityEvent { message: String },
    TradeRejected { code: &'static str, message: String },
    QueuedSignal(QueuedSignal),
}
