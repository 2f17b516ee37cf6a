//! Signal Pipeline Engine - indicator evaluation, the priority signal
//! queue, risk validation, and the worker/executor/position components
//! that turn market data into managed trades.

pub mod executor;
pub mod indicators;
pub mod market_data_cache;
pub mod orchestrator;
pub mod positions;
pub mod queue;
pub mod risk;
pub mod workers;

pub use executor::TradeExecutorPool;
pub use indicators::evaluate_indicators;
pub use market_data_cache::MarketDataCache;
pub use orchestrator::TradingBot;
pub use positions::PositionManager;
pub use queue::PrioritySignalQueue;
pub use risk::RiskValidator;
pub use workers::SignalWorkerPool;
