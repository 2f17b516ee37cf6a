//! Configuration knobs read by the pipeline.
//!
//! Mirrors the full set of tunables the orchestrator and its components
//! read at startup. Defaults match the reference values; everything is
//! overridable via environment variables (see `EngineConfig::from_env`).

use std::env;
use std::time::Duration;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone)]
pub struct SignalWorkerConfig {
    pub max_workers: usize,
    pub max_concurrent_tasks: usize,
    pub task_timeout: Duration,
    pub retry_attempts: u32,
    pub min_volume_usdt: f64,
    pub max_universe_size: usize,
    pub first_wave_size: usize,
    pub circuit_breaker_threshold: u32,
    pub circuit_breaker_cooldown: Duration,
}

impl Default for SignalWorkerConfig {
    fn default() -> Self {
        Self {
            max_workers: 5,
            max_concurrent_tasks: 15,
            task_timeout: Duration::from_millis(6000),
            retry_attempts: 2,
            min_volume_usdt: 10_000.0,
            max_universe_size: 500,
            first_wave_size: 50,
            circuit_breaker_threshold: 10,
            circuit_breaker_cooldown: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PriorityWeights {
    pub strength: f64,
    pub recency: f64,
    pub volume: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            strength: 0.6,
            recency: 0.3,
            volume: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignalQueueConfig {
    pub max_size: usize,
    pub default_ttl: Duration,
    pub max_attempts: u32,
    pub deduplication_window: Duration,
    pub priority_weights: PriorityWeights,
    pub sweep_interval: Duration,
}

impl Default for SignalQueueConfig {
    fn default() -> Self {
        Self {
            max_size: 100,
            default_ttl: Duration::from_millis(30_000),
            max_attempts: 3,
            deduplication_window: Duration::from_millis(60_000),
            priority_weights: PriorityWeights::default(),
            sweep_interval: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TradeExecutorConfig {
    pub max_executors: usize,
    pub execution_timeout: Duration,
    pub retry_attempts: u32,
    pub rate_limit_per_sec: f64,
    pub max_concurrent_trades: usize,
    pub max_slippage_percent: f64,
}

impl Default for TradeExecutorConfig {
    fn default() -> Self {
        Self {
            max_executors: 3,
            execution_timeout: Duration::from_millis(10_000),
            retry_attempts: 2,
            rate_limit_per_sec: 0.8,
            max_concurrent_trades: 5,
            max_slippage_percent: 0.5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MarketDataCacheConfig {
    pub ticker_ttl: Duration,
    pub kline_ttl: Duration,
    pub max_cache_size: usize,
    pub price_change_threshold: f64,
    pub preload_batch_size: usize,
}

impl Default for MarketDataCacheConfig {
    fn default() -> Self {
        Self {
            ticker_ttl: Duration::from_millis(10_000),
            kline_ttl: Duration::from_millis(60_000),
            max_cache_size: 150,
            price_change_threshold: 0.1,
            preload_batch_size: 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PositionManagerConfig {
    pub monitoring_interval: Duration,
    pub emergency_close_threshold_pct: f64,
    pub max_position_age: Duration,
    pub trailing_stop_enabled: bool,
}

impl Default for PositionManagerConfig {
    fn default() -> Self {
        Self {
            monitoring_interval: Duration::from_millis(3000),
            emergency_close_threshold_pct: 5.0,
            max_position_age: Duration::from_secs(12 * 3600),
            trailing_stop_enabled: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RiskConfig {
    pub max_position_size_percent: f64,
    pub max_drawdown_percent: f64,
    pub max_daily_loss_usdt: f64,
    pub risk_reward_ratio: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_size_percent: 20.0,
            max_drawdown_percent: 15.0,
            max_daily_loss_usdt: 500.0,
            risk_reward_ratio: 2.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IndicatorConfig {
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub volume_spike_threshold: f64,
    pub ma1_period: usize,
    pub ma2_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_oversold: 30.0,
            rsi_overbought: 70.0,
            volume_spike_threshold: 1.5,
            ma1_period: 9,
            ma2_period: 21,
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub scan_interval: Duration,
    pub symbols_to_scan: Option<Vec<String>>,
    pub default_position_size: f64,
    pub stop_loss_percent: f64,
    pub take_profit_percent: f64,
    pub trailing_stop_percent: f64,
    pub min_signal_strength: f64,
    pub immediate_execution: bool,
    pub signal_workers: SignalWorkerConfig,
    pub signal_queue: SignalQueueConfig,
    pub trade_executors: TradeExecutorConfig,
    pub market_data_cache: MarketDataCacheConfig,
    pub position_manager: PositionManagerConfig,
    pub risk: RiskConfig,
    pub indicators: IndicatorConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_millis(15_000),
            symbols_to_scan: None,
            default_position_size: 100.0,
            stop_loss_percent: 2.0,
            take_profit_percent: 3.0,
            trailing_stop_percent: 1.0,
            min_signal_strength: 50.0,
            immediate_execution: true,
            signal_workers: SignalWorkerConfig::default(),
            signal_queue: SignalQueueConfig::default(),
            trade_executors: TradeExecutorConfig::default(),
            market_data_cache: MarketDataCacheConfig::default(),
            position_manager: PositionManagerConfig::default(),
            risk: RiskConfig::default(),
            indicators: IndicatorConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load overrides from environment variables on top of the defaults.
    /// Unset or unparsable variables fall back silently, mirroring the
    /// rest of the corpus's `from_env` helpers.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        cfg.scan_interval = Duration::from_millis(env_or("SCAN_INTERVAL_MS", 15_000));
        cfg.default_position_size = env_or("DEFAULT_POSITION_SIZE", cfg.default_position_size);
        cfg.stop_loss_percent = env_or("STOP_LOSS_PERCENT", cfg.stop_loss_percent);
        cfg.take_profit_percent = env_or("TAKE_PROFIT_PERCENT", cfg.take_profit_percent);
        cfg.trailing_stop_percent = env_or("TRAILING_STOP_PERCENT", cfg.trailing_stop_percent);
        cfg.min_signal_strength = env_or("MIN_SIGNAL_STRENGTH", cfg.min_signal_strength);
        cfg.immediate_execution = env_or("IMMEDIATE_EXECUTION", cfg.immediate_execution);

        cfg.signal_workers.max_workers = env_or("SIGNAL_WORKERS_MAX", cfg.signal_workers.max_workers);
        cfg.signal_workers.min_volume_usdt =
            env_or("MIN_VOLUME_USDT", cfg.signal_workers.min_volume_usdt);

        cfg.trade_executors.max_executors =
            env_or("TRADE_EXECUTORS_MAX", cfg.trade_executors.max_executors);
        cfg.trade_executors.max_concurrent_trades =
            env_or("MAX_CONCURRENT_TRADES", cfg.trade_executors.max_concurrent_trades);

        cfg.risk.max_drawdown_percent = env_or("MAX_DRAWDOWN_PERCENT", cfg.risk.max_drawdown_percent);
        cfg.risk.max_daily_loss_usdt = env_or("MAX_DAILY_LOSS_USDT", cfg.risk.max_daily_loss_usdt);
        cfg.risk.max_position_size_percent =
            env_or("MAX_POSITION_SIZE_PERCENT", cfg.risk.max_position_size_percent);
        cfg.risk.risk_reward_ratio = env_or("RISK_REWARD_RATIO", cfg.risk.risk_reward_ratio);

        cfg
    }
}
