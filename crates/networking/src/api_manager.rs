//! C2 — deduplicated, cached, priority-queued REST facade over the
//! exchange client.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use signal_core::{Error, RequestPriority, Result};
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tracing::{debug, warn};

use crate::exchange::ExchangeClient;
use crate::rate_governor::{Endpoint, RateGovernor};
use signal_persistence::TtlCache;

const QUEUE_TIMEOUT: Duration = Duration::from_secs(8);

#[derive(Debug, Clone, Copy)]
pub enum Method {
    Symbols,
    Ticker,
    Klines,
    Balance,
    Positions,
}

impl Method {
    fn ttl(self) -> Duration {
        match self {
            Method::Balance => Duration::from_secs(45),
            Method::Positions => Duration::from_secs(20),
            Method::Klines => Duration::from_secs(90),
            Method::Ticker => Duration::from_secs(15),
            Method::Symbols => Duration::from_secs(300),
        }
    }

    fn endpoint(self) -> Endpoint {
        match self {
            Method::Balance | Method::Positions => Endpoint::Trading,
            _ => Endpoint::MarketData,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Method::Symbols => "symbols",
            Method::Ticker => "ticker",
            Method::Klines => "klines",
            Method::Balance => "balance",
            Method::Positions => "positions",
        }
    }
}

fn cache_key(method: Method, args: &Value) -> String {
    format!("{}:{}", method.name(), args)
}

/// Facade combining C1 rate limiting, a TTL response cache, and
/// in-flight request deduplication.
pub struct ApiRequestManager {
    client: Arc<dyn ExchangeClient>,
    governor: Arc<RateGovernor>,
    cache: TtlCache<String, Value>,
    in_flight: AsyncMutex<
        std::collections::HashMap<String, broadcast::Sender<std::result::Result<Value, String>>>,
    >,
}

impl ApiRequestManager {
    pub fn new(client: Arc<dyn ExchangeClient>, governor: Arc<RateGovernor>) -> Self {
        Self {
            client,
            governor,
            cache: TtlCache::with_capacity(Duration::from_secs(60), 2000),
            in_flight: AsyncMutex::new(std::collections::HashMap::new()),
        }
    }

    /// Fetch through cache + dedup + rate limiting, running `fetch` on
    /// a genuine cache miss. `fetch` must not be called more than once
    /// concurrently for the same key.
    async fn fetch_cached<F, Fut>(
        &self,
        method: Method,
        args: Value,
        priority: RequestPriority,
        fetch: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Value>>,
    {
        let key = cache_key(method, &args);

        if let Some(hit) = self.cache.get(&key) {
            debug!("cache hit for {}", key);
            return Ok(hit);
        }

        // Join an in-flight request for the same key if one exists.
        let mut receiver = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(sender) = in_flight.get(&key) {
                Some(sender.subscribe())
            } else {
                let (sender, _rx) = broadcast::channel(8);
                in_flight.insert(key.clone(), sender);
                None
            }
        };

        if let Some(rx) = receiver.take() {
            return await_broadcast(rx).await;
        }

        // QUEUE_TIMEOUT bounds only the wait for a governor slot; once
        // acquired, the REST call runs under its own budget so slow-but-
        // healthy responses don't spuriously report a queueing timeout.
        let acquire_result = tokio::time::timeout(
            QUEUE_TIMEOUT,
            self.governor.acquire(method.endpoint(), priority, Some(QUEUE_TIMEOUT)),
        )
        .await;

        let result = match acquire_result {
            Ok(Ok(_token)) => fetch().await,
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::EnqueueTimeout(QUEUE_TIMEOUT.as_millis() as u64)),
        };

        let broadcast_result = result
            .as_ref()
            .map(|v| v.clone())
            .map_err(|e| e.to_string());

        if let Ok(ref value) = result {
            self.cache.insert_with_ttl(key.clone(), value.clone(), method.ttl());
        } else {
            warn!("request for {} failed: {:?}", key, result.as_ref().err());
        }

        if let Some(sender) = self.in_flight.lock().await.remove(&key) {
            let _ = sender.send(broadcast_result);
        }

        result
    }

    pub async fn get_symbols(&self, priority: RequestPriority) -> Result<Value> {
        let client = self.client.clone();
        self.fetch_cached(Method::Symbols, Value::Null, priority, move || async move {
            let symbols = client.get_symbols().await?;
            serde_json::to_value(symbols).map_err(Into::into)
        })
        .await
    }

    pub async fn get_ticker(&self, symbol: &str, priority: RequestPriority) -> Result<Value> {
        let client = self.client.clone();
        let symbol_owned = symbol.to_string();
        self.fetch_cached(
            Method::Ticker,
            Value::String(symbol.to_string()),
            priority,
            move || async move {
                let ticker = client.get_ticker(&symbol_owned).await?;
                serde_json::to_value(ticker).map_err(Into::into)
            },
        )
        .await
    }

    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: &str,
        limit: u32,
        priority: RequestPriority,
    ) -> Result<Value> {
        let client = self.client.clone();
        let symbol_owned = symbol.to_string();
        let interval_owned = interval.to_string();
        let args = serde_json::json!({ "symbol": symbol, "interval": interval, "limit": limit });
        self.fetch_cached(Method::Klines, args, priority, move || async move {
            let klines = client
                .get_klines(&symbol_owned, &interval_owned, limit)
                .await?;
            serde_json::to_value(klines).map_err(Into::into)
        })
        .await
    }

    pub async fn get_balance(&self, asset: &str, priority: RequestPriority) -> Result<Value> {
        let client = self.client.clone();
        let asset_owned = asset.to_string();
        self.fetch_cached(
            Method::Balance,
            Value::String(asset.to_string()),
            priority,
            move || async move {
                let balance = client.get_balance(&asset_owned).await?;
                serde_json::to_value(balance).map_err(Into::into)
            },
        )
        .await
    }

    pub async fn get_positions(&self, symbol: Option<&str>, priority: RequestPriority) -> Result<Value> {
        let client = self.client.clone();
        let symbol_owned = symbol.map(|s| s.to_string());
        let args = serde_json::json!({ "symbol": symbol });
        self.fetch_cached(Method::Positions, args, priority, move || async move {
            let positions = client.get_positions(symbol_owned.as_ref()).await?;
            serde_json::to_value(positions).map_err(Into::into)
        })
        .await
    }

    /// Invalidate every cache entry for a given method, used after a
    /// trade places/closes an order to force a fresh read.
    pub fn invalidate_method(&self, method: Method) {
        let prefix = format!("{}:", method.name());
        for key in self.cache.keys() {
            if key.starts_with(&prefix) {
                self.cache.invalidate(&key);
            }
        }
    }

    /// Periodic sweep: evict expired cache entries. Stuck in-flight
    /// records are bounded naturally since every path above removes
    /// its own entry on completion or timeout.
    pub fn sweep(&self) {
        self.cache.cleanup();
    }
}

async fn await_broadcast(
    mut rx: broadcast::Receiver<std::result::Result<Value, String>>,
) -> Result<Value> {
    match rx.recv().await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(msg)) => Err(Error::TransportError(msg)),
        Err(_) => Err(Error::TransportError("in-flight request dropped".to_string())),
    }
}
