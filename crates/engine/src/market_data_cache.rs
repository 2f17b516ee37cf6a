//! C3 — ticker/kline cache with a pull path (via C2) and a streaming
//! push overlay (per-symbol WebSocket subscriptions).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use signal_core::{CacheEvent, Kline, MarketDataCacheConfig, RequestPriority, Result, Symbol, Ticker};
use signal_networking::api_manager::ApiRequestManager;
use signal_networking::ticker_stream::{self, TickerSubscription};
use signal_persistence::TtlCache;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

pub struct MarketDataCache {
    api: Arc<ApiRequestManager>,
    ws_base_url: String,
    cfg: MarketDataCacheConfig,
    tickers: TtlCache<Symbol, Ticker>,
    klines: TtlCache<(Symbol, String), Vec<Kline>>,
    streams: Mutex<HashMap<Symbol, TickerSubscription>>,
    events: broadcast::Sender<CacheEvent>,
    stream_updates: mpsc::UnboundedSender<(String, ticker_stream::TickerFrame)>,
}

impl MarketDataCache {
    pub fn new(api: Arc<ApiRequestManager>, ws_base_url: String, cfg: MarketDataCacheConfig) -> Arc<Self> {
        let (events, _) = broadcast::channel(512);
        let (stream_tx, mut stream_rx) = mpsc::unbounded_channel();

        let cache = Arc::new(Self {
            api,
            ws_base_url,
            tickers: TtlCache::with_capacity(cfg.ticker_ttl, cfg.max_cache_size),
            klines: TtlCache::with_capacity(cfg.kline_ttl, cfg.max_cache_size),
            cfg,
            streams: Mutex::new(HashMap::new()),
            events,
            stream_updates: stream_tx,
        });

        let weak = Arc::downgrade(&cache);
        tokio::spawn(async move {
            while let Some((symbol, frame)) = stream_rx.recv().await {
                let Some(cache) = weak.upgrade() else { return };
                cache.apply_stream_frame(&symbol, frame);
            }
        });

        cache
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    fn apply_stream_frame(&self, symbol: &str, frame: ticker_stream::TickerFrame) {
        let Some(last_price) = frame.last_price else {
            return;
        };

        let previous = self.tickers.get(&symbol.to_string());
        let updated = Ticker {
            last_price,
            bid: frame.bid_price.or(previous.as_ref().map(|t| t.bid)).unwrap_or(last_price),
            ask: frame.ask_price.or(previous.as_ref().map(|t| t.ask)).unwrap_or(last_price),
            high_24h: frame.high_price.or(previous.as_ref().map(|t| t.high_24h)).unwrap_or(last_price),
            low_24h: frame.low_price.or(previous.as_ref().map(|t| t.low_24h)).unwrap_or(last_price),
            volume_24h: frame.volume.or(previous.as_ref().map(|t| t.volume_24h)).unwrap_or(0.0),
            quote_volume_24h: frame
                .quote_volume
                .or(previous.as_ref().map(|t| t.quote_volume_24h))
                .unwrap_or(0.0),
            change_pct: frame
                .price_change_percent
                .or(previous.as_ref().map(|t| t.change_pct))
                .unwrap_or(0.0),
            last_update: chrono::Utc::now(),
        };

        if let Some(evicted) = self
            .tickers
            .insert_with_ttl(symbol.to_string(), updated, self.cfg.ticker_ttl)
        {
            self.stop_stream(&evicted);
        }
        let _ = self.events.send(CacheEvent::TickerUpdate {
            symbol: symbol.to_string(),
            price: last_price,
        });

        if let Some(prev) = previous {
            if prev.last_price > 0.0 {
                let change_pct = ((last_price - prev.last_price) / prev.last_price).abs() * 100.0;
                if change_pct >= self.cfg.price_change_threshold {
                    let _ = self.events.send(CacheEvent::SignificantPriceChange {
                        symbol: symbol.to_string(),
                        change_pct,
                    });
                }
            }
        }
    }

    /// Tears down a symbol's streaming subscription, e.g. when its
    /// ticker entry is LRU-evicted from the cache.
    fn stop_stream(&self, symbol: &str) {
        self.streams.lock().unwrap().remove(symbol);
    }

    fn ensure_stream(&self, symbol: &str) {
        let mut streams = self.streams.lock().unwrap();
        if streams.contains_key(symbol) {
            return;
        }
        let subscription = ticker_stream::subscribe(
            self.ws_base_url.clone(),
            symbol.to_string(),
            self.stream_updates.clone(),
        );
        streams.insert(symbol.to_string(), subscription);
    }

    /// Returns the cached ticker if fresh, else fetches via C2 and
    /// opens the streaming overlay for this symbol.
    pub async fn get_ticker(&self, symbol: &str) -> Result<Ticker> {
        if let Some(cached) = self.tickers.get(&symbol.to_string()) {
            return Ok(cached);
        }

        let raw = self.api.get_ticker(symbol, RequestPriority::Medium).await?;
        let ticker: Ticker = serde_json::from_value(raw)?;
        if let Some(evicted) = self
            .tickers
            .insert_with_ttl(symbol.to_string(), ticker, self.cfg.ticker_ttl)
        {
            self.stop_stream(&evicted);
        }
        self.ensure_stream(symbol);
        Ok(ticker)
    }

    pub async fn get_klines(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Kline>> {
        let key = (symbol.to_string(), interval.to_string());
        if let Some(cached) = self.klines.get(&key) {
            return Ok(cached);
        }

        let raw = self.api.get_klines(symbol, interval, limit, RequestPriority::Medium).await?;
        let klines: Vec<Kline> = serde_json::from_value(raw)?;
        self.klines
            .insert_with_ttl(key, klines.clone(), self.cfg.kline_ttl);
        Ok(klines)
    }

    /// Parallel ticker fetch in batches, tolerating per-symbol failures.
    pub async fn preload(&self, symbols: &[Symbol]) {
        for batch in symbols.chunks(self.cfg.preload_batch_size) {
            let futures = batch.iter().map(|symbol| self.get_ticker(symbol));
            let results = futures_util::future::join_all(futures).await;
            for (symbol, result) in batch.iter().zip(results) {
                if let Err(e) = result {
                    debug!("preload failed for {}: {}", symbol, e);
                }
            }
        }
    }

    /// Tears down every stream and clears both stores.
    pub fn emergency_stop(&self) {
        info!("market data cache emergency stop");
        self.streams.lock().unwrap().clear();
        self.tickers.clear();
        self.klines.clear();
    }

    pub fn cached_ticker_count(&self) -> usize {
        self.tickers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_are_within_spec_ranges() {
        let cfg = MarketDataCacheConfig::default();
        assert!(cfg.max_cache_size > 0);
        assert!(cfg.preload_batch_size > 0);
    }
}
