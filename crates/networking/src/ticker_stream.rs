//! Per-symbol streaming ticker overlay (C3's push path).
//!
//! One subscription per symbol against `wss://<host>/market?symbol=<SYMBOL>`.
//! Frames may be gzip-compressed (detect magic `1F 8B` before inflating).
//! On disconnect, reconnects with a fixed base delay; while disconnected
//! the market data cache's pull path remains authoritative.

use std::io::Read;
use std::time::Duration;

use flate2::read::GzDecoder;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const RECONNECT_BASE_DELAY: Duration = Duration::from_secs(2);
const RECONNECT_MAX_DELAY: Duration = Duration::from_secs(5);

/// A single normalized ticker frame, accepting both short and long
/// field aliases per §6.
#[derive(Debug, Clone, Deserialize)]
pub struct TickerFrame {
    #[serde(alias = "c", alias = "lastPrice", default, deserialize_with = "crate::adapters::deserialize_f64_lenient_opt")]
    pub last_price: Option<f64>,
    #[serde(alias = "b", alias = "bidPrice", default, deserialize_with = "crate::adapters::deserialize_f64_lenient_opt")]
    pub bid_price: Option<f64>,
    #[serde(alias = "a", alias = "askPrice", default, deserialize_with = "crate::adapters::deserialize_f64_lenient_opt")]
    pub ask_price: Option<f64>,
    #[serde(alias = "h", alias = "highPrice", default, deserialize_with = "crate::adapters::deserialize_f64_lenient_opt")]
    pub high_price: Option<f64>,
    #[serde(alias = "l", alias = "lowPrice", default, deserialize_with = "crate::adapters::deserialize_f64_lenient_opt")]
    pub low_price: Option<f64>,
    #[serde(alias = "v", alias = "volume", default, deserialize_with = "crate::adapters::deserialize_f64_lenient_opt")]
    pub volume: Option<f64>,
    #[serde(alias = "q", alias = "quoteVolume", default, deserialize_with = "crate::adapters::deserialize_f64_lenient_opt")]
    pub quote_volume: Option<f64>,
    #[serde(alias = "p", alias = "priceChangePercent", default, deserialize_with = "crate::adapters::deserialize_f64_lenient_opt")]
    pub price_change_percent: Option<f64>,
}

fn decode_frame(bytes: &[u8]) -> Option<Value> {
    let text = if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(bytes);
        let mut out = String::new();
        if decoder.read_to_string(&mut out).is_err() {
            return None;
        }
        out
    } else {
        std::str::from_utf8(bytes).ok()?.to_string()
    };

    serde_json::from_str(&text).ok()
}

/// A handle to a single symbol's live stream subscription. Dropping it
/// stops the background task.
pub struct TickerSubscription {
    _stop_tx: watch::Sender<bool>,
}

/// Opens a persistent per-symbol ticker stream, invoking `on_update`
/// on every successfully decoded frame.
pub fn subscribe(
    ws_base_url: String,
    symbol: String,
    on_update: mpsc::UnboundedSender<(String, TickerFrame)>,
) -> TickerSubscription {
    let (stop_tx, stop_rx) = watch::channel(false);

    tokio::spawn(run_stream(ws_base_url, symbol, on_update, stop_rx));

    TickerSubscription { _stop_tx: stop_tx }
}

async fn run_stream(
    ws_base_url: String,
    symbol: String,
    on_update: mpsc::UnboundedSender<(String, TickerFrame)>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let mut backoff = RECONNECT_BASE_DELAY;

    loop {
        if *stop_rx.borrow() {
            return;
        }

        match connect_and_stream(&ws_base_url, &symbol, &on_update, &mut stop_rx).await {
            Ok(()) => {
                info!("ticker stream for {} closed gracefully", symbol);
                backoff = RECONNECT_BASE_DELAY;
            }
            Err(e) => {
                warn!("ticker stream for {} failed: {}; reconnecting in {:?}", symbol, e, backoff);
            }
        }

        if *stop_rx.borrow() {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = stop_rx.changed() => return,
        }
        backoff = (backoff + RECONNECT_BASE_DELAY).min(RECONNECT_MAX_DELAY);
    }
}

async fn connect_and_stream(
    ws_base_url: &str,
    symbol: &str,
    on_update: &mpsc::UnboundedSender<(String, TickerFrame)>,
    stop_rx: &mut watch::Receiver<bool>,
) -> Result<(), String> {
    let url = format!("{}/market?symbol={}", ws_base_url.trim_end_matches('/'), symbol);
    let (ws_stream, _) = connect_async(&url).await.map_err(|e| e.to_string())?;
    let (mut write, mut read) = ws_stream.split();

    let subscribe_msg = serde_json::json!({
        "id": 1,
        "reqType": "sub",
        "dataType": format!("{}@ticker", symbol),
    });

    write
        .send(Message::Text(subscribe_msg.to_string().into()))
        .await
        .map_err(|e| e.to_string())?;

    loop {
        tokio::select! {
            frame = read.next() => {
                let Some(frame) = frame else { return Ok(()) };
                let frame = frame.map_err(|e| e.to_string())?;

                let bytes = match frame {
                    Message::Binary(b) => b.to_vec(),
                    Message::Text(t) => t.as_bytes().to_vec(),
                    Message::Close(_) => return Ok(()),
                    _ => continue,
                };

                let Some(value) = decode_frame(&bytes) else {
                    debug!("dropping undecodable frame for {}", symbol);
                    continue;
                };

                match serde_json::from_value::<TickerFrame>(value) {
                    Ok(parsed) => {
                        let _ = on_update.send((symbol.to_string(), parsed));
                    }
                    Err(e) => debug!("unrecognized ticker frame shape for {}: {}", symbol, e),
                }
            }
            _ = stop_rx.changed() => {
                let _ = write.close().await;
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_plain_json_frame() {
        let body = br#"{"c":"30000.5"}"#;
        let value = decode_frame(body).unwrap();
        assert_eq!(value["c"], "30000.5");
    }

    #[test]
    fn detects_gzip_magic_bytes() {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(br#"{"c":"30500"}"#).unwrap();
        let compressed = encoder.finish().unwrap();

        assert!(compressed.starts_with(&GZIP_MAGIC));
        let value = decode_frame(&compressed).unwrap();
        assert_eq!(value["c"], "30500");
    }

    #[test]
    fn parses_frame_with_stringified_numbers() {
        let value = decode_frame(br#"{"c":"30000.5","v":"1234.5","p":null}"#).unwrap();
        let frame: TickerFrame = serde_json::from_value(value).unwrap();
        assert_eq!(frame.last_price, Some(30000.5));
        assert_eq!(frame.volume, Some(1234.5));
        assert_eq!(frame.price_change_percent, None);
        assert_eq!(frame.bid_price, None);
    }
}
