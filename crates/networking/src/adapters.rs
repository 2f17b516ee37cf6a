//! Normalizes heterogeneous exchange REST response shapes into the
//! canonical structs from `signal_core::models::exchange`.
//!
//! The exchange is free to return numbers as JSON strings, balances as
//! an array, a nested array, or a single object, and klines as either
//! positional arrays or keyed objects. Adapters here absorb that
//! variance so the rest of the pipeline only ever sees one shape.

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use signal_core::{Balance, Error, Kline, SymbolInfo, SymbolStatus, Ticker};

/// Accepts a JSON string or number, parsing either into `f64`.
pub fn deserialize_f64_lenient<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_f64(&value).ok_or_else(|| serde::de::Error::custom("expected string or number"))
}

/// Like `deserialize_f64_lenient` but for a field that may be absent
/// entirely, not just numerically null — streaming frames only carry
/// the fields that changed.
pub fn deserialize_f64_lenient_opt<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match v {
        Value::Null => None,
        other => value_to_f64(&other),
    }))
}

fn value_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        Value::Null => Some(0.0),
        _ => None,
    }
}

/// Raw wire ticker: every numeric field may arrive as a string.
#[derive(Debug, Deserialize)]
struct RawTicker {
    #[serde(alias = "c", alias = "lastPrice", deserialize_with = "deserialize_f64_lenient")]
    last_price: f64,
    #[serde(alias = "b", alias = "bidPrice", deserialize_with = "deserialize_f64_lenient", default)]
    bid_price: f64,
    #[serde(alias = "a", alias = "askPrice", deserialize_with = "deserialize_f64_lenient", default)]
    ask_price: f64,
    #[serde(alias = "h", alias = "highPrice24h", alias = "highPrice", deserialize_with = "deserialize_f64_lenient", default)]
    high_price_24h: f64,
    #[serde(alias = "l", alias = "lowPrice24h", alias = "lowPrice", deserialize_with = "deserialize_f64_lenient", default)]
    low_price_24h: f64,
    #[serde(alias = "v", alias = "volume", deserialize_with = "deserialize_f64_lenient", default)]
    volume_24h: f64,
    #[serde(alias = "q", alias = "quoteVolume", deserialize_with = "deserialize_f64_lenient", default)]
    quote_volume_24h: f64,
    #[serde(alias = "p", alias = "priceChangePercent", deserialize_with = "deserialize_f64_lenient", default)]
    price_change_percent: f64,
}

pub fn parse_ticker(body: &Value) -> Result<Ticker, Error> {
    let raw: RawTicker = serde_json::from_value(body.clone())
        .map_err(|_| Error::TransportError("schema".to_string()))?;

    Ok(Ticker {
        last_price: raw.last_price,
        bid: raw.bid_price,
        ask: raw.ask_price,
        high_24h: raw.high_price_24h,
        low_24h: raw.low_price_24h,
        volume_24h: raw.volume_24h,
        quote_volume_24h: raw.quote_volume_24h,
        change_pct: raw.price_change_percent,
        last_update: chrono::Utc::now(),
    })
}

/// Accepts both `{time, open, high, low, close, volume}` objects and
/// `[time, open, high, low, close, volume]` positional arrays.
pub fn parse_klines(body: &Value) -> Result<Vec<Kline>, Error> {
    let items = body
        .as_array()
        .ok_or_else(|| Error::TransportError("schema".to_string()))?;

    items.iter().map(parse_one_kline).collect()
}

fn parse_one_kline(item: &Value) -> Result<Kline, Error> {
    let schema_err = || Error::TransportError("schema".to_string());

    if let Some(arr) = item.as_array() {
        if arr.len() < 6 {
            return Err(schema_err());
        }
        let time = arr[0].as_i64().ok_or_else(schema_err)?;
        let open = value_to_f64(&arr[1]).ok_or_else(schema_err)?;
        let high = value_to_f64(&arr[2]).ok_or_else(schema_err)?;
        let low = value_to_f64(&arr[3]).ok_or_else(schema_err)?;
        let close = value_to_f64(&arr[4]).ok_or_else(schema_err)?;
        let volume = value_to_f64(&arr[5]).ok_or_else(schema_err)?;
        return Ok(Kline::new(time, open, high, low, close, volume));
    }

    if let Some(obj) = item.as_object() {
        let get = |key: &str| -> Option<f64> { obj.get(key).and_then(value_to_f64) };
        let time = obj
            .get("time")
            .and_then(|v| v.as_i64())
            .ok_or_else(schema_err)?;
        let open = get("open").ok_or_else(schema_err)?;
        let high = get("high").ok_or_else(schema_err)?;
        let low = get("low").ok_or_else(schema_err)?;
        let close = get("close").ok_or_else(schema_err)?;
        let volume = get("volume").ok_or_else(schema_err)?;
        return Ok(Kline::new(time, open, high, low, close, volume));
    }

    Err(schema_err())
}

/// Balance responses arrive as an array of asset balances, a nested
/// array, or a single object — pick out `asset` by name.
pub fn parse_balance(body: &Value, asset: &str) -> Result<Balance, Error> {
    let schema_err = || Error::TransportError("schema".to_string());

    let candidates: Vec<&Value> = match body {
        Value::Array(items) => items.iter().flat_map(flatten_one).collect(),
        Value::Object(_) => vec![body],
        _ => return Err(schema_err()),
    };

    for entry in candidates {
        let Some(obj) = entry.as_object() else {
            continue;
        };
        let matches_asset = obj
            .get("asset")
            .and_then(Value::as_str)
            .map(|a| a.eq_ignore_ascii_case(asset))
            .unwrap_or(false);
        if !matches_asset {
            continue;
        }

        let free = obj
            .get("availableBalance")
            .or_else(|| obj.get("free"))
            .and_then(value_to_f64)
            .ok_or_else(schema_err)?;
        let total = obj
            .get("balance")
            .or_else(|| obj.get("total"))
            .and_then(value_to_f64)
            .unwrap_or(free);

        return Ok(Balance {
            asset_free: free,
            asset_total: total,
        });
    }

    Err(Error::NotFound(format!("balance for asset {asset}")))
}

fn flatten_one(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(inner) => inner.iter().collect(),
        other => vec![other],
    }
}

pub fn parse_symbols(body: &Value) -> Result<Vec<SymbolInfo>, Error> {
    let schema_err = || Error::TransportError("schema".to_string());
    let items = body.as_array().ok_or_else(schema_err)?;

    items
        .iter()
        .map(|item| {
            let obj = item.as_object().ok_or_else(schema_err)?;
            let symbol = obj
                .get("symbol")
                .and_then(Value::as_str)
                .ok_or_else(schema_err)?
                .to_string();
            let quote_asset = obj
                .get("quoteAsset")
                .and_then(Value::as_str)
                .unwrap_or("USDT")
                .to_string();
            let status_raw = obj.get("status");
            let status = match status_raw {
                Some(Value::String(s)) if s == "TRADING" => SymbolStatus::Trading,
                Some(Value::Number(n)) if n.as_i64() == Some(1) => SymbolStatus::Trading,
                Some(Value::String(s)) => SymbolStatus::Other(s.clone()),
                Some(other) => SymbolStatus::Other(other.to_string()),
                None => SymbolStatus::Other("unknown".to_string()),
            };

            Ok(SymbolInfo {
                symbol,
                status,
                quote_asset,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_ticker_with_stringified_numbers() {
        let body = json!({
            "lastPrice": "30000.5",
            "bidPrice": "29999.0",
            "askPrice": "30001.0",
            "highPrice24h": "30500",
            "lowPrice24h": "29500",
            "volume": "1234.5",
            "quoteVolume": "37000000",
            "priceChangePercent": "1.2",
        });

        let ticker = parse_ticker(&body).unwrap();
        assert_eq!(ticker.last_price, 30000.5);
        assert_eq!(ticker.quote_volume_24h, 37000000.0);
    }

    #[test]
    fn parses_positional_and_object_klines_identically() {
        let positional = json!([[1000i64, "1", "2", "0.5", "1.5", "100"]]);
        let object = json!([{"time": 1000, "open": 1.0, "high": 2.0, "low": 0.5, "close": 1.5, "volume": 100.0}]);

        let a = parse_klines(&positional).unwrap();
        let b = parse_klines(&object).unwrap();
        assert_eq!(a[0].open, b[0].open);
        assert_eq!(a[0].close, b[0].close);
    }

    #[test]
    fn finds_matching_asset_in_balance_array() {
        let body = json!([
            {"asset": "BTC", "free": "1.0", "total": "1.0"},
            {"asset": "USDT", "availableBalance": "500.25", "balance": "500.25"},
        ]);

        let balance = parse_balance(&body, "USDT").unwrap();
        assert_eq!(balance.asset_free, 500.25);
    }

    #[test]
    fn missing_asset_is_not_found() {
        let body = json!([{"asset": "BTC", "free": "1.0"}]);
        let err = parse_balance(&body, "USDT").unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
