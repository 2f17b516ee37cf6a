//! Concrete `reqwest`-backed `ExchangeClient`.
//!
//! Every endpoint follows the envelope convention `{code, msg, data}`;
//! `code != 0` is surfaced as `Error::ExchangeError`. Response bodies
//! are normalized through `crate::adapters` before leaving this module.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use signal_core::{
    Balance, Error, ExchangePosition, Kline, OrderAck, OrderRequest, Result, Symbol, SymbolInfo,
    Ticker,
};
use tracing::{debug, error, instrument};

use crate::adapters;
use crate::exchange::ExchangeClient;

/// Minimal REST client for a Binance-style futures exchange.
///
/// `base_url` points at the REST origin (e.g. `https://fapi.example.com`);
/// authentication headers, if the deployment needs them, are the
/// caller's responsibility via `extra_headers`.
pub struct HttpExchangeClient {
    http: Client,
    base_url: String,
    extra_headers: reqwest::header::HeaderMap,
}

impl HttpExchangeClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .build()
            .expect("failed to build reqwest client");

        Self {
            http,
            base_url: base_url.into(),
            extra_headers: reqwest::header::HeaderMap::new(),
        }
    }

    pub fn with_headers(mut self, headers: reqwest::header::HeaderMap) -> Self {
        self.extra_headers = headers;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_envelope(&self, path: &str) -> Result<Value> {
        debug!("GET {}", path);
        let response = self
            .http
            .get(self.url(path))
            .headers(self.extra_headers.clone())
            .send()
            .await
            .map_err(|e| Error::TransportError(e.to_string()))?;

        Self::parse_envelope(response).await
    }

    async fn post_envelope(&self, path: &str, body: &Value) -> Result<Value> {
        debug!("POST {}", path);
        let response = self
            .http
            .post(self.url(path))
            .headers(self.extra_headers.clone())
            .json(body)
            .send()
            .await
            .map_err(|e| Error::TransportError(e.to_string()))?;

        Self::parse_envelope(response).await
    }

    async fn parse_envelope(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::TransportError(e.to_string()))?;

        if !status.is_success() {
            error!("exchange call failed: HTTP {}", status);
            return Err(Error::ExchangeError {
                code: status.as_u16() as i64,
                msg: body.to_string(),
            });
        }

        let code = body.get("code").and_then(Value::as_i64).unwrap_or(0);
        if code != 0 {
            let msg = body
                .get("msg")
                .and_then(Value::as_str)
                .unwrap_or("unknown exchange error")
                .to_string();
            return Err(Error::ExchangeError { code, msg });
        }

        Ok(body.get("data").cloned().unwrap_or(body))
    }
}

#[async_trait]
impl ExchangeClient for HttpExchangeClient {
    #[instrument(skip(self))]
    async fn get_symbols(&self) -> Result<Vec<SymbolInfo>> {
        let data = self.get_envelope("/fapi/v1/exchangeInfo").await?;
        let symbols = data.get("symbols").cloned().unwrap_or(data);
        adapters::parse_symbols(&symbols)
    }

    #[instrument(skip(self))]
    async fn get_ticker(&self, symbol: &Symbol) -> Result<Ticker> {
        let path = format!("/fapi/v1/ticker/24hr?symbol={symbol}");
        let data = self.get_envelope(&path).await?;
        adapters::parse_ticker(&data)
    }

    #[instrument(skip(self))]
    async fn get_klines(&self, symbol: &Symbol, interval: &str, limit: u32) -> Result<Vec<Kline>> {
        let path = format!("/fapi/v1/klines?symbol={symbol}&interval={interval}&limit={limit}");
        let data = self.get_envelope(&path).await?;
        adapters::parse_klines(&data)
    }

    #[instrument(skip(self))]
    async fn get_balance(&self, asset: &str) -> Result<Balance> {
        let data = self.get_envelope("/fapi/v2/balance").await?;
        adapters::parse_balance(&data, asset)
    }

    #[instrument(skip(self))]
    async fn get_positions(&self, symbol: Option<&Symbol>) -> Result<Vec<ExchangePosition>> {
        let path = match symbol {
            Some(s) => format!("/fapi/v2/positionRisk?symbol={s}"),
            None => "/fapi/v2/positionRisk".to_string(),
        };
        let data = self.get_envelope(&path).await?;
        let items = data
            .as_array()
            .ok_or_else(|| Error::TransportError("schema".to_string()))?;

        items
            .iter()
            .map(|item| {
                serde_json::from_value(item.clone())
                    .map_err(|_| Error::TransportError("schema".to_string()))
            })
            .collect()
    }

    #[instrument(skip(self, request))]
    async fn place_order(&self, request: OrderRequest) -> Result<OrderAck> {
        let body = serde_json::json!({
            "symbol": request.symbol,
            "side": request.side,
            "positionSide": request.position_side,
            "type": "MARKET",
            "quantity": request.quantity,
            "stopLoss": request.stop_loss,
            "takeProfit": request.take_profit,
        });

        let data = self.post_envelope("/fapi/v1/order", &body).await?;
        serde_json::from_value(data).map_err(|_| Error::TransportError("schema".to_string()))
    }

    #[instrument(skip(self))]
    async fn close_position(&self, symbol: &Symbol, percentage: f64) -> Result<OrderAck> {
        let body = serde_json::json!({ "symbol": symbol, "percentage": percentage });
        let data = self.post_envelope("/fapi/v1/closePosition", &body).await?;
        serde_json::from_value(data).map_err(|_| Error::TransportError("schema".to_string()))
    }
}
