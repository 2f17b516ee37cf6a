//! The exchange REST surface, abstracted behind a trait so the core
//! pipeline never depends on a concrete exchange SDK. Request signing
//! and transport-level auth are the caller's concern; implementors of
//! this trait are expected to attach whatever headers/signatures a
//! real deployment needs.

use async_trait::async_trait;
use signal_core::{Balance, ExchangePosition, OrderAck, OrderRequest, Result, Symbol, SymbolInfo};

#[async_trait]
pub trait ExchangeClient: Send + Sync {
    async fn get_symbols(&self) -> Result<Vec<SymbolInfo>>;

    async fn get_ticker(&self, symbol: &Symbol) -> Result<signal_core::Ticker>;

    async fn get_klines(
        &self,
        symbol: &Symbol,
        interval: &str,
        limit: u32,
    ) -> Result<Vec<signal_core::Kline>>;

    async fn get_balance(&self, asset: &str) -> Result<Balance>;

    async fn get_positions(&self, symbol: Option<&Symbol>) -> Result<Vec<ExchangePosition>>;

    async fn place_order(&self, request: OrderRequest) -> Result<OrderAck>;

    async fn close_position(&self, symbol: &Symbol, percentage: f64) -> Result<OrderAck>;
}
