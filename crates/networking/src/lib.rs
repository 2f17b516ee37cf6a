//! Signal Pipeline Networking - exchange REST/WS client, rate governor,
//! and the cached/deduplicated request facade in front of them.

pub mod adapters;
pub mod api_manager;
pub mod exchange;
pub mod http_client;
pub mod rate_governor;
pub mod ticker_stream;

pub use api_manager::ApiRequestManager;
pub use exchange::ExchangeClient;
pub use http_client::HttpExchangeClient;
pub use rate_governor::RateGovernor;
