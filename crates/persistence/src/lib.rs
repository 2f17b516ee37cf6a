//! Signal Pipeline Persistence - TTL cache and the trade ledger

pub mod cache;
pub mod ledger;

pub use cache::TtlCache;
pub use ledger::Ledger;
