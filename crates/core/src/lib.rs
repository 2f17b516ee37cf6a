//! Signal Pipeline Core - shared data models, config, and errors

pub mod config;
pub mod errors;
pub mod events;
pub mod models;
pub mod types;

pub use config::*;
pub use errors::{Error, Result};
pub use events::*;
pub use models::*;
pub use types::*;
