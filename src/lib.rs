pub mod api;
pub mod cache;
pub mod config;
pub mod conversion;
pub mod conversion_history;
pub mod error;
pub mod exchange_client;
pub mod exchange_rate;
pub mod rate_snapshot;
pub mod service;
pub mod store;

pub use config::Config;
pub use error::{AppError, Result};
pub use service::ConversionService;
