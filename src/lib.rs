pub mod config;
pub mod constants;
pub mod error;
pub mod logging;
pub mod models;
pub mod storage;

pub use config::GraphConfig;
pub use error::SignallingError;
