pub mod config;
pub mod connector;
pub mod error;
pub mod partition;

pub mod miner;
pub mod source;

pub use config::Config;
pub use connector::LogMinerConnector;
pub use error::{Error, Result};
