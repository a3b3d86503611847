//! Configuration loading

#[allow(clippy::module_inception)]
mod config;

pub use config::{
    ApiConfig, Config, ExecutorConfig, LogFormat, LoggingConfig, StorageConfig, API_URL_ENV,
};
