use thiserror::Error;

use crate::config::ConfigError;
use crate::jobs::JobError;
use crate::telemetry::logging::InitError;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Job(#[from] JobError),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("logging initialization failed: {0}")]
    Logging(#[from] InitError),
    #[error("failed to encode output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("run store unavailable: {0}")]
    Store(#[from] run_store::StoreError),
    #[error("{0}")]
    Stream(String),
}

