//! Error types for GoodWheel Core

use thiserror::Error;

use crate::types::SensorFault;

/// Errors surfaced to the embedding shell
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Sensor fault: {0}")]
    Sensor(#[from] SensorFault),
}
