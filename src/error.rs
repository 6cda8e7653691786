//! Error types for Activity Insights

use thiserror::Error;

/// Errors that can occur during computation
#[derive(Debug, Error)]
pub enum ComputeError {
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    #[error("No data points in the requested window: {0}")]
    EmptySeries(String),

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("Insufficient samples for density estimation: {0}")]
    InsufficientSamples(String),

    #[error("Failed to parse payload: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
