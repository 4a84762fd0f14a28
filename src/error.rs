//! Error types for the framelens reconstruction library.
//!
//! Reconstruction itself never fails: invariant violations are recorded as
//! warnings and processing continues with the best available partial state.
//! Errors exist only at the input and configuration boundary.

use thiserror::Error;

/// Boundary errors: malformed configuration or unresolvable input metadata
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("Unknown context role: {0}")]
    UnknownRole(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid log format: {0} (expected \"text\" or \"json\")")]
    InvalidLogFormat(String),

    #[error("Logging initialization failed: {0}")]
    LoggingInit(String),
}

impl From<config::ConfigError> for TraceError {
    fn from(err: config::ConfigError) -> Self {
        TraceError::ConfigError(err.to_string())
    }
}
