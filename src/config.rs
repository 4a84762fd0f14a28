//! Configuration System
//!
//! Hierarchical configuration with file and environment-variable sources.
//! Precedence (highest to lowest): `FRAMELENS_*` environment variables, an
//! explicit TOML file, built-in defaults.

use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::TraceError;
use crate::logging::LoggingConfig;

/// Reconstruction behavior knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconstructionConfig {
    /// Synthesize zero-timestamp records for events whose earlier pipeline
    /// stages predate the trace window. Off turns those paths into
    /// multiplicity warnings.
    #[serde(default = "default_true")]
    pub synthesize_at_boundary: bool,

    /// Warn when an event occurs on an unexpected execution-context role.
    #[serde(default = "default_true")]
    pub check_roles: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ReconstructionConfig {
    fn default() -> Self {
        Self {
            synthesize_at_boundary: true,
            check_roles: true,
        }
    }
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FramelensConfig {
    /// Reconstruction behavior
    #[serde(default)]
    pub reconstruction: ReconstructionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    Reconstruction(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Reconstruction(msg) => write!(f, "Reconstruction: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl FramelensConfig {
    /// Load configuration from an optional TOML file plus the environment.
    ///
    /// Environment variables use the `FRAMELENS_` prefix with `__` as the
    /// section separator, e.g. `FRAMELENS_RECONSTRUCTION__CHECK_ROLES=false`.
    pub fn load(config_file: Option<&Path>) -> Result<Self, TraceError> {
        let mut builder = Config::builder();

        if let Some(path) = config_file {
            let path = path.to_str().ok_or_else(|| {
                TraceError::ConfigError(format!("Non-UTF-8 config path: {:?}", path))
            })?;
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("FRAMELENS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let config: FramelensConfig = config.try_deserialize()?;
        config
            .validate()
            .map_err(|errors| {
                let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
                TraceError::ConfigError(messages.join("; "))
            })?;
        Ok(config)
    }

    /// Validate the configuration, collecting every problem found.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if let Err(msg) = self.logging.validate() {
            errors.push(ValidationError::Logging(msg));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
