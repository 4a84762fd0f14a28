//! Warning Log
//!
//! Append-only diagnostics for invariant violations detected during
//! reconstruction. A warning never halts processing; the engine continues
//! with the best available partial match.

use serde::{Deserialize, Serialize};

use crate::types::Micros;

/// One non-fatal diagnostic: trace timestamp plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub timestamp: Micros,
    pub message: String,
}

/// Ordered, append-only collection of warnings for one reconstruction run.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct WarningLog {
    warnings: Vec<Warning>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a warning, mirroring it to the tracing subscriber.
    pub fn warn(&mut self, timestamp: Micros, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(timestamp, "{}", message);
        self.warnings.push(Warning { timestamp, message });
    }

    /// Multiplicity predicate: exactly one candidate must match.
    ///
    /// Returns true when `count == 1`. Zero or several matches append a
    /// warning naming the count, mirroring the original reconstruction's
    /// diagnostics ("No X" / "3 X").
    pub fn one_and_only(&mut self, timestamp: Micros, count: usize, what: &str) -> bool {
        match count {
            1 => true,
            0 => {
                self.warn(timestamp, format!("No {}", what));
                false
            }
            n => {
                self.warn(timestamp, format!("{} {}", n, what));
                false
            }
        }
    }

    pub fn as_slice(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn len(&self) -> usize {
        self.warnings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.warnings
    }
}
