//! Readiness errors.

use std::time::Duration;

use thiserror::Error;

/// Errors produced while waiting for a collaborator to become ready.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReadinessError {
    /// The deadline passed without the required number of successful checks.
    #[error("{target} not ready after {elapsed:?} ({attempts} checks): {last_status}")]
    TimedOut {
        target: String,
        elapsed: Duration,
        attempts: u32,
        last_status: String,
    },

    /// A check could not be performed, so readiness cannot be observed.
    #[error("{target} readiness check failed after {attempts} checks: {message}")]
    ProbeFailed {
        target: String,
        attempts: u32,
        message: String,
    },

    /// The policy cannot be satisfied as configured.
    #[error("invalid readiness policy: {0}")]
    InvalidPolicy(String),

    /// A probe could not be constructed.
    #[error("invalid probe for {target}: {message}")]
    InvalidProbe { target: String, message: String },
}

impl ReadinessError {
    /// Returns true if the wait ran out of time.
    pub fn is_timeout(&self) -> bool {
        matches!(self, ReadinessError::TimedOut { .. })
    }

    /// Returns true if the probe itself could not run.
    pub fn is_probe_failure(&self) -> bool {
        matches!(self, ReadinessError::ProbeFailed { .. })
    }
}
