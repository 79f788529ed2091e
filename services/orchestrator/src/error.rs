//! Bootstrap errors.

use fleetup_readiness::ReadinessError;
use fleetup_scale::ScaleError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::phase::{BootstrapState, Phase};
use crate::platform::PlatformError;

/// Errors that abort a bootstrap run.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Request or manifest rejected before any side effect.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    /// A platform command failed.
    #[error("{phase} phase failed: {source}")]
    PlatformUnavailable {
        phase: Phase,
        #[source]
        source: PlatformError,
    },

    /// A readiness gate did not open before its deadline.
    #[error("{phase} phase: {service} not ready: {source}")]
    AssumedReadyButNotReady {
        phase: Phase,
        service: String,
        #[source]
        source: ReadinessError,
    },

    /// The run tried to leave the linear phase order.
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: BootstrapState,
        to: BootstrapState,
    },
}

impl From<ScaleError> for BootstrapError {
    fn from(err: ScaleError) -> Self {
        BootstrapError::InvalidConfiguration(ConfigError::Scale(err))
    }
}

impl BootstrapError {
    /// Short machine-readable reason.
    pub fn reason_code(&self) -> &'static str {
        match self {
            BootstrapError::InvalidConfiguration(_) => "invalid_configuration",
            BootstrapError::PlatformUnavailable { .. } => "platform_unavailable",
            BootstrapError::AssumedReadyButNotReady { .. } => "assumed_ready_but_not_ready",
            BootstrapError::InvalidTransition { .. } => "invalid_transition",
        }
    }

    /// Phase the run failed in, if it got that far.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            BootstrapError::InvalidConfiguration(_) => None,
            BootstrapError::PlatformUnavailable { phase, .. }
            | BootstrapError::AssumedReadyButNotReady { phase, .. } => Some(*phase),
            BootstrapError::InvalidTransition { from, .. } => from.phase(),
        }
    }

    /// Returns true if the run failed before touching the platform.
    pub fn is_configuration(&self) -> bool {
        matches!(self, BootstrapError::InvalidConfiguration(_))
    }

    pub(crate) fn platform(phase: Phase, source: PlatformError) -> Self {
        BootstrapError::PlatformUnavailable { phase, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_scale_error_is_invalid_configuration() {
        let err: BootstrapError = ScaleError::Negative {
            field: "scale_factor",
            value: -4,
        }
        .into();
        assert_eq!(err.reason_code(), "invalid_configuration");
        assert!(err.is_configuration());
        assert_eq!(err.phase(), None);
    }

    #[test]
    fn test_platform_error_carries_phase() {
        let err = BootstrapError::platform(
            Phase::Store,
            PlatformError::CommandFailed {
                command: "docker compose up -d minio".to_string(),
                status: "exit status: 1".to_string(),
                stderr: "no such service".to_string(),
            },
        );
        assert_eq!(err.phase(), Some(Phase::Store));
        assert_eq!(err.reason_code(), "platform_unavailable");
        assert!(err.to_string().starts_with("store phase failed"));
    }

    #[test]
    fn test_readiness_error_message() {
        let err = BootstrapError::AssumedReadyButNotReady {
            phase: Phase::Broker,
            service: "kafka".to_string(),
            source: ReadinessError::TimedOut {
                target: "kafka".to_string(),
                elapsed: Duration::from_secs(60),
                attempts: 60,
                last_status: "connection refused".to_string(),
            },
        };
        assert_eq!(err.phase(), Some(Phase::Broker));
        assert!(err.to_string().contains("kafka not ready"));
    }
}
