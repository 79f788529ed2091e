//! Error display and exit codes.

use colored::Colorize;
use fleetup_orchestrator::config::ConfigError;
use fleetup_orchestrator::BootstrapError;

/// Exit codes.
///
/// | code | meaning                                   |
/// |------|-------------------------------------------|
/// | 0    | every phase completed                     |
/// | 1    | unexpected internal error                 |
/// | 2    | invalid configuration or usage            |
/// | 3    | platform command failed                   |
/// | 4    | readiness gate timed out                  |
pub mod codes {
    pub const SUCCESS: u8 = 0;
    pub const INTERNAL_ERROR: u8 = 1;
    /// Also what clap exits with on usage errors.
    pub const INVALID_CONFIGURATION: u8 = 2;
    pub const PLATFORM_UNAVAILABLE: u8 = 3;
    pub const NOT_READY: u8 = 4;
}

/// Map an error to the process exit code.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<BootstrapError>() {
        Some(BootstrapError::InvalidConfiguration(_)) => codes::INVALID_CONFIGURATION,
        Some(BootstrapError::PlatformUnavailable { .. }) => codes::PLATFORM_UNAVAILABLE,
        Some(BootstrapError::AssumedReadyButNotReady { .. }) => codes::NOT_READY,
        Some(BootstrapError::InvalidTransition { .. }) | None => codes::INTERNAL_ERROR,
    }
}

/// Print an error in a user-friendly format.
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {}", "Error:".red().bold(), err);

    let Some(bootstrap_err) = err.downcast_ref::<BootstrapError>() else {
        return;
    };
    if let Some(hint) = hint(bootstrap_err) {
        eprintln!("\n{}", format!("Hint: {}", hint).yellow());
    }
}

fn hint(err: &BootstrapError) -> Option<&'static str> {
    match err {
        BootstrapError::InvalidConfiguration(ConfigError::Scale(_)) => Some(
            "SCALE_FACTOR must be a non-negative integer and EPOCH_SIZE a positive integer.",
        ),
        BootstrapError::InvalidConfiguration(ConfigError::Read { .. }) => {
            Some("Check the --manifest path or unset FLEETUP_MANIFEST.")
        }
        BootstrapError::InvalidConfiguration(_) => None,
        BootstrapError::PlatformUnavailable { .. } => {
            Some("Check that the Docker daemon is running and the compose file defines the service.")
        }
        BootstrapError::AssumedReadyButNotReady { .. } => Some(
            "The service started but never became ready. Inspect it with `docker compose logs`, \
             or raise the readiness timeout in the manifest.",
        ),
        BootstrapError::InvalidTransition { .. } => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleetup_orchestrator::platform::PlatformError;
    use fleetup_orchestrator::Phase;
    use fleetup_readiness::ReadinessError;
    use fleetup_scale::ScaleError;
    use std::time::Duration;

    #[test]
    fn test_exit_codes() {
        let invalid: anyhow::Error = BootstrapError::from(ScaleError::Missing("epoch_size")).into();
        assert_eq!(exit_code(&invalid), codes::INVALID_CONFIGURATION);

        let platform: anyhow::Error = BootstrapError::PlatformUnavailable {
            phase: Phase::Reset,
            source: PlatformError::UnexpectedOutput {
                command: "docker volume prune -f".to_string(),
                message: "garbled".to_string(),
            },
        }
        .into();
        assert_eq!(exit_code(&platform), codes::PLATFORM_UNAVAILABLE);

        let not_ready: anyhow::Error = BootstrapError::AssumedReadyButNotReady {
            phase: Phase::Broker,
            service: "kafka".to_string(),
            source: ReadinessError::TimedOut {
                target: "kafka".to_string(),
                elapsed: Duration::from_secs(60),
                attempts: 61,
                last_status: "not ready: connect failed".to_string(),
            },
        }
        .into();
        assert_eq!(exit_code(&not_ready), codes::NOT_READY);

        let other = anyhow::anyhow!("boom");
        assert_eq!(exit_code(&other), codes::INTERNAL_ERROR);
    }

    #[test]
    fn test_scale_errors_have_hint() {
        let err = BootstrapError::from(ScaleError::Negative {
            field: "scale_factor",
            value: -1,
        });
        assert!(hint(&err).is_some());
    }
}
