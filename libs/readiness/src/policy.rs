//! Polling policy for probe-based readiness.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ReadinessError;

/// Longest any single readiness wait may be configured to last.
pub const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// How a probe is polled until the collaborator is ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadinessPolicy {
    /// Wait before the first check.
    pub grace_period: Duration,

    /// Pause between checks.
    pub interval: Duration,

    /// Upper bound for a single check.
    pub check_timeout: Duration,

    /// Overall deadline, measured after the grace period.
    pub timeout: Duration,

    /// Consecutive successful checks required.
    pub success_threshold: u32,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            grace_period: Duration::ZERO,
            interval: Duration::from_secs(1),
            check_timeout: Duration::from_secs(2),
            timeout: Duration::from_secs(60),
            success_threshold: 1,
        }
    }
}

impl ReadinessPolicy {
    /// Set the overall deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the polling interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the grace period before the first check.
    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// Set the number of consecutive successes required.
    pub fn with_success_threshold(mut self, success_threshold: u32) -> Self {
        self.success_threshold = success_threshold;
        self
    }

    /// Reject policies that can never report ready.
    pub fn validate(&self) -> Result<(), ReadinessError> {
        if self.success_threshold == 0 {
            return Err(ReadinessError::InvalidPolicy(
                "success_threshold must be at least 1".to_string(),
            ));
        }
        if self.interval.is_zero() {
            return Err(ReadinessError::InvalidPolicy(
                "interval must be greater than zero".to_string(),
            ));
        }
        if self.check_timeout.is_zero() {
            return Err(ReadinessError::InvalidPolicy(
                "check_timeout must be greater than zero".to_string(),
            ));
        }
        if self.timeout.is_zero() {
            return Err(ReadinessError::InvalidPolicy(
                "timeout must be greater than zero".to_string(),
            ));
        }

        let bounded = [
            ("interval", self.interval),
            ("check_timeout", self.check_timeout),
            (
                "grace_period + timeout",
                self.grace_period.saturating_add(self.timeout),
            ),
        ];
        for (name, value) in bounded {
            check_bound(name, value)?;
        }
        Ok(())
    }
}

/// Reject durations above [`MAX_WAIT`].
pub(crate) fn check_bound(name: &str, value: Duration) -> Result<(), ReadinessError> {
    if value > MAX_WAIT {
        return Err(ReadinessError::InvalidPolicy(format!(
            "{} must not exceed {}s, got {}s",
            name,
            MAX_WAIT.as_secs(),
            value.as_secs()
        )));
    }
    Ok(())
}
