//! Bounded polling until a probe reports ready.

use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

use crate::error::ReadinessError;
use crate::gate::ReadinessOutcome;
use crate::policy::ReadinessPolicy;
use crate::probe::{Probe, ProbeStatus};

/// Poll `probe` until it succeeds `success_threshold` times in a row.
///
/// Fails with [`ReadinessError::TimedOut`] once `policy.timeout` has elapsed
/// after the grace period. The last check is issued no later than the
/// deadline. A check that reports [`ProbeStatus::Failed`] ends the wait
/// immediately with [`ReadinessError::ProbeFailed`].
pub async fn wait_until_ready(
    target: &str,
    probe: &dyn Probe,
    policy: &ReadinessPolicy,
) -> Result<ReadinessOutcome, ReadinessError> {
    policy.validate()?;

    info!(
        target,
        probe = %probe.describe(),
        grace_period_ms = policy.grace_period.as_millis() as u64,
        interval_ms = policy.interval.as_millis() as u64,
        timeout_ms = policy.timeout.as_millis() as u64,
        success_threshold = policy.success_threshold,
        "waiting for readiness"
    );

    let started = Instant::now();
    if !policy.grace_period.is_zero() {
        sleep(policy.grace_period).await;
        debug!(target, "grace period elapsed, beginning readiness checks");
    }

    let Some(deadline) = Instant::now().checked_add(policy.timeout) else {
        return Err(ReadinessError::InvalidPolicy(format!(
            "timeout of {}s cannot be scheduled",
            policy.timeout.as_secs()
        )));
    };
    let mut attempts = 0u32;
    let mut consecutive_successes = 0u32;

    loop {
        attempts += 1;
        let status = match timeout(policy.check_timeout, probe.check()).await {
            Ok(status) => status,
            Err(_) => ProbeStatus::NotReady(format!(
                "check exceeded {}ms",
                policy.check_timeout.as_millis()
            )),
        };

        match &status {
            ProbeStatus::Ready => {
                consecutive_successes += 1;
                debug!(target, attempts, consecutive_successes, "readiness check passed");

                if consecutive_successes >= policy.success_threshold {
                    let elapsed = started.elapsed();
                    info!(
                        target,
                        attempts,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "ready"
                    );
                    return Ok(ReadinessOutcome::Observed { attempts, elapsed });
                }
            }
            ProbeStatus::NotReady(reason) => {
                consecutive_successes = 0;
                debug!(target, attempts, reason = %reason, "readiness check failed");
            }
            ProbeStatus::Failed(message) => {
                warn!(target, attempts, error = %message, "readiness check could not run");
                return Err(ReadinessError::ProbeFailed {
                    target: target.to_string(),
                    attempts,
                    message: message.clone(),
                });
            }
        }

        let now = Instant::now();
        if now >= deadline {
            let elapsed = started.elapsed();
            warn!(
                target,
                attempts,
                elapsed_ms = elapsed.as_millis() as u64,
                last_status = %status,
                "readiness deadline exceeded"
            );
            return Err(ReadinessError::TimedOut {
                target: target.to_string(),
                elapsed,
                attempts,
                last_status: status.to_string(),
            });
        }

        sleep(policy.interval.min(deadline - now)).await;
    }
}

/// Sleep for `delay` and report readiness as assumed.
pub(crate) async fn wait_fixed_delay(target: &str, delay: Duration) -> ReadinessOutcome {
    info!(target, delay_ms = delay.as_millis() as u64, "waiting fixed delay");
    sleep(delay).await;
    warn!(
        target,
        "proceeding after fixed delay; readiness assumed, not observed"
    );
    ReadinessOutcome::Assumed { waited: delay }
}
