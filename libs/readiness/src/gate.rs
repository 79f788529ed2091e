//! Readiness gates attached to bootstrap phases.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ReadinessError;
use crate::policy::{check_bound, ReadinessPolicy};
use crate::probe::Probe;
use crate::wait::{wait_fixed_delay, wait_until_ready};

/// What a phase waits on before its dependents may proceed.
#[derive(Clone)]
pub enum ReadinessGate {
    /// Sleep unconditionally. Readiness is assumed once the delay elapses,
    /// whether or not the collaborator is actually up.
    FixedDelay(Duration),

    /// Poll a probe until it reports ready or the policy deadline passes.
    Probe {
        probe: Arc<dyn Probe>,
        policy: ReadinessPolicy,
    },
}

impl ReadinessGate {
    /// Gate on a probe with the given policy.
    pub fn probe(probe: impl Probe + 'static, policy: ReadinessPolicy) -> Self {
        Self::Probe {
            probe: Arc::new(probe),
            policy,
        }
    }

    /// Returns true if this gate observes the collaborator.
    pub fn is_observed(&self) -> bool {
        matches!(self, ReadinessGate::Probe { .. })
    }

    /// Check the gate's configuration without waiting.
    pub fn validate(&self) -> Result<(), ReadinessError> {
        match self {
            ReadinessGate::FixedDelay(delay) => check_bound("fixed delay", *delay),
            ReadinessGate::Probe { policy, .. } => policy.validate(),
        }
    }

    /// Wait until the gate opens.
    pub async fn wait(&self, target: &str) -> Result<ReadinessOutcome, ReadinessError> {
        match self {
            ReadinessGate::FixedDelay(delay) => Ok(wait_fixed_delay(target, *delay).await),
            ReadinessGate::Probe { probe, policy } => {
                wait_until_ready(target, probe.as_ref(), policy).await
            }
        }
    }
}

impl fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessGate::FixedDelay(delay) => f.debug_tuple("FixedDelay").field(delay).finish(),
            ReadinessGate::Probe { probe, policy } => f
                .debug_struct("Probe")
                .field("probe", &probe.describe())
                .field("policy", policy)
                .finish(),
        }
    }
}

impl fmt::Display for ReadinessGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessGate::FixedDelay(delay) => write!(f, "fixed delay {}s", delay.as_secs_f64()),
            ReadinessGate::Probe { probe, policy } => write!(
                f,
                "probe {} (timeout {}s)",
                probe.describe(),
                policy.timeout.as_secs_f64()
            ),
        }
    }
}

/// How a gate opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReadinessOutcome {
    /// A probe reported ready.
    Observed {
        attempts: u32,
        #[serde(with = "duration_ms")]
        elapsed: Duration,
    },

    /// A fixed delay elapsed; readiness was not verified.
    Assumed {
        #[serde(with = "duration_ms")]
        waited: Duration,
    },

    /// Nothing to wait for (for example, zero replicas requested).
    Skipped,
}

impl ReadinessOutcome {
    /// Number of probe checks, if a probe was used.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            ReadinessOutcome::Observed { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// Time spent waiting.
    pub fn elapsed(&self) -> Duration {
        match self {
            ReadinessOutcome::Observed { elapsed, .. } => *elapsed,
            ReadinessOutcome::Assumed { waited } => *waited,
            ReadinessOutcome::Skipped => Duration::ZERO,
        }
    }
}

impl fmt::Display for ReadinessOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadinessOutcome::Observed { attempts, elapsed } => write!(
                f,
                "observed after {} check(s) in {:.1}s",
                attempts,
                elapsed.as_secs_f64()
            ),
            ReadinessOutcome::Assumed { waited } => {
                write!(f, "assumed after {:.1}s", waited.as_secs_f64())
            }
            ReadinessOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
