//! Readiness gates for bootstrap phases.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleetup_readiness::{HttpProbe, Probe, ProbeStatus, ReadinessGate, TcpProbe};

use crate::config::{ConfigError, ReadinessConfig, ReadinessKind};
use crate::platform::Platform;

/// Ready once the platform reports `expected` running replicas of a service.
pub struct ReplicaProbe {
    platform: Arc<dyn Platform>,
    service: String,
    expected: u32,
}

impl ReplicaProbe {
    pub fn new(platform: Arc<dyn Platform>, service: impl Into<String>, expected: u32) -> Self {
        Self {
            platform,
            service: service.into(),
            expected,
        }
    }
}

#[async_trait]
impl Probe for ReplicaProbe {
    fn describe(&self) -> String {
        format!("replicas://{}={}", self.service, self.expected)
    }

    async fn check(&self) -> ProbeStatus {
        match self.platform.running_replicas(&self.service).await {
            Ok(running) if running == self.expected => ProbeStatus::Ready,
            Ok(running) => ProbeStatus::NotReady(format!(
                "{} of {} replicas running",
                running, self.expected
            )),
            Err(e) => ProbeStatus::Failed(e.to_string()),
        }
    }
}

/// Build the gate a phase waits on.
///
/// `fallback_delay` is used for fixed-delay gates without an explicit delay.
/// `expected_replicas` is what a replica gate waits for.
pub fn build_gate(
    config: &ReadinessConfig,
    fallback_delay: Duration,
    platform: &Arc<dyn Platform>,
    service: &str,
    expected_replicas: u32,
) -> Result<ReadinessGate, ConfigError> {
    let policy = config.policy();
    let gate = match config.kind {
        ReadinessKind::FixedDelay => ReadinessGate::FixedDelay(config.delay_or(fallback_delay)),
        ReadinessKind::Tcp => {
            let address = config.address.clone().unwrap_or_default();
            let probe = TcpProbe::new(address).with_connect_timeout(policy.check_timeout);
            ReadinessGate::probe(probe, policy)
        }
        ReadinessKind::Http => {
            let url = config.url.clone().unwrap_or_default();
            let probe = HttpProbe::new(url, policy.check_timeout)?;
            ReadinessGate::probe(probe, policy)
        }
        ReadinessKind::Replicas => {
            let probe = ReplicaProbe::new(platform.clone(), service, expected_replicas);
            ReadinessGate::probe(probe, policy)
        }
    };
    gate.validate()?;
    Ok(gate)
}
