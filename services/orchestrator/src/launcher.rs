//! Dependency-ordered launch of the broker and the object store.

use std::sync::Arc;

use fleetup_readiness::{ReadinessError, ReadinessGate, ReadinessOutcome};
use tracing::info;

use crate::error::BootstrapError;
use crate::ledger::PhaseLedger;
use crate::phase::{BootstrapState, Phase, StateMachine};
use crate::platform::{Platform, PlatformError};

/// A dependency tier: one service and the gate its dependents wait on.
#[derive(Debug, Clone)]
pub struct Tier {
    pub service: String,
    pub gate: ReadinessGate,
}

/// Starts the broker, waits on its gate, then starts the store and waits on
/// its gate. The store is never started before the broker gate opens.
pub struct DependencyOrderedLauncher {
    platform: Arc<dyn Platform>,
    broker: Tier,
    store: Tier,
}

impl DependencyOrderedLauncher {
    pub fn new(platform: Arc<dyn Platform>, broker: Tier, store: Tier) -> Self {
        Self {
            platform,
            broker,
            store,
        }
    }

    pub async fn run(
        &self,
        machine: &mut StateMachine,
        ledger: &mut PhaseLedger,
    ) -> Result<(), BootstrapError> {
        self.launch(
            Phase::Broker,
            &self.broker,
            (BootstrapState::BrokerStarting, BootstrapState::BrokerAssumedReady),
            machine,
            ledger,
        )
        .await?;

        self.launch(
            Phase::Store,
            &self.store,
            (BootstrapState::StoreStarting, BootstrapState::StoreAssumedReady),
            machine,
            ledger,
        )
        .await
    }

    async fn launch(
        &self,
        phase: Phase,
        tier: &Tier,
        (starting, ready): (BootstrapState, BootstrapState),
        machine: &mut StateMachine,
        ledger: &mut PhaseLedger,
    ) -> Result<(), BootstrapError> {
        machine.transition(starting)?;
        ledger.begin(phase, Some(&tier.service));

        info!(phase = %phase, service = %tier.service, "Starting service");
        let handle = match self.platform.start_service(&tier.service).await {
            Ok(handle) => handle,
            Err(e) => {
                ledger.fail(phase, e.to_string());
                return Err(BootstrapError::platform(phase, e));
            }
        };
        ledger.attach_handle(phase, handle);

        info!(phase = %phase, service = %tier.service, gate = %tier.gate, "Waiting for readiness");
        let outcome = wait_gate(phase, &tier.service, &tier.gate, ledger).await?;
        ledger.set_readiness(phase, outcome);

        machine.transition(ready)?;
        ledger.complete(phase);
        info!(phase = %phase, service = %tier.service, readiness = %outcome, "Service ready");
        Ok(())
    }
}

/// Wait on a phase's gate, recording a failure in the ledger.
///
/// A check that could not run at all is a platform failure, not a readiness
/// timeout.
pub(crate) async fn wait_gate(
    phase: Phase,
    service: &str,
    gate: &ReadinessGate,
    ledger: &mut PhaseLedger,
) -> Result<ReadinessOutcome, BootstrapError> {
    gate.wait(service).await.map_err(|source| {
        ledger.fail(phase, source.to_string());
        match source {
            ReadinessError::ProbeFailed { target, message, .. } => BootstrapError::platform(
                phase,
                PlatformError::StatusUnavailable {
                    command: format!("readiness check for {}", target),
                    message,
                },
            ),
            source => BootstrapError::AssumedReadyButNotReady {
                phase,
                service: service.to_string(),
                source,
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::platform::{FailPoint, MockPlatform, PlatformCall};
    use tokio::time::Instant;
    use ulid::Ulid;

    fn tier(service: &str, delay_secs: u64) -> Tier {
        Tier {
            service: service.to_string(),
            gate: ReadinessGate::FixedDelay(Duration::from_secs(delay_secs)),
        }
    }

    fn advanced_to_reset() -> StateMachine {
        let mut machine = StateMachine::new();
        machine.transition(BootstrapState::Reset).unwrap();
        machine
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_waits_for_broker_gate() {
        let platform = Arc::new(MockPlatform::new("demo"));
        let launcher =
            DependencyOrderedLauncher::new(platform.clone(), tier("kafka", 5), tier("minio", 10));
        let mut machine = advanced_to_reset();
        let mut ledger = PhaseLedger::new(Ulid::new(), "demo");

        let started = Instant::now();
        launcher.run(&mut machine, &mut ledger).await.unwrap();

        let broker = platform
            .issued_at(|c| *c == PlatformCall::Start("kafka".into()))
            .unwrap();
        let store = platform
            .issued_at(|c| *c == PlatformCall::Start("minio".into()))
            .unwrap();
        assert!(store - broker >= Duration::from_secs(5));
        assert!(started.elapsed() >= Duration::from_secs(15));
        assert_eq!(machine.state(), BootstrapState::StoreAssumedReady);
        assert_eq!(ledger.teardown_order().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_broker_failure_never_starts_store() {
        let platform =
            Arc::new(MockPlatform::new("demo").failing_on(FailPoint::Start("kafka".into())));
        let launcher =
            DependencyOrderedLauncher::new(platform.clone(), tier("kafka", 5), tier("minio", 10));
        let mut machine = advanced_to_reset();
        let mut ledger = PhaseLedger::new(Ulid::new(), "demo");

        let err = launcher.run(&mut machine, &mut ledger).await.unwrap_err();

        assert_eq!(err.phase(), Some(Phase::Broker));
        assert_eq!(platform.calls(), vec![PlatformCall::Start("kafka".into())]);
        assert!(ledger.teardown_order().is_empty());
    }
}
