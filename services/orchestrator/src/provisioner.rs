//! Compute tier: build with the epoch size, then launch the worker replicas.

use std::collections::BTreeMap;
use std::sync::Arc;

use fleetup_readiness::{ReadinessGate, ReadinessOutcome};
use fleetup_scale::{EpochSize, WorkerTopology};
use tracing::{info, warn};

use crate::error::BootstrapError;
use crate::launcher::wait_gate;
use crate::ledger::PhaseLedger;
use crate::phase::{BootstrapState, Phase, StateMachine};
use crate::platform::{Platform, ServiceHandle};

/// What the compute tier is built and launched with.
#[derive(Debug, Clone)]
pub struct ComputeTier {
    pub service: String,
    pub epoch_build_arg: String,
    pub epoch_size: EpochSize,
    pub topology: WorkerTopology,
    pub gate: ReadinessGate,
}

impl ComputeTier {
    /// Build arguments passed to the image build.
    pub fn build_args(&self) -> BTreeMap<String, String> {
        let mut args = BTreeMap::new();
        args.insert(self.epoch_build_arg.clone(), self.epoch_size.to_string());
        args
    }
}

/// Builds the worker image and launches exactly the resolved replica count.
pub struct ComputeTierProvisioner {
    platform: Arc<dyn Platform>,
    tier: ComputeTier,
}

impl ComputeTierProvisioner {
    pub fn new(platform: Arc<dyn Platform>, tier: ComputeTier) -> Self {
        Self { platform, tier }
    }

    pub async fn run(
        &self,
        machine: &mut StateMachine,
        ledger: &mut PhaseLedger,
    ) -> Result<ReadinessOutcome, BootstrapError> {
        self.build(machine, ledger).await?;
        self.launch(machine, ledger).await
    }

    async fn build(
        &self,
        machine: &mut StateMachine,
        ledger: &mut PhaseLedger,
    ) -> Result<(), BootstrapError> {
        let tier = &self.tier;
        machine.transition(BootstrapState::Building)?;
        ledger.begin(Phase::Build, Some(&tier.service));

        let build_args = tier.build_args();
        info!(service = %tier.service, epoch_size = %tier.epoch_size, "Building worker image");

        if let Err(e) = self.platform.build_service(&tier.service, &build_args).await {
            ledger.fail(Phase::Build, e.to_string());
            return Err(BootstrapError::platform(Phase::Build, e));
        }

        ledger.set_detail(
            Phase::Build,
            format!("{}={}", tier.epoch_build_arg, tier.epoch_size),
        );
        ledger.complete(Phase::Build);
        Ok(())
    }

    async fn launch(
        &self,
        machine: &mut StateMachine,
        ledger: &mut PhaseLedger,
    ) -> Result<ReadinessOutcome, BootstrapError> {
        let tier = &self.tier;
        let replicas = tier.topology.worker_process_count;
        machine.transition(BootstrapState::WorkersLaunching)?;
        ledger.begin(Phase::ScaleLaunch, Some(&tier.service));

        let truncated = tier.topology.truncated_units();
        if truncated > 0 {
            warn!(
                scale_factor = tier.topology.scale_factor,
                threads_per_worker = tier.topology.threads_per_worker,
                truncated_units = truncated,
                "Scale factor is not a multiple of threads per worker; remainder discarded"
            );
        }

        // A failed scale may still have left replicas behind.
        if replicas > 0 {
            ledger.attach_handle(
                Phase::ScaleLaunch,
                ServiceHandle {
                    project: ledger.project.clone(),
                    service: tier.service.clone(),
                    replicas,
                },
            );
        }

        info!(service = %tier.service, replicas, topology = %tier.topology, "Launching workers");
        let handle = match self.platform.scale_service(&tier.service, replicas).await {
            Ok(handle) => handle,
            Err(e) => {
                ledger.fail(Phase::ScaleLaunch, e.to_string());
                return Err(BootstrapError::platform(Phase::ScaleLaunch, e));
            }
        };
        if replicas > 0 {
            ledger.attach_handle(Phase::ScaleLaunch, handle);
        }
        ledger.set_detail(Phase::ScaleLaunch, format!("{} replica(s)", replicas));

        let outcome = if tier.topology.is_empty() {
            info!(service = %tier.service, "Zero replicas requested; skipping readiness wait");
            ReadinessOutcome::Skipped
        } else {
            wait_gate(Phase::ScaleLaunch, &tier.service, &tier.gate, ledger).await?
        };
        ledger.set_readiness(Phase::ScaleLaunch, outcome);

        machine.transition(BootstrapState::WorkersAssumedReady)?;
        ledger.complete(Phase::ScaleLaunch);
        info!(service = %tier.service, replicas, readiness = %outcome, "Workers launched");
        Ok(outcome)
    }
}
