//! Bootstrap driver.
//!
//! Runs the phases in order against a [`Platform`], owns the state machine
//! and the phase ledger, and tears down what the run started when a phase
//! fails.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use fleetup_readiness::ReadinessGate;
use fleetup_scale::{DeploymentRequest, WorkerTopology};
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};
use ulid::Ulid;

use crate::config::{
    BootstrapConfig, BROKER_FIXED_DELAY, STORE_FIXED_DELAY, WORKERS_FIXED_DELAY,
};
use crate::error::BootstrapError;
use crate::launcher::{DependencyOrderedLauncher, Tier};
use crate::ledger::PhaseLedger;
use crate::phase::{BootstrapState, Phase, StateMachine};
use crate::platform::{Platform, ResetReport, ResetScope};
use crate::probe::build_gate;
use crate::provisioner::{ComputeTier, ComputeTierProvisioner};
use crate::reset::EnvironmentReset;

/// One planned step, for dry runs and summaries.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStep {
    pub phase: Phase,
    pub service: Option<String>,
    pub action: String,
    pub readiness: String,
}

/// Everything a run would do, resolved without touching the platform.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapPlan {
    pub project: String,
    pub reset_scope: ResetScope,
    pub request: DeploymentRequest,
    pub topology: WorkerTopology,
    pub steps: Vec<PlannedStep>,
    #[serde(skip)]
    gates: Gates,
}

impl fmt::Display for BootstrapPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "project {}: {}", self.project, self.topology)?;
        for step in &self.steps {
            writeln!(f, "  {:<12} {} [{}]", step.phase.as_str(), step.action, step.readiness)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Gates {
    broker: ReadinessGate,
    store: ReadinessGate,
    workers: ReadinessGate,
}

/// Result of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct BootstrapReport {
    pub run_id: Ulid,
    pub project: String,
    pub state: BootstrapState,
    pub request: DeploymentRequest,
    pub topology: WorkerTopology,
    pub reset: ResetReport,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub ledger: PhaseLedger,
}

/// Drives a bootstrap run.
pub struct Orchestrator {
    config: BootstrapConfig,
    platform: Arc<dyn Platform>,
}

impl Orchestrator {
    pub fn new(config: BootstrapConfig, platform: Arc<dyn Platform>) -> Self {
        Self { config, platform }
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    /// Validate configuration and resolve the run without side effects.
    pub fn plan(&self, request: &DeploymentRequest) -> Result<BootstrapPlan, BootstrapError> {
        let config = &self.config;
        config.validate()?;

        let topology = request.topology(config.threads_per_worker);
        let gates = Gates {
            broker: build_gate(
                &config.broker.readiness,
                BROKER_FIXED_DELAY,
                &self.platform,
                &config.broker.service,
                1,
            )?,
            store: build_gate(
                &config.store.readiness,
                STORE_FIXED_DELAY,
                &self.platform,
                &config.store.service,
                1,
            )?,
            workers: build_gate(
                &config.workers.readiness,
                WORKERS_FIXED_DELAY,
                &self.platform,
                &config.workers.service,
                topology.worker_process_count,
            )?,
        };

        let reset_scope = config.reset_scope();
        let workers_readiness = if topology.is_empty() {
            "skipped (zero replicas)".to_string()
        } else {
            gates.workers.to_string()
        };
        let steps = vec![
            PlannedStep {
                phase: Phase::Reset,
                service: None,
                action: format!("reset {}", reset_scope),
                readiness: "-".to_string(),
            },
            PlannedStep {
                phase: Phase::Broker,
                service: Some(config.broker.service.clone()),
                action: format!("start {}", config.broker.service),
                readiness: gates.broker.to_string(),
            },
            PlannedStep {
                phase: Phase::Store,
                service: Some(config.store.service.clone()),
                action: format!("start {}", config.store.service),
                readiness: gates.store.to_string(),
            },
            PlannedStep {
                phase: Phase::Build,
                service: Some(config.workers.service.clone()),
                action: format!(
                    "build {} with {}={}",
                    config.workers.service, config.workers.epoch_build_arg, request.epoch_size
                ),
                readiness: "-".to_string(),
            },
            PlannedStep {
                phase: Phase::ScaleLaunch,
                service: Some(config.workers.service.clone()),
                action: format!(
                    "scale {} to {} replica(s)",
                    config.workers.service, topology.worker_process_count
                ),
                readiness: workers_readiness,
            },
        ];

        Ok(BootstrapPlan {
            project: config.project.clone(),
            reset_scope,
            request: *request,
            topology,
            steps,
            gates,
        })
    }

    /// Parse the two positional parameters, then run.
    pub async fn run_raw(
        &self,
        scale_factor: Option<&str>,
        epoch_size: Option<&str>,
    ) -> Result<BootstrapReport, BootstrapError> {
        let request = DeploymentRequest::parse(scale_factor, epoch_size)?;
        self.run(request).await
    }

    /// Run every phase in order.
    pub async fn run(&self, request: DeploymentRequest) -> Result<BootstrapReport, BootstrapError> {
        let plan = self.plan(&request)?;
        let run_id = Ulid::new();
        let span = info_span!("bootstrap", run_id = %run_id, project = %plan.project);

        self.execute(run_id, plan).instrument(span).await
    }

    async fn execute(
        &self,
        run_id: Ulid,
        plan: BootstrapPlan,
    ) -> Result<BootstrapReport, BootstrapError> {
        let started_at = Utc::now();
        let mut machine = StateMachine::new();
        let mut ledger = PhaseLedger::new(run_id, plan.project.clone());

        info!(
            scale_factor = %plan.request.scale_factor,
            epoch_size = %plan.request.epoch_size,
            workers = plan.topology.worker_process_count,
            threads_per_worker = plan.topology.threads_per_worker,
            "Starting bootstrap"
        );

        let result = self.run_phases(&plan, &mut machine, &mut ledger).await;

        match result {
            Ok(reset) => {
                machine.transition(BootstrapState::Done)?;
                info!(workers = plan.topology.worker_process_count, "Bootstrap complete");
                Ok(BootstrapReport {
                    run_id,
                    project: plan.project,
                    state: machine.state(),
                    request: plan.request,
                    topology: plan.topology,
                    reset,
                    started_at,
                    completed_at: Utc::now(),
                    ledger,
                })
            }
            Err(e) => {
                let phase = e
                    .phase()
                    .or_else(|| machine.state().phase())
                    .unwrap_or(Phase::Reset);
                machine.fail(phase);
                error!(phase = %phase, reason = e.reason_code(), error = %e, "Bootstrap failed");

                if self.config.rollback_on_failure {
                    self.roll_back(&ledger).await;
                } else {
                    let left = ledger.teardown_order();
                    if !left.is_empty() {
                        warn!(
                            services = ?left.iter().map(|h| h.service.as_str()).collect::<Vec<_>>(),
                            "Rollback disabled; started services left running"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    async fn run_phases(
        &self,
        plan: &BootstrapPlan,
        machine: &mut StateMachine,
        ledger: &mut PhaseLedger,
    ) -> Result<ResetReport, BootstrapError> {
        let config = &self.config;

        let reset = EnvironmentReset::new(self.platform.clone(), plan.reset_scope.clone())
            .run(machine, ledger)
            .await?;

        DependencyOrderedLauncher::new(
            self.platform.clone(),
            Tier {
                service: config.broker.service.clone(),
                gate: plan.gates.broker.clone(),
            },
            Tier {
                service: config.store.service.clone(),
                gate: plan.gates.store.clone(),
            },
        )
        .run(machine, ledger)
        .await?;

        ComputeTierProvisioner::new(
            self.platform.clone(),
            ComputeTier {
                service: config.workers.service.clone(),
                epoch_build_arg: config.workers.epoch_build_arg.clone(),
                epoch_size: plan.request.epoch_size,
                topology: plan.topology,
                gate: plan.gates.workers.clone(),
            },
        )
        .run(machine, ledger)
        .await?;

        Ok(reset)
    }

    /// Remove what this run started, newest first. Errors are logged only.
    async fn roll_back(&self, ledger: &PhaseLedger) {
        for handle in ledger.teardown_order() {
            info!(service = %handle.service, "Rolling back service");
            if let Err(e) = self.platform.remove_service(&handle).await {
                error!(service = %handle.service, error = %e, "Rollback failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MockPlatform;

    fn orchestrator() -> Orchestrator {
        Orchestrator::new(
            BootstrapConfig::default().with_fixed_delays(),
            Arc::new(MockPlatform::new("fleetup")),
        )
    }

    #[test]
    fn test_plan_resolves_topology() {
        let plan = orchestrator()
            .plan(&DeploymentRequest::new(10, 50).unwrap())
            .unwrap();

        assert_eq!(plan.topology.worker_process_count, 2);
        assert_eq!(plan.steps.len(), 5);
        assert_eq!(plan.steps[3].action, "build worker with epoch_size=50");
        assert_eq!(plan.steps[4].action, "scale worker to 2 replica(s)");
    }

    #[test]
    fn test_plan_issues_no_platform_calls() {
        let platform = Arc::new(MockPlatform::new("fleetup"));
        let orchestrator = Orchestrator::new(BootstrapConfig::default(), platform.clone());

        orchestrator
            .plan(&DeploymentRequest::new(16, 1).unwrap())
            .unwrap();
        assert!(platform.calls().is_empty());
    }

    #[test]
    fn test_plan_zero_workers_skips_readiness() {
        let plan = orchestrator()
            .plan(&DeploymentRequest::new(0, 1).unwrap())
            .unwrap();
        assert!(plan.steps[4].readiness.starts_with("skipped"));
    }

    #[test]
    fn test_plan_rejects_invalid_manifest() {
        let mut config = BootstrapConfig::default();
        config.project = String::new();
        let orchestrator = Orchestrator::new(config, Arc::new(MockPlatform::new("x")));

        let err = orchestrator
            .plan(&DeploymentRequest::new(4, 1).unwrap())
            .unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_plan_serializes_without_gates() {
        let plan = orchestrator()
            .plan(&DeploymentRequest::new(16, 1).unwrap())
            .unwrap();
        let json = serde_json::to_value(&plan).unwrap();

        assert_eq!(json["topology"]["worker_process_count"], 4);
        assert_eq!(json["reset_scope"]["scope"], "project");
        assert!(json.get("gates").is_none());
    }
}
