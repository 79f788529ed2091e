//! Orchestration platform interface and in-memory implementation.
//!
//! The platform interface abstracts the container operations bootstrap needs:
//! - Resetting leftover runtime state
//! - Starting, building and scaling services
//! - Counting running replicas
//! - Removing services this run started
//!
//! [`ComposePlatform`](crate::compose::ComposePlatform) drives Docker Compose.
//! [`MockPlatform`] keeps everything in memory for tests.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info};

/// Errors from platform commands.
#[derive(Debug, Error)]
pub enum PlatformError {
    /// The command could not be executed at all (binary missing, daemon
    /// socket unreachable before the command ran, ...).
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The command ran and exited unsuccessfully.
    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    /// The command succeeded but its output could not be interpreted.
    #[error("unexpected output from `{command}`: {message}")]
    UnexpectedOutput { command: String, message: String },

    /// A status query made while waiting for readiness could not run.
    #[error("{command} failed: {message}")]
    StatusUnavailable { command: String, message: String },
}

impl PlatformError {
    /// The command line that failed.
    pub fn command(&self) -> &str {
        match self {
            PlatformError::Spawn { command, .. }
            | PlatformError::CommandFailed { command, .. }
            | PlatformError::UnexpectedOutput { command, .. }
            | PlatformError::StatusUnavailable { command, .. } => command,
        }
    }
}

/// Which runtime state a reset may remove.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "scope", content = "project", rename_all = "snake_case")]
pub enum ResetScope {
    /// Only resources labelled with this deployment's project name.
    Project(String),

    /// Every stopped container and unreferenced volume on the platform,
    /// including those of unrelated deployments.
    Global,
}

impl ResetScope {
    pub fn is_global(&self) -> bool {
        matches!(self, ResetScope::Global)
    }
}

impl fmt::Display for ResetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetScope::Project(project) => write!(f, "project {}", project),
            ResetScope::Global => write!(f, "global"),
        }
    }
}

/// What a reset removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetReport {
    pub containers_removed: u32,
    pub volumes_removed: u32,
}

impl ResetReport {
    /// Returns true if nothing was removed.
    pub fn is_empty(&self) -> bool {
        self.containers_removed == 0 && self.volumes_removed == 0
    }
}

/// Handle to a service started by a run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceHandle {
    /// Deployment identity the service belongs to.
    pub project: String,

    /// Service name in the deployment definition.
    pub service: String,

    /// Replica count requested when the handle was issued.
    pub replicas: u32,
}

/// Orchestration platform interface.
#[async_trait]
pub trait Platform: Send + Sync {
    /// Remove leftover containers and volumes within `scope`.
    async fn reset(&self, scope: &ResetScope) -> Result<ResetReport, PlatformError>;

    /// Start a single service and return a handle to it.
    async fn start_service(&self, service: &str) -> Result<ServiceHandle, PlatformError>;

    /// Build a service's image with the given build arguments.
    async fn build_service(
        &self,
        service: &str,
        build_args: &BTreeMap<String, String>,
    ) -> Result<(), PlatformError>;

    /// Run exactly `replicas` identical instances of a service.
    async fn scale_service(&self, service: &str, replicas: u32)
        -> Result<ServiceHandle, PlatformError>;

    /// Number of replicas of a service currently running.
    async fn running_replicas(&self, service: &str) -> Result<u32, PlatformError>;

    /// Stop and remove a service previously started.
    async fn remove_service(&self, handle: &ServiceHandle) -> Result<(), PlatformError>;
}

/// A call recorded by [`MockPlatform`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    Reset(ResetScope),
    Start(String),
    Build {
        service: String,
        build_args: BTreeMap<String, String>,
    },
    Scale {
        service: String,
        replicas: u32,
    },
    RunningReplicas(String),
    Remove(String),
}

/// Operation that [`MockPlatform`] should fail.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailPoint {
    Reset,
    Start(String),
    Build(String),
    Scale(String),
    RunningReplicas(String),
    Remove(String),
}

#[derive(Debug, Default)]
struct MockState {
    calls: Vec<(Instant, PlatformCall)>,
    fail_points: BTreeSet<FailPoint>,
    /// Stopped containers and dangling volumes from earlier runs.
    leftover_containers: u32,
    leftover_volumes: u32,
    /// Running services and their replica counts.
    running: BTreeMap<String, u32>,
    /// Services whose replicas never show up as running.
    stuck: BTreeSet<String>,
}

/// In-memory platform for testing.
pub struct MockPlatform {
    project: String,
    state: Mutex<MockState>,
}

impl MockPlatform {
    /// Create an empty mock platform for `project`.
    pub fn new(project: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            state: Mutex::new(MockState::default()),
        }
    }

    /// Seed leftover state from a previous deployment.
    pub fn with_leftovers(self, containers: u32, volumes: u32) -> Self {
        {
            let mut state = self.lock();
            state.leftover_containers = containers;
            state.leftover_volumes = volumes;
        }
        self
    }

    /// Make an operation fail.
    pub fn failing_on(self, point: FailPoint) -> Self {
        self.lock().fail_points.insert(point);
        self
    }

    /// Report zero running replicas for `service` no matter what was started.
    pub fn with_stuck_service(self, service: impl Into<String>) -> Self {
        self.lock().stuck.insert(service.into());
        self
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<PlatformCall> {
        self.lock().calls.iter().map(|(_, call)| call.clone()).collect()
    }

    /// All recorded calls with the (tokio) instant each was issued.
    pub fn timed_calls(&self) -> Vec<(Instant, PlatformCall)> {
        self.lock().calls.clone()
    }

    /// Instant at which the first call matching `f` was issued.
    pub fn issued_at(&self, f: impl Fn(&PlatformCall) -> bool) -> Option<Instant> {
        self.lock()
            .calls
            .iter()
            .find(|(_, call)| f(call))
            .map(|(at, _)| *at)
    }

    /// Services currently running with their replica counts.
    pub fn running(&self) -> BTreeMap<String, u32> {
        self.lock().running.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        // A poisoned lock only means a test panicked mid-call.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: PlatformCall) {
        self.lock().calls.push((Instant::now(), call));
    }

    fn check_fail(&self, point: FailPoint, command: String) -> Result<(), PlatformError> {
        if self.lock().fail_points.contains(&point) {
            return Err(PlatformError::CommandFailed {
                command,
                status: "exit status: 1".to_string(),
                stderr: "[MOCK] configured to fail".to_string(),
            });
        }
        Ok(())
    }

    fn handle(&self, service: &str, replicas: u32) -> ServiceHandle {
        ServiceHandle {
            project: self.project.clone(),
            service: service.to_string(),
            replicas,
        }
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn reset(&self, scope: &ResetScope) -> Result<ResetReport, PlatformError> {
        self.record(PlatformCall::Reset(scope.clone()));
        self.check_fail(FailPoint::Reset, format!("[MOCK] reset {}", scope))?;

        let mut state = self.lock();
        let running_containers: u32 = state.running.values().sum();
        let report = ResetReport {
            containers_removed: state.leftover_containers + running_containers,
            volumes_removed: state.leftover_volumes,
        };
        state.leftover_containers = 0;
        state.leftover_volumes = 0;
        state.running.clear();

        info!(
            scope = %scope,
            containers = report.containers_removed,
            volumes = report.volumes_removed,
            "[MOCK] Reset"
        );
        Ok(report)
    }

    async fn start_service(&self, service: &str) -> Result<ServiceHandle, PlatformError> {
        self.record(PlatformCall::Start(service.to_string()));
        self.check_fail(
            FailPoint::Start(service.to_string()),
            format!("[MOCK] up {}", service),
        )?;

        self.lock().running.insert(service.to_string(), 1);
        info!(service, "[MOCK] Started service");
        Ok(self.handle(service, 1))
    }

    async fn build_service(
        &self,
        service: &str,
        build_args: &BTreeMap<String, String>,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::Build {
            service: service.to_string(),
            build_args: build_args.clone(),
        });
        self.check_fail(
            FailPoint::Build(service.to_string()),
            format!("[MOCK] build {}", service),
        )?;

        info!(service, build_args = ?build_args, "[MOCK] Built service");
        Ok(())
    }

    async fn scale_service(
        &self,
        service: &str,
        replicas: u32,
    ) -> Result<ServiceHandle, PlatformError> {
        self.record(PlatformCall::Scale {
            service: service.to_string(),
            replicas,
        });
        self.check_fail(
            FailPoint::Scale(service.to_string()),
            format!("[MOCK] up --scale {}={}", service, replicas),
        )?;

        {
            let mut state = self.lock();
            if replicas == 0 {
                state.running.remove(service);
            } else {
                state.running.insert(service.to_string(), replicas);
            }
        }
        info!(service, replicas, "[MOCK] Scaled service");
        Ok(self.handle(service, replicas))
    }

    async fn running_replicas(&self, service: &str) -> Result<u32, PlatformError> {
        self.record(PlatformCall::RunningReplicas(service.to_string()));
        self.check_fail(
            FailPoint::RunningReplicas(service.to_string()),
            format!("[MOCK] ps {}", service),
        )?;

        let state = self.lock();
        if state.stuck.contains(service) {
            return Ok(0);
        }
        let replicas = state.running.get(service).copied().unwrap_or(0);
        debug!(service, replicas, "[MOCK] Running replicas");
        Ok(replicas)
    }

    async fn remove_service(&self, handle: &ServiceHandle) -> Result<(), PlatformError> {
        self.record(PlatformCall::Remove(handle.service.clone()));
        self.check_fail(
            FailPoint::Remove(handle.service.clone()),
            format!("[MOCK] rm {}", handle.service),
        )?;

        self.lock().running.remove(&handle.service);
        info!(service = %handle.service, "[MOCK] Removed service");
        Ok(())
    }
}
