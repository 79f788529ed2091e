//! Environment reset.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::BootstrapError;
use crate::ledger::PhaseLedger;
use crate::phase::{BootstrapState, Phase, StateMachine};
use crate::platform::{Platform, ResetReport, ResetScope};

/// Removes runtime state left by previous deployments.
///
/// Runs once, first, before any service starts. Not retried.
pub struct EnvironmentReset {
    platform: Arc<dyn Platform>,
    scope: ResetScope,
}

impl EnvironmentReset {
    pub fn new(platform: Arc<dyn Platform>, scope: ResetScope) -> Self {
        Self { platform, scope }
    }

    pub fn scope(&self) -> &ResetScope {
        &self.scope
    }

    pub async fn run(
        &self,
        machine: &mut StateMachine,
        ledger: &mut PhaseLedger,
    ) -> Result<ResetReport, BootstrapError> {
        machine.transition(BootstrapState::Reset)?;
        ledger.begin(Phase::Reset, None);

        if self.scope.is_global() {
            warn!(
                "Global reset: pruning every stopped container and unreferenced volume on this host, \
                 including those of unrelated deployments"
            );
        }
        info!(scope = %self.scope, "Resetting environment");

        let report = match self.platform.reset(&self.scope).await {
            Ok(report) => report,
            Err(e) => {
                ledger.fail(Phase::Reset, e.to_string());
                return Err(BootstrapError::platform(Phase::Reset, e));
            }
        };

        info!(
            containers_removed = report.containers_removed,
            volumes_removed = report.volumes_removed,
            "Environment reset complete"
        );
        ledger.set_detail(
            Phase::Reset,
            format!(
                "removed {} container(s), {} volume(s)",
                report.containers_removed, report.volumes_removed
            ),
        );
        ledger.complete(Phase::Reset);

        Ok(report)
    }
}
