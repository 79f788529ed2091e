//! Phase ledger.
//!
//! Records what a run started, in order, so a failed run can tear down
//! exactly its own services and a successful run can report what it did.

use chrono::{DateTime, Utc};
use fleetup_readiness::ReadinessOutcome;
use serde::Serialize;
use ulid::Ulid;

use crate::phase::Phase;
use crate::platform::ServiceHandle;

/// Status of a ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    InProgress,
    Completed,
    Failed,
}

/// One phase of a run.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerEntry {
    pub phase: Phase,

    /// Service the phase acted on, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,

    /// Handle of a service this phase brought up.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub handle: Option<ServiceHandle>,

    pub status: EntryStatus,

    pub started_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub readiness: Option<ReadinessOutcome>,

    /// Free-form detail (counts, build arguments, error message).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Ordered record of a single run.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseLedger {
    pub run_id: Ulid,
    pub project: String,
    entries: Vec<LedgerEntry>,
}

impl PhaseLedger {
    pub fn new(run_id: Ulid, project: impl Into<String>) -> Self {
        Self {
            run_id,
            project: project.into(),
            entries: Vec::new(),
        }
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    /// Open an entry for `phase`. Each phase appears at most once.
    pub fn begin(&mut self, phase: Phase, service: Option<&str>) {
        debug_assert!(self.entry(phase).is_none(), "phase {} begun twice", phase);
        self.entries.push(LedgerEntry {
            phase,
            service: service.map(str::to_string),
            handle: None,
            status: EntryStatus::InProgress,
            started_at: Utc::now(),
            completed_at: None,
            readiness: None,
            detail: None,
        });
    }

    /// Record the handle of a service the open phase started.
    pub fn attach_handle(&mut self, phase: Phase, handle: ServiceHandle) {
        if let Some(entry) = self.entry_mut(phase) {
            entry.handle = Some(handle);
        }
    }

    /// Record readiness for a phase.
    pub fn set_readiness(&mut self, phase: Phase, outcome: ReadinessOutcome) {
        if let Some(entry) = self.entry_mut(phase) {
            entry.readiness = Some(outcome);
        }
    }

    /// Attach detail text to a phase.
    pub fn set_detail(&mut self, phase: Phase, detail: impl Into<String>) {
        if let Some(entry) = self.entry_mut(phase) {
            entry.detail = Some(detail.into());
        }
    }

    pub fn complete(&mut self, phase: Phase) {
        self.close(phase, EntryStatus::Completed);
    }

    pub fn fail(&mut self, phase: Phase, message: impl Into<String>) {
        self.close(phase, EntryStatus::Failed);
        self.set_detail(phase, message);
    }

    /// Handles to remove on rollback, newest first, each service once.
    pub fn teardown_order(&self) -> Vec<ServiceHandle> {
        let mut seen = Vec::<&str>::new();
        let mut handles = Vec::new();
        for handle in self.entries.iter().rev().filter_map(|e| e.handle.as_ref()) {
            if seen.contains(&handle.service.as_str()) {
                continue;
            }
            seen.push(&handle.service);
            handles.push(handle.clone());
        }
        handles
    }

    pub fn entry(&self, phase: Phase) -> Option<&LedgerEntry> {
        self.entries.iter().find(|e| e.phase == phase)
    }

    fn entry_mut(&mut self, phase: Phase) -> Option<&mut LedgerEntry> {
        self.entries.iter_mut().find(|e| e.phase == phase)
    }

    fn close(&mut self, phase: Phase, status: EntryStatus) {
        if let Some(entry) = self.entry_mut(phase) {
            entry.status = status;
            entry.completed_at = Some(Utc::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(service: &str, replicas: u32) -> ServiceHandle {
        ServiceHandle {
            project: "demo".to_string(),
            service: service.to_string(),
            replicas,
        }
    }

    #[test]
    fn test_teardown_is_newest_first() {
        let mut ledger = PhaseLedger::new(Ulid::new(), "demo");
        ledger.begin(Phase::Reset, None);
        ledger.complete(Phase::Reset);

        ledger.begin(Phase::Broker, Some("kafka"));
        ledger.attach_handle(Phase::Broker, handle("kafka", 1));
        ledger.complete(Phase::Broker);

        ledger.begin(Phase::Store, Some("minio"));
        ledger.attach_handle(Phase::Store, handle("minio", 1));
        ledger.fail(Phase::Store, "not ready");

        let order: Vec<String> = ledger
            .teardown_order()
            .into_iter()
            .map(|h| h.service)
            .collect();
        assert_eq!(order, vec!["minio", "kafka"]);
    }

    #[test]
    fn test_teardown_deduplicates_services() {
        let mut ledger = PhaseLedger::new(Ulid::new(), "demo");
        ledger.begin(Phase::Broker, Some("kafka"));
        ledger.attach_handle(Phase::Broker, handle("kafka", 1));
        ledger.begin(Phase::ScaleLaunch, Some("kafka"));
        ledger.attach_handle(Phase::ScaleLaunch, handle("kafka", 3));

        let order = ledger.teardown_order();
        assert_eq!(order.len(), 1);
        assert_eq!(order[0].replicas, 3);
    }

    #[test]
    fn test_fail_records_status_and_detail() {
        let mut ledger = PhaseLedger::new(Ulid::new(), "demo");
        ledger.begin(Phase::Build, Some("worker"));
        ledger.fail(Phase::Build, "build failed");

        let entry = ledger.entry(Phase::Build).unwrap();
        assert_eq!(entry.status, EntryStatus::Failed);
        assert_eq!(entry.detail.as_deref(), Some("build failed"));
        assert!(entry.completed_at.is_some());
        assert!(ledger.teardown_order().is_empty());
    }

    #[test]
    fn test_serializes_to_json() {
        let mut ledger = PhaseLedger::new(Ulid::new(), "demo");
        ledger.begin(Phase::Reset, None);
        ledger.set_detail(Phase::Reset, "removed 0 containers, 0 volumes");
        ledger.complete(Phase::Reset);

        let json = serde_json::to_value(&ledger).unwrap();
        assert_eq!(json["project"], "demo");
        assert_eq!(json["entries"][0]["phase"], "reset");
        assert_eq!(json["entries"][0]["status"], "completed");
        assert!(json["entries"][0].get("handle").is_none());
    }
}
