//! Bootstrap phases and the run state machine.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::BootstrapError;

/// One ordered step of the bootstrap sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Reset,
    Broker,
    Store,
    Build,
    ScaleLaunch,
}

impl Phase {
    /// All phases in execution order.
    pub const ALL: [Phase; 5] = [
        Phase::Reset,
        Phase::Broker,
        Phase::Store,
        Phase::Build,
        Phase::ScaleLaunch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Reset => "reset",
            Phase::Broker => "broker",
            Phase::Store => "store",
            Phase::Build => "build",
            Phase::ScaleLaunch => "scale_launch",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a bootstrap run.
///
/// The happy path is a straight line; each state has exactly one successor.
/// `Failed` is terminal and records the phase that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "phase", rename_all = "snake_case")]
pub enum BootstrapState {
    Idle,
    Reset,
    BrokerStarting,
    BrokerAssumedReady,
    StoreStarting,
    StoreAssumedReady,
    Building,
    WorkersLaunching,
    WorkersAssumedReady,
    Done,
    Failed(Phase),
}

impl BootstrapState {
    /// The only state this one may advance to.
    pub fn next(self) -> Option<BootstrapState> {
        use BootstrapState::*;

        match self {
            Idle => Some(Reset),
            Reset => Some(BrokerStarting),
            BrokerStarting => Some(BrokerAssumedReady),
            BrokerAssumedReady => Some(StoreStarting),
            StoreStarting => Some(StoreAssumedReady),
            StoreAssumedReady => Some(Building),
            Building => Some(WorkersLaunching),
            WorkersLaunching => Some(WorkersAssumedReady),
            WorkersAssumedReady => Some(Done),
            Done | Failed(_) => None,
        }
    }

    /// Phase a run is in while in this state.
    pub fn phase(self) -> Option<Phase> {
        use BootstrapState::*;

        match self {
            Idle | Done => None,
            Reset => Some(Phase::Reset),
            BrokerStarting | BrokerAssumedReady => Some(Phase::Broker),
            StoreStarting | StoreAssumedReady => Some(Phase::Store),
            Building => Some(Phase::Build),
            WorkersLaunching | WorkersAssumedReady => Some(Phase::ScaleLaunch),
            Failed(phase) => Some(phase),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BootstrapState::Done | BootstrapState::Failed(_))
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootstrapState::Failed(phase) => write!(f, "failed({})", phase),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Tracks the current state and rejects anything but forward single steps.
#[derive(Debug, Clone)]
pub struct StateMachine {
    state: BootstrapState,
    history: Vec<BootstrapState>,
}

impl StateMachine {
    pub fn new() -> Self {
        Self {
            state: BootstrapState::Idle,
            history: vec![BootstrapState::Idle],
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    /// Every state visited, in order.
    pub fn history(&self) -> &[BootstrapState] {
        &self.history
    }

    /// Move to `to`, which must be the current state's successor.
    pub fn transition(&mut self, to: BootstrapState) -> Result<(), BootstrapError> {
        if self.state.next() != Some(to) {
            return Err(BootstrapError::InvalidTransition {
                from: self.state,
                to,
            });
        }
        tracing::debug!(from = %self.state, to = %to, "state transition");
        self.state = to;
        self.history.push(to);
        Ok(())
    }

    /// Mark the run as failed in `phase`. No-op once terminal.
    pub fn fail(&mut self, phase: Phase) {
        if self.state.is_terminal() {
            return;
        }
        self.state = BootstrapState::Failed(phase);
        self.history.push(self.state);
    }
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}
