//! fleetup orchestrator library.
//!
//! Brings up a message broker, an object store and a pool of compute workers
//! in dependency order, with the worker count derived from a scale factor.
//!
//! ## Sequence
//!
//! ```text
//! Reset ──→ Broker ──(ready)──→ Store ──(ready)──→ Build ──→ Scale-Launch ──(ready)──→ Done
//! ```
//!
//! Every step runs strictly after the previous one. The first failure halts
//! the run; services this run started are then torn down newest first, unless
//! rollback is disabled.
//!
//! ## Modules
//!
//! - `platform`: orchestration platform interface and an in-memory platform
//! - `compose`: Docker Compose implementation of the platform
//! - `config`: deployment manifest loading and validation
//! - `phase`: phases and the bootstrap state machine
//! - `ledger`: record of what a run started, used for teardown
//! - `probe`: readiness gates, including the replica-count probe
//! - `reset`, `launcher`, `provisioner`: the bootstrap components
//! - `bootstrap`: the driver tying them together

pub mod bootstrap;
pub mod compose;
pub mod config;
pub mod error;
pub mod launcher;
pub mod ledger;
pub mod phase;
pub mod platform;
pub mod probe;
pub mod provisioner;
pub mod reset;

pub use bootstrap::{BootstrapPlan, BootstrapReport, Orchestrator};
pub use compose::{ComposePlatform, ComposePlatformConfig};
pub use config::{BootstrapConfig, ConfigError, ReadinessConfig, ReadinessKind, ResetMode};
pub use error::BootstrapError;
pub use phase::{BootstrapState, Phase};
pub use platform::{MockPlatform, Platform, PlatformError, ResetReport, ResetScope, ServiceHandle};
