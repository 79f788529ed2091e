//! Readiness probes and bounded waits.
//!
//! A dependent service should only start once the services it depends on can
//! accept requests. This crate provides:
//!
//! - **Probes**: a single readiness check against a collaborator (TCP
//!   connect, HTTP 2xx, or anything implementing [`Probe`]).
//! - **Policies**: how often to poll, how many consecutive successes count
//!   as ready, and the overall deadline.
//! - **Gates**: what a phase waits on before its dependents proceed. Either
//!   an observed probe result or a fixed delay that only *assumes* readiness.
//!
//! # Invariants
//!
//! - A probe wait never exceeds `grace_period + timeout` plus one check
//! - A timed-out wait is always an error, never silently treated as ready
//! - A fixed-delay gate always waits the full delay
//! - No configured wait exceeds [`MAX_WAIT`]

mod error;
mod gate;
mod policy;
mod probe;
mod wait;

pub use error::ReadinessError;
pub use gate::{ReadinessGate, ReadinessOutcome};
pub use policy::{ReadinessPolicy, MAX_WAIT};
pub use probe::{HttpProbe, Probe, ProbeStatus, TcpProbe};
pub use wait::wait_until_ready;
