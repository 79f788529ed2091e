//! # fleetup-scale
//!
//! Scale-factor arithmetic and deployment request validation for fleetup.
//!
//! ## Model
//!
//! A deployment is requested in abstract parallelism units (the *scale
//! factor*). Each compute worker process runs a fixed number of threads, so
//! the number of worker processes is:
//!
//! ```text
//! worker_process_count = floor(scale_factor / threads_per_worker)
//! ```
//!
//! ## Invariants
//!
//! - The division truncates; the remainder is discarded, never rounded up
//! - A scale factor below the thread budget resolves to zero workers, and
//!   zero stays zero (it is not coerced to one)
//! - Negative inputs are rejected before anything else happens
//!
//! Examples:
//! - `16 / 4` → 4 workers
//! - `10 / 4` → 2 workers (2 units discarded)
//! - `0 / 4` → 0 workers

mod error;
mod request;
mod topology;

pub use error::ScaleError;
pub use request::{DeploymentRequest, EpochSize, ScaleFactor};
pub use topology::{resolve, ThreadsPerWorker, WorkerTopology, DEFAULT_THREADS_PER_WORKER};
