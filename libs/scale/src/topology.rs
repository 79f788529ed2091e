//! Worker topology resolution.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::ScaleError;
use crate::request::ScaleFactor;

/// Threads each worker process runs when nothing else is configured.
pub const DEFAULT_THREADS_PER_WORKER: u32 = 4;

/// Per-worker thread budget. Always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct ThreadsPerWorker(NonZeroU32);

impl ThreadsPerWorker {
    /// Validates a raw thread budget.
    pub fn new(value: i64) -> Result<Self, ScaleError> {
        const FIELD: &str = "threads_per_worker";

        if value <= 0 {
            return Err(ScaleError::NotPositive {
                field: FIELD,
                value,
            });
        }
        let value = u32::try_from(value).map_err(|_| ScaleError::OutOfRange {
            field: FIELD,
            value,
        })?;

        // value > 0 was checked above
        NonZeroU32::new(value)
            .map(Self)
            .ok_or(ScaleError::NotPositive {
                field: FIELD,
                value: 0,
            })
    }

    /// Returns the budget as a plain integer.
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl Default for ThreadsPerWorker {
    fn default() -> Self {
        Self(NonZeroU32::MIN.saturating_add(DEFAULT_THREADS_PER_WORKER - 1))
    }
}

impl TryFrom<i64> for ThreadsPerWorker {
    type Error = ScaleError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ThreadsPerWorker> for u32 {
    fn from(value: ThreadsPerWorker) -> Self {
        value.get()
    }
}

impl fmt::Display for ThreadsPerWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolves a raw scale factor into a worker-process count.
///
/// Floor division. The remainder is dropped on purpose; callers that care
/// about the discarded capacity use [`WorkerTopology::truncated_units`].
pub fn resolve(scale_factor: i64, threads_per_worker: i64) -> Result<u32, ScaleError> {
    let scale_factor = ScaleFactor::new(scale_factor)?;
    let threads_per_worker = ThreadsPerWorker::new(threads_per_worker)?;
    Ok(WorkerTopology::resolve(scale_factor, threads_per_worker).worker_process_count)
}

/// Worker fleet shape derived from a scale factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerTopology {
    /// Requested parallelism units.
    pub scale_factor: u32,

    /// Threads each worker process runs.
    pub threads_per_worker: u32,

    /// Number of identical worker replicas to request from the platform.
    pub worker_process_count: u32,
}

impl WorkerTopology {
    /// Computes the topology for a validated scale factor.
    pub fn resolve(scale_factor: ScaleFactor, threads_per_worker: ThreadsPerWorker) -> Self {
        Self {
            scale_factor: scale_factor.get(),
            threads_per_worker: threads_per_worker.get(),
            worker_process_count: scale_factor.get() / threads_per_worker.get(),
        }
    }

    /// Returns true if no worker processes will be launched.
    pub fn is_empty(&self) -> bool {
        self.worker_process_count == 0
    }

    /// Parallelism units dropped by the floor division.
    pub fn truncated_units(&self) -> u32 {
        self.scale_factor % self.threads_per_worker
    }

    /// Total worker threads that will actually run.
    pub fn effective_threads(&self) -> u32 {
        self.worker_process_count * self.threads_per_worker
    }
}

impl fmt::Display for WorkerTopology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} worker(s) x {} thread(s) for scale factor {}",
            self.worker_process_count, self.threads_per_worker, self.scale_factor
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case::even_split(16, 4, 4)]
    #[case::remainder_truncated(10, 4, 2)]
    #[case::zero(0, 4, 0)]
    #[case::just_below_budget(3, 4, 0)]
    #[case::exact_budget(4, 4, 1)]
    #[case::single_thread_workers(7, 1, 7)]
    fn test_resolve_cases(#[case] scale: i64, #[case] threads: i64, #[case] expected: u32) {
        assert_eq!(resolve(scale, threads).unwrap(), expected);
    }

    #[test]
    fn test_resolve_negative_scale_rejected() {
        let err = resolve(-1, 4).unwrap_err();
        assert_eq!(
            err,
            ScaleError::Negative {
                field: "scale_factor",
                value: -1
            }
        );
    }

    #[test]
    fn test_resolve_zero_threads_rejected() {
        let err = resolve(8, 0).unwrap_err();
        assert_eq!(err.field(), "threads_per_worker");
        assert!(resolve(8, -2).is_err());
    }

    #[test]
    fn test_default_threads_per_worker() {
        assert_eq!(ThreadsPerWorker::default().get(), DEFAULT_THREADS_PER_WORKER);
    }

    #[test]
    fn test_topology_reports_truncation() {
        let topology = WorkerTopology::resolve(
            ScaleFactor::new(10).unwrap(),
            ThreadsPerWorker::new(4).unwrap(),
        );
        assert_eq!(topology.worker_process_count, 2);
        assert_eq!(topology.truncated_units(), 2);
        assert_eq!(topology.effective_threads(), 8);
        assert!(!topology.is_empty());
    }

    #[test]
    fn test_zero_topology_is_empty() {
        let topology =
            WorkerTopology::resolve(ScaleFactor::new(0).unwrap(), ThreadsPerWorker::default());
        assert!(topology.is_empty());
        assert_eq!(topology.truncated_units(), 0);
    }

    #[test]
    fn test_threads_per_worker_deserialize_validates() {
        let parsed: ThreadsPerWorker = serde_json::from_str("8").unwrap();
        assert_eq!(parsed.get(), 8);
        assert!(serde_json::from_str::<ThreadsPerWorker>("0").is_err());
    }

    proptest! {
        #[test]
        fn prop_resolve_is_floor_division(s in 0i64..=i64::from(u32::MAX), t in 1i64..=1024) {
            let expected = u32::try_from(s / t).unwrap();
            prop_assert_eq!(resolve(s, t).unwrap(), expected);
        }

        #[test]
        fn prop_below_budget_resolves_to_zero(t in 1i64..=1024) {
            prop_assert_eq!(resolve(0, t).unwrap(), 0);
            prop_assert_eq!(resolve(t - 1, t).unwrap(), 0);
        }

        #[test]
        fn prop_negative_scale_is_invalid(s in i64::MIN..0, t in 1i64..=1024) {
            let is_negative = matches!(resolve(s, t), Err(ScaleError::Negative { .. }));
            prop_assert!(is_negative);
        }
    }
}
