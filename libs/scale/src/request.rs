//! Deployment request parsing.

use std::fmt;
use std::num::NonZeroU32;

use serde::{Deserialize, Serialize};

use crate::error::ScaleError;
use crate::topology::{ThreadsPerWorker, WorkerTopology};

/// Requested parallelism units. Zero is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct ScaleFactor(u32);

impl ScaleFactor {
    const FIELD: &'static str = "scale_factor";

    /// Validates a raw scale factor.
    pub fn new(value: i64) -> Result<Self, ScaleError> {
        if value < 0 {
            return Err(ScaleError::Negative {
                field: Self::FIELD,
                value,
            });
        }
        u32::try_from(value)
            .map(Self)
            .map_err(|_| ScaleError::OutOfRange {
                field: Self::FIELD,
                value,
            })
    }

    /// Parses a scale factor from a command-line argument.
    pub fn parse(raw: &str) -> Result<Self, ScaleError> {
        Self::new(parse_integer(Self::FIELD, raw)?)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl TryFrom<i64> for ScaleFactor {
    type Error = ScaleError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ScaleFactor> for u32 {
    fn from(value: ScaleFactor) -> Self {
        value.0
    }
}

impl fmt::Display for ScaleFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Build-time sizing parameter of the compute tier. Always positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u32")]
pub struct EpochSize(NonZeroU32);

impl EpochSize {
    const FIELD: &'static str = "epoch_size";

    /// Validates a raw epoch size.
    pub fn new(value: i64) -> Result<Self, ScaleError> {
        if value <= 0 {
            return Err(ScaleError::NotPositive {
                field: Self::FIELD,
                value,
            });
        }
        u32::try_from(value)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or(ScaleError::OutOfRange {
                field: Self::FIELD,
                value,
            })
    }

    /// Parses an epoch size from a command-line argument.
    pub fn parse(raw: &str) -> Result<Self, ScaleError> {
        Self::new(parse_integer(Self::FIELD, raw)?)
    }

    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

impl TryFrom<i64> for EpochSize {
    type Error = ScaleError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EpochSize> for u32 {
    fn from(value: EpochSize) -> Self {
        value.get()
    }
}

impl fmt::Display for EpochSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Parameters supplied once per bootstrap run. Immutable for the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    pub scale_factor: ScaleFactor,
    pub epoch_size: EpochSize,
}

impl DeploymentRequest {
    /// Validates raw integer parameters.
    pub fn new(scale_factor: i64, epoch_size: i64) -> Result<Self, ScaleError> {
        Ok(Self {
            scale_factor: ScaleFactor::new(scale_factor)?,
            epoch_size: EpochSize::new(epoch_size)?,
        })
    }

    /// Parses the two positional arguments, in order.
    pub fn parse(scale_factor: Option<&str>, epoch_size: Option<&str>) -> Result<Self, ScaleError> {
        let scale_factor = scale_factor.ok_or(ScaleError::Missing(ScaleFactor::FIELD))?;
        let epoch_size = epoch_size.ok_or(ScaleError::Missing(EpochSize::FIELD))?;

        Ok(Self {
            scale_factor: ScaleFactor::parse(scale_factor)?,
            epoch_size: EpochSize::parse(epoch_size)?,
        })
    }

    /// Resolves the worker topology for this request.
    pub fn topology(&self, threads_per_worker: ThreadsPerWorker) -> WorkerTopology {
        WorkerTopology::resolve(self.scale_factor, threads_per_worker)
    }
}

fn parse_integer(field: &'static str, raw: &str) -> Result<i64, ScaleError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ScaleError::Missing(field));
    }
    trimmed.parse().map_err(|_| ScaleError::NotAnInteger {
        field,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_request() {
        let request = DeploymentRequest::parse(Some("16"), Some("100")).unwrap();
        assert_eq!(request.scale_factor.get(), 16);
        assert_eq!(request.epoch_size.get(), 100);
        assert_eq!(
            request
                .topology(ThreadsPerWorker::default())
                .worker_process_count,
            4
        );
    }

    #[test]
    fn test_parse_zero_scale_is_valid() {
        let request = DeploymentRequest::parse(Some("0"), Some("10")).unwrap();
        assert!(request.topology(ThreadsPerWorker::default()).is_empty());
    }

    #[test]
    fn test_parse_missing_arguments() {
        assert_eq!(
            DeploymentRequest::parse(None, Some("10")).unwrap_err(),
            ScaleError::Missing("scale_factor")
        );
        assert_eq!(
            DeploymentRequest::parse(Some("4"), None).unwrap_err(),
            ScaleError::Missing("epoch_size")
        );
        assert_eq!(
            DeploymentRequest::parse(Some("  "), Some("10")).unwrap_err(),
            ScaleError::Missing("scale_factor")
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = DeploymentRequest::parse(Some("four"), Some("10")).unwrap_err();
        assert!(matches!(err, ScaleError::NotAnInteger { field: "scale_factor", .. }));

        let err = DeploymentRequest::parse(Some("4"), Some("1.5")).unwrap_err();
        assert!(matches!(err, ScaleError::NotAnInteger { field: "epoch_size", .. }));
    }

    #[test]
    fn test_negative_scale_rejected() {
        let err = DeploymentRequest::parse(Some("-8"), Some("10")).unwrap_err();
        assert_eq!(
            err,
            ScaleError::Negative {
                field: "scale_factor",
                value: -8
            }
        );
    }

    #[test]
    fn test_epoch_size_must_be_positive() {
        assert!(matches!(
            EpochSize::new(0),
            Err(ScaleError::NotPositive { .. })
        ));
        assert!(EpochSize::new(-3).is_err());
        assert!(EpochSize::new(i64::from(u32::MAX) + 1).is_err());
    }

    #[test]
    fn test_request_json_shape() {
        let request = DeploymentRequest::new(12, 50).unwrap();
        let json = serde_json::to_value(request).unwrap();
        assert_eq!(json, serde_json::json!({"scale_factor": 12, "epoch_size": 50}));

        let bad = serde_json::from_value::<DeploymentRequest>(
            serde_json::json!({"scale_factor": -1, "epoch_size": 50}),
        );
        assert!(bad.is_err());
    }
}
