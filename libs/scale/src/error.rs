//! Error types for scale parsing and validation.

use thiserror::Error;

/// Errors that can occur when validating deployment parameters.
///
/// Every variant is a configuration error: it is detected before any
/// platform command is issued.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScaleError {
    /// A required parameter was not supplied.
    #[error("missing required parameter: {0}")]
    Missing(&'static str),

    /// The parameter is not an integer.
    #[error("{field} must be an integer, got '{value}'")]
    NotAnInteger { field: &'static str, value: String },

    /// The parameter is negative.
    #[error("{field} must not be negative, got {value}")]
    Negative { field: &'static str, value: i64 },

    /// The parameter must be strictly positive.
    #[error("{field} must be greater than zero, got {value}")]
    NotPositive { field: &'static str, value: i64 },

    /// The parameter does not fit the supported range.
    #[error("{field} is out of range: {value}")]
    OutOfRange { field: &'static str, value: i64 },
}

impl ScaleError {
    /// Name of the offending parameter.
    pub fn field(&self) -> &'static str {
        match self {
            ScaleError::Missing(field) => field,
            ScaleError::NotAnInteger { field, .. }
            | ScaleError::Negative { field, .. }
            | ScaleError::NotPositive { field, .. }
            | ScaleError::OutOfRange { field, .. } => field,
        }
    }
}
