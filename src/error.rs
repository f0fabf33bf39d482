//! Errors of the identification and prediction pipeline.
//!
//! None of these are transient: every variant reflects a configuration, data or
//! implementation problem, so nothing is retried and no partial results are returned.

use std::fmt;
use thiserror::Error;

use crate::parameter_error::ParameterError;

/// Names the internal invariant whose verification failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invariant {
    /// `get_params()` after `set_params(θ)` did not return θ.
    ParameterRoundTrip,
    /// A flattened entry did not match its (sample, timestep) origin.
    FlatteningLinearization,
    /// The fitted parameters do not satisfy `YᵀY θ = YᵀT`.
    NormalEquation,
    /// `Y(q, v, a) θ` disagrees with the inverse dynamics path.
    RegressorConsistency,
    /// A prediction row was never written.
    UnfilledPrediction,
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Invariant::ParameterRoundTrip => "parameter round trip",
            Invariant::FlatteningLinearization => "flattening linearization",
            Invariant::NormalEquation => "normal equation",
            Invariant::RegressorConsistency => "regressor consistency",
            Invariant::UnfilledPrediction => "unfilled prediction row",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum SysIdError {
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),

    #[error("Shape mismatch in {what}: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        what: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    #[error("Consistency violation: {invariant} check failed with residual {residual:e}")]
    ConsistencyViolation { invariant: Invariant, residual: f64 },

    #[error("Trim margin {margin} on both ends leaves nothing of {available} timesteps")]
    DegenerateTrim { available: usize, margin: usize },

    #[error("Singular linear system: {0}")]
    SingularSystem(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Parameter(#[from] ParameterError),
}

impl SysIdError {
    pub(crate) fn shape(what: impl Into<String>, expected: &[usize], found: &[usize]) -> Self {
        SysIdError::ShapeMismatch {
            what: what.into(),
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }

    /// True for the errors that indicate a broken implementation or numerics
    /// rather than bad input.
    pub fn is_consistency_violation(&self) -> bool {
        matches!(self, SysIdError::ConsistencyViolation { .. })
    }
}

pub type Result<T> = std::result::Result<T, SysIdError>;
