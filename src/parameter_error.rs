//! Error handling for robot and learner description readers

use std::io;
use thiserror::Error;

/// Unified error to report failures while reading YAML descriptions of the robot
/// or of the learner configuration.
#[derive(Debug, Error)]
pub enum ParameterError {
    #[error("IO Error: {0}")]
    IoError(#[from] io::Error),

    #[error("Parse Error: {0}")]
    ParseError(String),

    #[error("Missing Field: {0}")]
    MissingField(String),

    #[error("Invalid Length of {field}: expected {expected}, found {found}")]
    InvalidLength {
        field: String,
        expected: usize,
        found: usize,
    },
}
