//! Supports reading robot and learner descriptions from YAML files (optional)

use std::path::Path;
use serde::de::DeserializeOwned;
use serde_saphyr::Options;

use crate::learner::LearnerConfig;
use crate::parameter_error::ParameterError;
use crate::parameters::ChainParameters;

/// YAML extension to parse the deg(angle) function is enabled, handy for `rpy`.
fn parse_yaml<T: DeserializeOwned>(contents: &str) -> Result<T, ParameterError> {
    serde_saphyr::from_str_with_options(
        contents,
        Options { angle_conversions: true, ..Default::default() },
    )
    .map_err(|e| ParameterError::ParseError(format!("{}", e)))
}

impl ChainParameters {
    /// Read the robot description from YAML file. YAML file like this is supported:
    /// ```yaml
    /// gravity: [0.0, 0.0, -9.81]
    /// joints:
    ///   - name: shoulder
    ///     axis: [0, 1, 0]
    ///     mass: 1.0
    ///     com: [0.15, 0, 0]
    ///     inertia: [2.0e-4, 0, 0, 0.0076, 0, 0.0076]
    ///   - name: elbow
    ///     xyz: [0.3, 0, 0]
    ///     rpy: [0, 0, deg(90)]
    ///     axis: [0, 1, 0]
    ///     mass: 0.5
    ///     com: [0.125, 0, 0]
    /// viscous_friction: [0.01, 0.01]
    /// static_friction: [0.0, 0.0]
    /// ```
    /// Only `joints` and each joint's `mass` are required. Inertia follows URDF order
    /// (ixx, ixy, ixz, iyy, iyz, izz) and is taken about the centre of mass.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ParameterError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Same as [`ChainParameters::from_yaml_file`], from a string.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ParameterError> {
        let parameters: ChainParameters = parse_yaml(contents)?;
        parameters.validate()?;
        Ok(parameters)
    }
}

impl LearnerConfig {
    /// Read the learner configuration from YAML file. Every field is optional:
    /// ```yaml
    /// history_length: 1
    /// prediction_horizon: 1
    /// averaging: false
    /// seed: 42
    /// layout:
    ///   angles: { start: 0, end: 3 }
    ///   velocities: { start: 3, end: 6 }
    ///   torques: { start: 6, end: 9 }
    /// preprocess:
    ///   desired_sample_count: 1000
    ///   smoothing_sigma: 1.0
    ///   trim_margin: 1000
    ///   timestep: 0.001
    /// estimator:
    ///   regularization_epsilon: 1.0e-12
    ///   regularization_mu: 1.0e-6
    /// ```
    /// Unsupported values (averaging, horizon other than 1) are accepted here and
    /// rejected when the learner is constructed.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ParameterError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Same as [`LearnerConfig::from_yaml_file`], from a string.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ParameterError> {
        parse_yaml(contents)
    }
}
