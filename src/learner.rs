//! Learner interface for comparing dynamics models in a common harness, and its
//! system identification implementation.
//!
//! Observations are rows of `[angles, velocities, measured torques]` laid out as
//! declared by [`ChannelLayout`]; actions are commanded torques. Measured torques
//! are ignored while learning, predictions carry the last applied torque in their
//! place.

use std::ops::Range;

use ndarray::{s, Array2, Array3, ArrayView3, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::dynamics_traits::RigidBodyDynamics;
use crate::error::{Invariant, Result, SysIdError};
use crate::estimator::{EstimatorConfig, FitReport, ParameterEstimator};
use crate::predictor::{PredictedState, Predictor};
use crate::preprocess::{DataPreprocessor, PreprocessConfig};
use crate::robot::Robot;
use crate::trajectory::TrajectoryBatch;
use crate::utils::{joints_to_row, map_samples, row_to_joints};

/// A model of the robot dynamics that can be trained on recorded sequences and then
/// predict the state a given number of milliseconds ahead.
pub trait DynamicsLearner {
    /// Trains on observation sequences `[sample, time, observation]` and the
    /// commanded actions `[sample, time, action]` recorded alongside them.
    fn learn(&mut self, observations: ArrayView3<f64>, actions: ArrayView3<f64>) -> Result<()>;

    /// Predicts one observation row per sample from the observation and action
    /// histories and, for horizons above 1, the `horizon - 1` future actions.
    fn predict(
        &self,
        observation_history: ArrayView3<f64>,
        action_history: ArrayView3<f64>,
        action_future: Option<ArrayView3<f64>>,
    ) -> Result<Array2<f64>>;

    /// Stable identifier of the learner variant.
    fn name(&self) -> &str;
}

/// Column ranges of the observation vector.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChannelLayout {
    pub angles: Range<usize>,
    pub velocities: Range<usize>,
    pub torques: Range<usize>,
}

impl ChannelLayout {
    /// Angles, then velocities, then torques, `dof` columns each.
    pub fn standard(dof: usize) -> Self {
        ChannelLayout {
            angles: 0..dof,
            velocities: dof..2 * dof,
            torques: 2 * dof..3 * dof,
        }
    }

    pub fn observation_dim(&self) -> usize {
        self.angles.end.max(self.velocities.end).max(self.torques.end)
    }

    /// Observation sequences `[sample, time, observation]` holding the angles,
    /// velocities and torques of the batch in this layout.
    pub fn pack(&self, batch: &TrajectoryBatch) -> Result<Array3<f64>> {
        self.validate(batch.dof())?;
        let (samples, time, _) = batch.angles().dim();
        let mut observations = Array3::zeros((samples, time, self.observation_dim()));
        observations.slice_mut(s![.., .., self.angles.clone()]).assign(batch.angles());
        observations.slice_mut(s![.., .., self.velocities.clone()]).assign(batch.velocities());
        observations.slice_mut(s![.., .., self.torques.clone()]).assign(batch.torques());
        Ok(observations)
    }

    fn channels(&self) -> [(&'static str, &Range<usize>); 3] {
        [
            ("angles", &self.angles),
            ("velocities", &self.velocities),
            ("torques", &self.torques),
        ]
    }

    /// Every channel must be `dof` columns wide and together they must cover every
    /// observation column exactly once, so a prediction row is always fully written.
    pub fn validate(&self, dof: usize) -> Result<()> {
        let mut covered = vec![false; self.observation_dim()];
        for (name, range) in self.channels() {
            if range.len() != dof {
                return Err(SysIdError::InvalidArgument(format!(
                    "{} channel {:?} must have {} columns",
                    name, range, dof
                )));
            }
            for column in range.clone() {
                if covered[column] {
                    return Err(SysIdError::InvalidArgument(format!(
                        "{} channel {:?} overlaps another channel at column {}",
                        name, range, column
                    )));
                }
                covered[column] = true;
            }
        }
        if let Some(column) = covered.iter().position(|c| !c) {
            return Err(SysIdError::InvalidArgument(format!(
                "observation column {} belongs to no channel",
                column
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    /// Timesteps of context the harness provides; only the latest is used.
    pub history_length: usize,
    /// Milliseconds to predict ahead. Only 1 is supported.
    pub prediction_horizon: usize,
    /// Averaging of multi step predictions. Not supported.
    pub averaging: bool,
    /// Observation layout; the standard layout for the robot's DOF if not given.
    pub layout: Option<ChannelLayout>,
    pub preprocess: PreprocessConfig,
    pub estimator: EstimatorConfig,
    /// Seed of the self test draws and of the training subset.
    pub seed: u64,
    /// Random states checked by the regressor self test before learning.
    pub self_test_trials: usize,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        LearnerConfig {
            history_length: 1,
            prediction_horizon: 1,
            averaging: false,
            layout: None,
            preprocess: PreprocessConfig::default(),
            estimator: EstimatorConfig::default(),
            seed: 0,
            self_test_trials: 10,
        }
    }
}

/// Collects prediction rows and only hands out the result once every row is written.
struct PredictionBuilder {
    rows: Array2<f64>,
    written: Vec<bool>,
}

impl PredictionBuilder {
    fn new(samples: usize, observation_dim: usize) -> Self {
        PredictionBuilder {
            rows: Array2::zeros((samples, observation_dim)),
            written: vec![false; samples],
        }
    }

    fn set(&mut self, sample: usize, layout: &ChannelLayout, state: &PredictedState) {
        let mut row = self.rows.row_mut(sample);
        joints_to_row(&state.angles, row.slice_mut(s![layout.angles.clone()]));
        joints_to_row(&state.velocities, row.slice_mut(s![layout.velocities.clone()]));
        joints_to_row(&state.torque, row.slice_mut(s![layout.torques.clone()]));
        self.written[sample] = true;
    }

    fn finish(self) -> Result<Array2<f64>> {
        let unfilled = self.written.iter().filter(|w| !**w).count();
        if unfilled > 0 {
            error!("{} prediction rows were never written", unfilled);
            return Err(SysIdError::ConsistencyViolation {
                invariant: Invariant::UnfilledPrediction,
                residual: unfilled as f64,
            });
        }
        Ok(self.rows)
    }
}

/// Identifies the inertial and friction parameters of the robot and predicts by
/// integrating the identified model.
#[derive(Debug, Clone)]
pub struct SystemIdLearner<M: RigidBodyDynamics> {
    robot: Robot<M>,
    config: LearnerConfig,
    layout: ChannelLayout,
    preprocessor: DataPreprocessor,
    estimator: ParameterEstimator,
    predictor: Predictor,
    report: Option<FitReport>,
}

impl<M: RigidBodyDynamics> SystemIdLearner<M> {
    pub fn new(robot: Robot<M>, config: LearnerConfig) -> Result<Self> {
        if config.averaging {
            return Err(SysIdError::UnsupportedConfiguration(
                "averaging of predictions is not implemented".into(),
            ));
        }
        if config.prediction_horizon != 1 {
            return Err(SysIdError::UnsupportedConfiguration(format!(
                "prediction horizon {} is not implemented, only 1 is",
                config.prediction_horizon
            )));
        }
        if config.history_length == 0 {
            return Err(SysIdError::InvalidArgument("history length must be at least 1".into()));
        }

        let layout = config
            .layout
            .clone()
            .unwrap_or_else(|| ChannelLayout::standard(robot.dof()));
        layout.validate(robot.dof())?;

        Ok(SystemIdLearner {
            preprocessor: DataPreprocessor::new(config.preprocess.clone())?,
            estimator: ParameterEstimator::new(config.estimator.clone())?,
            predictor: Predictor::new(config.prediction_horizon)?,
            robot,
            config,
            layout,
            report: None,
        })
    }

    pub fn robot(&self) -> &Robot<M> {
        &self.robot
    }

    pub fn config(&self) -> &LearnerConfig {
        &self.config
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    /// Report of the last successful `learn`.
    pub fn fit_report(&self) -> Option<&FitReport> {
        self.report.as_ref()
    }

    fn check_observations(&self, what: &str, observations: &ArrayView3<f64>) -> Result<()> {
        let (samples, time, dim) = observations.dim();
        let expected = self.layout.observation_dim();
        if dim != expected {
            return Err(SysIdError::shape(what, &[samples, time, expected], &[samples, time, dim]));
        }
        Ok(())
    }

    fn check_actions(&self, what: &str, actions: &ArrayView3<f64>, samples: usize, time: usize) -> Result<()> {
        let expected = [samples, time, self.robot.dof()];
        if actions.shape() != expected {
            return Err(SysIdError::shape(what, &expected, actions.shape()));
        }
        Ok(())
    }

    fn learn_batch(&mut self, observations: ArrayView3<f64>, actions: ArrayView3<f64>) -> Result<FitReport> {
        self.check_observations("observations", &observations)?;
        let (samples, time, _) = observations.dim();
        self.check_actions("actions", &actions, samples, time)?;

        let batch = TrajectoryBatch::with_dof(
            observations.slice(s![.., .., self.layout.angles.clone()]).to_owned(),
            observations.slice(s![.., .., self.layout.velocities.clone()]).to_owned(),
            actions.to_owned(),
            self.robot.dof(),
        )?;

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        self.robot.self_test(&mut rng, self.config.self_test_trials)?;
        let training = self.preprocessor.preprocess(&batch, &mut rng)?;
        self.estimator.fit(&mut self.robot, &training)
    }
}

impl<M: RigidBodyDynamics> DynamicsLearner for SystemIdLearner<M> {
    fn learn(&mut self, observations: ArrayView3<f64>, actions: ArrayView3<f64>) -> Result<()> {
        info!(
            "Learning from {} sequences of {} timesteps",
            observations.len_of(Axis(0)),
            observations.len_of(Axis(1))
        );
        let report = self.learn_batch(observations, actions).inspect_err(|e| {
            if e.is_consistency_violation() {
                error!("Learning aborted: {}", e);
            }
        })?;
        info!("Learning finished, torque RMS {:e}", report.torque_rms);
        self.report = Some(report);
        Ok(())
    }

    fn predict(
        &self,
        observation_history: ArrayView3<f64>,
        action_history: ArrayView3<f64>,
        action_future: Option<ArrayView3<f64>>,
    ) -> Result<Array2<f64>> {
        self.check_observations("observation history", &observation_history)?;
        let (samples, history, _) = observation_history.dim();
        if history == 0 {
            return Err(SysIdError::InvalidArgument("observation history is empty".into()));
        }
        self.check_actions("action history", &action_history, samples, action_history.len_of(Axis(1)))?;
        if let Some(future) = &action_future {
            let horizon = self.predictor.horizon();
            self.check_actions("future actions", future, samples, horizon - 1)?;
        }
        debug!("Predicting {} samples from {} timesteps of history", samples, history);

        let layout = &self.layout;
        let states = map_samples(samples, |i| {
            let latest = observation_history.slice(s![i, history - 1, ..]);
            let q = row_to_joints(latest.slice(s![layout.angles.clone()]));
            let v = row_to_joints(latest.slice(s![layout.velocities.clone()]));
            self.predictor.predict(
                &self.robot,
                &q,
                &v,
                action_history.index_axis(Axis(0), i),
                action_future.as_ref().map(|f| f.index_axis(Axis(0), i)),
            )
        });

        let mut builder = PredictionBuilder::new(samples, layout.observation_dim());
        for (i, state) in states.into_iter().enumerate() {
            builder.set(i, layout, &state?);
        }
        builder.finish()
    }

    fn name(&self) -> &str {
        "system_id"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ChainParameters;
    use crate::serial_chain::SerialChain;

    fn robot() -> Robot<SerialChain> {
        Robot::from_parameters(&ChainParameters::manipulator_3dof()).unwrap()
    }

    #[test]
    fn test_unsupported_configurations_rejected() {
        let averaging = LearnerConfig {
            averaging: true,
            ..Default::default()
        };
        assert!(matches!(
            SystemIdLearner::new(robot(), averaging),
            Err(SysIdError::UnsupportedConfiguration(_))
        ));
        let horizon = LearnerConfig {
            prediction_horizon: 2,
            ..Default::default()
        };
        assert!(matches!(
            SystemIdLearner::new(robot(), horizon),
            Err(SysIdError::UnsupportedConfiguration(_))
        ));
    }

    #[test]
    fn test_name() {
        let learner = SystemIdLearner::new(robot(), LearnerConfig::default()).unwrap();
        assert_eq!(learner.name(), "system_id");
        assert_eq!(learner.layout(), &ChannelLayout::standard(3));
        assert!(learner.fit_report().is_none());
    }

    #[test]
    fn test_layout_validation() {
        assert!(ChannelLayout::standard(3).validate(3).is_ok());
        assert_eq!(ChannelLayout::standard(3).observation_dim(), 9);
        assert!(ChannelLayout::standard(2).validate(3).is_err());

        let swapped = ChannelLayout {
            angles: 3..6,
            velocities: 0..3,
            torques: 6..9,
        };
        assert!(swapped.validate(3).is_ok());

        let overlapping = ChannelLayout {
            angles: 0..3,
            velocities: 2..5,
            torques: 6..9,
        };
        assert!(overlapping.validate(3).is_err());

        let gap = ChannelLayout {
            angles: 0..3,
            velocities: 3..6,
            torques: 7..10,
        };
        assert!(gap.validate(3).is_err());

        let config = LearnerConfig {
            layout: Some(gap),
            ..Default::default()
        };
        assert!(matches!(
            SystemIdLearner::new(robot(), config),
            Err(SysIdError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_prediction_builder_requires_every_row() {
        let layout = ChannelLayout::standard(1);
        let state = PredictedState {
            angles: nalgebra::DVector::from_element(1, 1.0),
            velocities: nalgebra::DVector::from_element(1, 2.0),
            torque: nalgebra::DVector::from_element(1, 3.0),
        };
        let mut builder = PredictionBuilder::new(3, 3);
        builder.set(0, &layout, &state);
        builder.set(2, &layout, &state);
        match builder.finish() {
            Err(SysIdError::ConsistencyViolation { invariant, residual }) => {
                assert_eq!(invariant, Invariant::UnfilledPrediction);
                assert_eq!(residual, 1.0);
            }
            other => panic!("Expected UnfilledPrediction, got {:?}", other),
        }

        let mut builder = PredictionBuilder::new(1, 3);
        builder.set(0, &layout, &state);
        assert_eq!(builder.finish().unwrap(), ndarray::array![[1.0, 2.0, 3.0]]);
    }

    #[test]
    fn test_predict_writes_layout_columns() {
        let learner = SystemIdLearner::new(robot(), LearnerConfig::default()).unwrap();
        let observations = Array3::from_shape_fn((2, 3, 9), |(s, _, c)| 0.1 * (s + c) as f64);
        let actions = Array3::from_shape_fn((2, 3, 3), |(s, t, j)| 0.01 * (s + t + j) as f64);
        let predicted = learner.predict(observations.view(), actions.view(), None).unwrap();
        assert_eq!(predicted.dim(), (2, 9));
        for s in 0..2 {
            // Torque slot carries the last applied action.
            for j in 0..3 {
                assert_eq!(predicted[[s, 6 + j]], actions[[s, 2, j]]);
            }
            assert!(predicted.row(s).iter().all(|x| x.is_finite()));
        }
    }

    #[test]
    fn test_predict_with_velocities_first() {
        let swapped = ChannelLayout {
            angles: 3..6,
            velocities: 0..3,
            torques: 6..9,
        };
        let config = LearnerConfig {
            layout: Some(swapped.clone()),
            ..Default::default()
        };
        let robot = robot();
        let learner = SystemIdLearner::new(robot.clone(), config).unwrap();
        let observations = Array3::from_shape_fn((2, 2, 9), |(s, t, c)| 0.05 * (s + t) as f64 + 0.01 * c as f64);
        let actions = Array3::from_shape_fn((2, 2, 3), |(s, t, j)| 0.02 * (s + t + j) as f64);
        let predicted = learner.predict(observations.view(), actions.view(), None).unwrap();

        for s in 0..2 {
            let latest = observations.slice(s![s, 1, ..]);
            let q = row_to_joints(latest.slice(s![3..6]));
            let v = row_to_joints(latest.slice(s![0..3]));
            let tau = row_to_joints(actions.slice(s![s, 1, ..]));
            let (q1, v1) = robot.step(&q, &v, &tau, 0.001).unwrap();
            let row = predicted.row(s);
            assert_eq!(row_to_joints(row.slice(s![swapped.angles.clone()])), q1);
            assert_eq!(row_to_joints(row.slice(s![swapped.velocities.clone()])), v1);
            assert_eq!(row_to_joints(row.slice(s![swapped.torques.clone()])), tau);
        }
    }

    #[test]
    fn test_mismatched_shapes_rejected() {
        let mut learner = SystemIdLearner::new(robot(), LearnerConfig::default()).unwrap();
        let observations = Array3::zeros((2, 30, 8));
        let actions = Array3::zeros((2, 30, 3));
        assert!(matches!(
            learner.learn(observations.view(), actions.view()),
            Err(SysIdError::ShapeMismatch { .. })
        ));
        let observations = Array3::zeros((2, 30, 9));
        let actions = Array3::zeros((2, 29, 3));
        assert!(matches!(
            learner.learn(observations.view(), actions.view()),
            Err(SysIdError::ShapeMismatch { .. })
        ));
        let future = Array3::zeros((2, 1, 3));
        assert!(learner
            .predict(observations.view(), actions.view(), Some(future.view()))
            .is_err());
    }
}
