//! Multi step forward prediction with the identified model.
//!
//! The horizon is counted in milliseconds of the recording (one torque row per
//! millisecond). Integration runs with a step of `max(horizon / 10, 1)` ms, applying
//! the torque row at the start of each step, so a horizon of 20 takes 10 steps of
//! 2 ms and a horizon of 1 takes a single 1 ms step.

use ndarray::{concatenate, s, Array2, ArrayView2, Axis};

use crate::dynamics_traits::{Joints, RigidBodyDynamics};
use crate::error::{Result, SysIdError};
use crate::robot::Robot;
use crate::utils::row_to_joints;

/// State at the end of the horizon and the torque applied last.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictedState {
    pub angles: Joints,
    pub velocities: Joints,
    pub torque: Joints,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Predictor {
    horizon: usize,
}

impl Predictor {
    pub fn new(horizon: usize) -> Result<Self> {
        if horizon == 0 {
            return Err(SysIdError::InvalidArgument("prediction horizon must be at least 1".into()));
        }
        Ok(Predictor { horizon })
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Integration step in milliseconds.
    pub fn step_ms(&self) -> usize {
        (self.horizon / 10).max(1)
    }

    /// Number of integration steps (and dynamics evaluations) per prediction.
    pub fn steps(&self) -> usize {
        self.horizon.div_ceil(self.step_ms())
    }

    /// Predicts the state after the horizon, starting from (q, v) and applying the last
    /// row of `action_history` followed by the `horizon - 1` rows of `action_future`.
    pub fn predict<'a, M: RigidBodyDynamics>(
        &self,
        robot: &Robot<M>,
        q: &Joints,
        v: &Joints,
        action_history: ArrayView2<'a, f64>,
        action_future: Option<ArrayView2<'a, f64>>,
    ) -> Result<PredictedState> {
        let dof = robot.dof();
        let history = action_history.nrows();
        if history == 0 {
            return Err(SysIdError::InvalidArgument("action history is empty".into()));
        }
        if action_history.ncols() != dof {
            return Err(SysIdError::shape("action history", &[history, dof], &[history, action_history.ncols()]));
        }

        let present = action_history.slice_move(s![history - 1.., ..]);
        let torques = match action_future {
            Some(future) => {
                let expected = [self.horizon - 1, dof];
                if future.dim() != (expected[0], expected[1]) {
                    return Err(SysIdError::shape("future actions", &expected, future.shape()));
                }
                concatenate(Axis(0), &[present, future])
                    .map_err(|e| SysIdError::InvalidArgument(format!("cannot join actions: {}", e)))?
            }
            None if self.horizon == 1 => present.to_owned(),
            None => {
                return Err(SysIdError::UnsupportedConfiguration(format!(
                    "a horizon of {} needs {} future actions",
                    self.horizon,
                    self.horizon - 1
                )));
            }
        };

        let (angles, velocities) = self.rollout(robot, q, v, &torques)?;
        Ok(PredictedState {
            angles,
            velocities,
            torque: row_to_joints(torques.row(self.horizon - 1)),
        })
    }

    /// Integrates (q, v) over the horizon with one torque row per millisecond.
    pub fn rollout<M: RigidBodyDynamics>(
        &self,
        robot: &Robot<M>,
        q: &Joints,
        v: &Joints,
        torques: &Array2<f64>,
    ) -> Result<(Joints, Joints)> {
        if torques.nrows() != self.horizon {
            return Err(SysIdError::shape(
                "torque sequence",
                &[self.horizon, robot.dof()],
                torques.shape(),
            ));
        }
        let step = self.step_ms();
        let dt = step as f64 / 1000.0;
        let mut q = q.clone();
        let mut v = v.clone();
        for t in (0..self.horizon).step_by(step) {
            (q, v) = robot.step(&q, &v, &row_to_joints(torques.row(t)), dt)?;
        }
        Ok((q, v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::ChainParameters;
    use crate::serial_chain::SerialChain;
    use approx::assert_relative_eq;
    use nalgebra::DVector;
    use ndarray::array;

    fn robot() -> Robot<SerialChain> {
        Robot::from_parameters(&ChainParameters::manipulator_3dof()).unwrap()
    }

    fn joints(values: &[f64]) -> Joints {
        DVector::from_row_slice(values)
    }

    #[test]
    fn test_step_sizes() {
        let cases = [(1, 1, 1), (9, 1, 9), (10, 1, 10), (20, 2, 10), (25, 2, 13), (100, 10, 10)];
        for (horizon, step, steps) in cases {
            let predictor = Predictor::new(horizon).unwrap();
            assert_eq!(predictor.step_ms(), step, "horizon {}", horizon);
            assert_eq!(predictor.steps(), steps, "horizon {}", horizon);
        }
        assert!(Predictor::new(0).is_err());
    }

    #[test]
    fn test_horizon_one_is_single_step() {
        let robot = robot();
        let q = joints(&[0.1, 0.2, -0.3]);
        let v = joints(&[0.5, -0.5, 0.0]);
        let history = array![[9.0, 9.0, 9.0], [0.01, 0.02, 0.03]];
        let predicted = Predictor::new(1)
            .unwrap()
            .predict(&robot, &q, &v, history.view(), None)
            .unwrap();

        let tau = joints(&[0.01, 0.02, 0.03]);
        let (q1, v1) = robot.step(&q, &v, &tau, 0.001).unwrap();
        assert_eq!(predicted.angles, q1);
        assert_eq!(predicted.velocities, v1);
        assert_eq!(predicted.torque, tau);
    }

    #[test]
    fn test_horizon_twenty_uses_every_second_torque() {
        let robot = robot();
        let q = joints(&[0.0, 0.4, 0.4]);
        let v = joints(&[0.0, 0.0, 0.0]);
        let history = array![[0.0, 0.05, 0.01]];
        let future = Array2::from_shape_fn((19, 3), |(t, j)| 0.001 * (t + 1) as f64 * (j as f64 - 1.0));
        let predictor = Predictor::new(20).unwrap();
        let predicted = predictor
            .predict(&robot, &q, &v, history.view(), Some(future.view()))
            .unwrap();

        let (mut q_ref, mut v_ref) = (q.clone(), v.clone());
        for t in (0..20).step_by(2) {
            let tau = if t == 0 {
                joints(&[0.0, 0.05, 0.01])
            } else {
                row_to_joints(future.row(t - 1))
            };
            (q_ref, v_ref) = robot.step(&q_ref, &v_ref, &tau, 0.002).unwrap();
        }
        assert_relative_eq!(predicted.angles, q_ref, epsilon = 1e-15);
        assert_relative_eq!(predicted.velocities, v_ref, epsilon = 1e-15);
        assert_eq!(predicted.torque, row_to_joints(future.row(18)));
    }

    #[test]
    fn test_future_views_from_separate_batches() {
        // History and future borrowed from different arrays, one run picked out of each.
        let robot = robot();
        let q = joints(&[0.2, -0.1, 0.3]);
        let v = joints(&[0.0, 0.1, 0.0]);
        let history = ndarray::Array3::from_shape_fn((2, 3, 3), |(i, t, j)| 0.01 * (i + t + j) as f64);
        let future = ndarray::Array3::from_shape_fn((2, 1, 3), |(i, _, j)| -0.02 * (i + j) as f64);
        let predictor = Predictor::new(2).unwrap();

        let predicted = predictor
            .predict(
                &robot,
                &q,
                &v,
                history.index_axis(Axis(0), 1),
                Some(future.index_axis(Axis(0), 1)),
            )
            .unwrap();

        let present = row_to_joints(history.index_axis(Axis(0), 1).row(2));
        let (q1, v1) = robot.step(&q, &v, &present, 0.001).unwrap();
        let last = row_to_joints(future.index_axis(Axis(0), 1).row(0));
        let (q2, v2) = robot.step(&q1, &v1, &last, 0.001).unwrap();
        assert_relative_eq!(predicted.angles, q2, epsilon = 1e-15);
        assert_relative_eq!(predicted.velocities, v2, epsilon = 1e-15);
        assert_eq!(predicted.torque, last);
    }

    #[test]
    fn test_missing_or_wrong_future_rejected() {
        let robot = robot();
        let q = joints(&[0.0; 3]);
        let history = array![[0.0, 0.0, 0.0]];
        let predictor = Predictor::new(3).unwrap();
        assert!(matches!(
            predictor.predict(&robot, &q, &q, history.view(), None),
            Err(SysIdError::UnsupportedConfiguration(_))
        ));
        let short = Array2::zeros((1, 3));
        assert!(matches!(
            predictor.predict(&robot, &q, &q, history.view(), Some(short.view())),
            Err(SysIdError::ShapeMismatch { .. })
        ));
        let empty = Array2::<f64>::zeros((0, 3));
        assert!(Predictor::new(1).unwrap().predict(&robot, &q, &q, empty.view(), None).is_err());
    }
}
