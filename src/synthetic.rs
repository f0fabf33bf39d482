//! Synthetic excitation trajectories recorded on a known robot.
//!
//! Each joint follows a commanded acceleration `A·sin(ωt + φ) - kd·v`, turned into
//! torque by the robot's own inverse dynamics at zero velocity so that gravity is
//! compensated. The robot is then integrated with its semi-implicit Euler step, which
//! makes `(v[t+1] - v[t]) / dt` the true acceleration at row `t`.

extern crate nalgebra as na;

use na::DVector;
use ndarray::Array3;
use rand::Rng;
use std::f64::consts::PI;
use tracing::debug;

use crate::dynamics_traits::{Joints, RigidBodyDynamics};
use crate::error::{Result, SysIdError};
use crate::robot::Robot;
use crate::trajectory::TrajectoryBatch;
use crate::utils::is_valid;

#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticExcitation {
    pub samples: usize,
    pub timesteps: usize,
    /// Sampling period in seconds.
    pub timestep: f64,
    /// Peak commanded acceleration per joint (rad/s²), drawn from `[amplitude / 2, amplitude]`.
    pub amplitude: f64,
    /// Angular frequencies (rad/s) are drawn from this range.
    pub frequencies: (f64, f64),
    /// Velocity feedback gain kd (1/s).
    pub damping: f64,
    /// Initial angles are drawn from `[-initial_angle, initial_angle]`.
    pub initial_angle: f64,
}

impl Default for SyntheticExcitation {
    fn default() -> Self {
        SyntheticExcitation {
            samples: 5,
            timesteps: 50,
            timestep: 0.01,
            amplitude: 4.0,
            frequencies: (2.0, 8.0),
            damping: 2.0,
            initial_angle: 1.0,
        }
    }
}

impl SyntheticExcitation {
    /// Records `samples` runs of `timesteps` rows each on `robot`.
    pub fn generate<M: RigidBodyDynamics, R: Rng + ?Sized>(
        &self,
        robot: &Robot<M>,
        rng: &mut R,
    ) -> Result<TrajectoryBatch> {
        if !(self.timestep > 0.0) || !(self.frequencies.0 < self.frequencies.1) || !(self.amplitude > 0.0) {
            return Err(SysIdError::InvalidArgument(format!("invalid excitation {:?}", self)));
        }
        let dof = robot.dof();
        let shape = (self.samples, self.timesteps, dof);
        let mut angles = Array3::zeros(shape);
        let mut velocities = Array3::zeros(shape);
        let mut torques = Array3::zeros(shape);
        let rest = DVector::zeros(dof);

        for sample in 0..self.samples {
            let amplitudes: Joints = DVector::from_fn(dof, |_, _| rng.gen_range(0.5 * self.amplitude..=self.amplitude));
            let omegas: Joints = DVector::from_fn(dof, |_, _| rng.gen_range(self.frequencies.0..self.frequencies.1));
            let phases: Joints = DVector::from_fn(dof, |_, _| rng.gen_range(0.0..2.0 * PI));
            let mut q: Joints = DVector::from_fn(dof, |_, _| rng.gen_range(-self.initial_angle..=self.initial_angle));
            let mut v: Joints = DVector::zeros(dof);

            for t in 0..self.timesteps {
                let time = t as f64 * self.timestep;
                let commanded = DVector::from_fn(dof, |j, _| {
                    amplitudes[j] * (omegas[j] * time + phases[j]).sin() - self.damping * v[j]
                });
                let tau = robot.inverse_dynamics(&q, &rest, &commanded)?;
                for j in 0..dof {
                    angles[[sample, t, j]] = q[j];
                    velocities[[sample, t, j]] = v[j];
                    torques[[sample, t, j]] = tau[j];
                }
                (q, v) = robot.step(&q, &v, &tau, self.timestep)?;
                if !is_valid(&q) || !is_valid(&v) {
                    return Err(SysIdError::InvalidArgument(format!(
                        "excitation diverged in sample {} at step {}",
                        sample, t
                    )));
                }
            }
        }
        debug!("Generated {} x {} synthetic rows for {} joints", self.samples, self.timesteps, dof);
        TrajectoryBatch::new(angles, velocities, torques)
    }
}
