//! Rigid body model with joint friction: the model that is identified and then used
//! for prediction.
//!
//! Torques passed in and returned here are actuator torques. Friction is added on
//! the way into the rigid body model and removed on the way out:
//! `joint = actuator + friction_torque(v)`.
//!
//! The full parameter vector is `[link 0 (10), .., link n-1 (10), viscous (n), static (n)]`.

extern crate nalgebra as na;

use na::{DMatrix, DVector};
use ndarray::{Array2, ArrayView2};
use rand::Rng;
use std::f64::consts::PI;
use tracing::{debug, error};

use crate::dynamics_traits::{Joints, RigidBodyDynamics, JOINT_PARAMETERS, LINK_PARAMETERS};
use crate::error::{Invariant, Result, SysIdError};
use crate::friction::FrictionModel;
use crate::parameters::ChainParameters;
use crate::serial_chain::SerialChain;

/// Default tolerance of the `set_params` / `get_params` round trip.
pub const ROUND_TRIP_TOLERANCE: f64 = 1e-9;

/// Tolerance of the regressor self test, relative to the torque magnitude.
const SELF_TEST_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct Robot<M: RigidBodyDynamics> {
    model: M,
    friction: FrictionModel,
}

impl Robot<SerialChain> {
    /// Serial chain with the friction given in the parameters (0.01 viscous and no
    /// static friction where not given).
    pub fn from_parameters(parameters: &ChainParameters) -> Result<Self> {
        parameters.validate()?;
        let model = SerialChain::new(parameters)?;
        let dof = parameters.dof();
        let initial = FrictionModel::initial(dof);
        let viscous = if parameters.viscous_friction.is_empty() {
            initial.viscous
        } else {
            DVector::from_vec(parameters.viscous_friction.clone())
        };
        let static_friction = if parameters.static_friction.is_empty() {
            initial.static_friction
        } else {
            DVector::from_vec(parameters.static_friction.clone())
        };
        Robot::new(model, FrictionModel::new(viscous, static_friction)?)
    }
}

impl<M: RigidBodyDynamics> Robot<M> {
    pub fn new(model: M, friction: FrictionModel) -> Result<Self> {
        if model.dof() != friction.dof() {
            return Err(SysIdError::shape("friction model", &[model.dof()], &[friction.dof()]));
        }
        Ok(Robot { model, friction })
    }

    pub fn dof(&self) -> usize {
        self.model.dof()
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn friction(&self) -> &FrictionModel {
        &self.friction
    }

    /// Length of the full parameter vector, 12 per joint.
    pub fn parameter_count(&self) -> usize {
        JOINT_PARAMETERS * self.dof()
    }

    fn check_joints(&self, what: &str, x: &Joints) -> Result<()> {
        if x.len() != self.dof() {
            return Err(SysIdError::shape(what, &[self.dof()], &[x.len()]));
        }
        Ok(())
    }

    fn check_state(&self, q: &Joints, v: &Joints, third: (&str, &Joints)) -> Result<()> {
        self.check_joints("joint angles", q)?;
        self.check_joints("joint velocities", v)?;
        self.check_joints(third.0, third.1)
    }

    /// Joint accelerations resulting from the actuator torque `tau` at (q, v).
    pub fn forward_dynamics(&self, q: &Joints, v: &Joints, tau: &Joints) -> Result<Joints> {
        self.check_state(q, v, ("torques", tau))?;
        let joint_torque = self.friction.joint_torque(tau, v);
        self.model.forward_dynamics(q, v, &joint_torque)
    }

    /// Actuator torque needed for accelerations `a` at (q, v).
    pub fn inverse_dynamics(&self, q: &Joints, v: &Joints, a: &Joints) -> Result<Joints> {
        self.check_state(q, v, ("accelerations", a))?;
        let joint_torque = self.model.inverse_dynamics(q, v, a);
        Ok(self.friction.actuator_torque(&joint_torque, v))
    }

    /// Friction augmented regressor, dof x 12·dof: `[Y_rigid | diag(v) | diag(sign v)]`.
    pub fn regressor_matrix(&self, q: &Joints, v: &Joints, a: &Joints) -> Result<DMatrix<f64>> {
        self.check_state(q, v, ("accelerations", a))?;
        let dof = self.dof();
        let rigid = self.model.regressor_matrix(q, v, a);
        if rigid.shape() != (dof, LINK_PARAMETERS * dof) {
            return Err(SysIdError::shape(
                "rigid body regressor",
                &[dof, LINK_PARAMETERS * dof],
                &[rigid.nrows(), rigid.ncols()],
            ));
        }
        let mut regressor = DMatrix::zeros(dof, self.parameter_count());
        regressor.columns_mut(0, LINK_PARAMETERS * dof).copy_from(&rigid);
        regressor
            .columns_mut(LINK_PARAMETERS * dof, 2 * dof)
            .copy_from(&FrictionModel::regressor(v));
        Ok(regressor)
    }

    /// Full parameter vector: dynamic parameters of every link, then friction.
    pub fn get_params(&self) -> DVector<f64> {
        let rigid = self.model.dynamic_parameters();
        let friction = self.friction.parameters();
        let mut theta = DVector::zeros(rigid.len() + friction.len());
        theta.rows_mut(0, rigid.len()).copy_from(&rigid);
        theta.rows_mut(rigid.len(), friction.len()).copy_from(&friction);
        theta
    }

    /// Writes the full parameter vector and verifies that reading it back gives the
    /// same values within [`ROUND_TRIP_TOLERANCE`].
    pub fn set_params(&mut self, theta: &DVector<f64>) -> Result<()> {
        self.set_params_with_tolerance(theta, ROUND_TRIP_TOLERANCE)
    }

    /// Like [`Robot::set_params`], with the round trip tolerance relative to
    /// `max(1, ‖θ‖∞)`.
    pub fn set_params_with_tolerance(&mut self, theta: &DVector<f64>, tolerance: f64) -> Result<()> {
        if theta.len() != self.parameter_count() {
            return Err(SysIdError::shape("parameter vector", &[self.parameter_count()], &[theta.len()]));
        }
        let rigid_len = LINK_PARAMETERS * self.dof();
        self.model
            .set_dynamic_parameters(&theta.rows(0, rigid_len).into_owned())?;
        self.friction
            .set_parameters(&theta.rows(rigid_len, theta.len() - rigid_len).into_owned())?;

        let residual = (self.get_params() - theta).amax();
        if !(residual <= tolerance * theta.amax().max(1.0)) {
            error!("Parameters read back differ from written ones by {:e}", residual);
            return Err(SysIdError::ConsistencyViolation {
                invariant: Invariant::ParameterRoundTrip,
                residual,
            });
        }
        Ok(())
    }

    /// One semi-implicit Euler step: velocity first, then angles with the new velocity.
    pub fn step(&self, q: &Joints, v: &Joints, tau: &Joints, dt: f64) -> Result<(Joints, Joints)> {
        let a = self.forward_dynamics(q, v, tau)?;
        let v_next = v + a * dt;
        let q_next = q + &v_next * dt;
        Ok((q_next, v_next))
    }

    /// Open loop rollout of a torque sequence (one row per step). Row `t` of the
    /// returned angles and velocities is the state the torque row `t` is applied at,
    /// so the result has as many rows as `torques`.
    pub fn simulate(
        &self,
        q0: &Joints,
        v0: &Joints,
        torques: ArrayView2<f64>,
        dt: f64,
    ) -> Result<(Array2<f64>, Array2<f64>)> {
        let dof = self.dof();
        if torques.ncols() != dof {
            return Err(SysIdError::shape("torque sequence", &[torques.nrows(), dof], &[torques.nrows(), torques.ncols()]));
        }
        if !(dt > 0.0) {
            return Err(SysIdError::InvalidArgument(format!("time step must be positive, got {}", dt)));
        }

        let steps = torques.nrows();
        let mut angles = Array2::zeros((steps, dof));
        let mut velocities = Array2::zeros((steps, dof));
        let mut q = q0.clone();
        let mut v = v0.clone();
        for (t, row) in torques.outer_iter().enumerate() {
            for j in 0..dof {
                angles[[t, j]] = q[j];
                velocities[[t, j]] = v[j];
            }
            let tau = DVector::from_iterator(dof, row.iter().copied());
            (q, v) = self.step(&q, &v, &tau, dt)?;
        }
        Ok((angles, velocities))
    }

    /// Checks the regressor against the inverse dynamics at random states,
    /// `Y(q, v, a)·θ == inverse_dynamics(q, v, a)`. Returns the worst residual seen.
    pub fn self_test<R: Rng + ?Sized>(&self, rng: &mut R, trials: usize) -> Result<f64> {
        let dof = self.dof();
        let theta = self.get_params();
        let mut worst: f64 = 0.0;
        for _ in 0..trials {
            let q = DVector::from_fn(dof, |_, _| rng.gen_range(-PI..PI));
            let v = DVector::from_fn(dof, |_, _| rng.gen_range(-2.0..2.0));
            let a = DVector::from_fn(dof, |_, _| rng.gen_range(-5.0..5.0));

            let expected = self.inverse_dynamics(&q, &v, &a)?;
            let predicted = self.regressor_matrix(&q, &v, &a)? * &theta;
            let residual = (predicted - &expected).amax();
            if !(residual <= SELF_TEST_TOLERANCE * expected.amax().max(1.0)) {
                error!("Regressor disagrees with inverse dynamics at q = {}", q.transpose());
                return Err(SysIdError::ConsistencyViolation {
                    invariant: Invariant::RegressorConsistency,
                    residual,
                });
            }
            worst = worst.max(residual);
        }
        debug!("Self test passed {} trials, worst residual {:e}", trials, worst);
        Ok(worst)
    }
}
