extern crate nalgebra as na;

use na::{DMatrix, DVector};
use crate::error::Result;

/// Joint-space vector (angles, velocities, accelerations or torques), one entry per DOF.
pub type Joints = DVector<f64>;

/// Number of dynamic parameters per link: mass, first moment of mass (3) and the
/// six independent components of the inertia tensor.
pub const LINK_PARAMETERS: usize = 10;

/// Number of identified parameters per joint: the link's dynamic parameters plus
/// viscous and static friction.
pub const JOINT_PARAMETERS: usize = LINK_PARAMETERS + 2;

/// Rigid body dynamics of an articulated chain, without joint friction.
///
/// This is the contract the identification relies on. All methods must be
/// deterministic and must not depend on any state other than the current
/// parameter vector.
pub trait RigidBodyDynamics: Send + Sync {
    /// Number of actuated joints.
    fn dof(&self) -> usize;

    /// Joint accelerations produced by the joint-level torque `tau` at (q, v).
    fn forward_dynamics(&self, q: &Joints, v: &Joints, tau: &Joints) -> Result<Joints>;

    /// Joint-level torque required to achieve the accelerations `a` at (q, v).
    fn inverse_dynamics(&self, q: &Joints, v: &Joints, a: &Joints) -> Joints;

    /// Matrix `Y` (dof x 10·dof) with `inverse_dynamics(q, v, a) = Y · dynamic_parameters()`.
    fn regressor_matrix(&self, q: &Joints, v: &Joints, a: &Joints) -> DMatrix<f64>;

    /// Per-link dynamic parameters, concatenated in joint order (10·dof values).
    fn dynamic_parameters(&self) -> DVector<f64>;

    /// Writes per-link dynamic parameters back into the model.
    fn set_dynamic_parameters(&mut self, theta: &DVector<f64>) -> Result<()>;
}
