//! Joint friction: viscous (linear in velocity) and static/Coulomb (sign of velocity).

extern crate nalgebra as na;

use na::{DMatrix, DVector};

use crate::dynamics_traits::Joints;
use crate::error::{Result, SysIdError};

/// Sign used by the static friction terms. Zero velocity produces zero friction
/// so that samples resting exactly at a zero crossing do not bias the fit.
pub fn friction_sign(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Per-joint friction coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct FrictionModel {
    pub viscous: DVector<f64>,
    pub static_friction: DVector<f64>,
}

impl FrictionModel {
    pub fn new(viscous: DVector<f64>, static_friction: DVector<f64>) -> Result<Self> {
        if viscous.len() != static_friction.len() {
            return Err(SysIdError::shape(
                "static friction",
                &[viscous.len()],
                &[static_friction.len()],
            ));
        }
        Ok(FrictionModel {
            viscous,
            static_friction,
        })
    }

    /// Small viscous damping and no static friction, the starting point before
    /// identification.
    pub fn initial(dof: usize) -> Self {
        FrictionModel {
            viscous: DVector::from_element(dof, 0.01),
            static_friction: DVector::zeros(dof),
        }
    }

    pub fn dof(&self) -> usize {
        self.viscous.len()
    }

    /// Torque that friction applies on the joints: `-(viscous ⊙ v + static ⊙ sign(v))`.
    pub fn friction_torque(&self, v: &Joints) -> Joints {
        let signs = v.map(friction_sign);
        -(self.viscous.component_mul(v) + self.static_friction.component_mul(&signs))
    }

    /// Net joint torque resulting from the commanded actuator torque.
    pub fn joint_torque(&self, actuator_torque: &Joints, v: &Joints) -> Joints {
        actuator_torque + self.friction_torque(v)
    }

    /// Actuator torque needed to produce the given net joint torque.
    pub fn actuator_torque(&self, joint_torque: &Joints, v: &Joints) -> Joints {
        joint_torque - self.friction_torque(v)
    }

    /// Regressor columns of the friction coefficients: `[diag(v), diag(sign(v))]`,
    /// dof x 2·dof, matching the parameter order `[viscous, static]`.
    pub fn regressor(v: &Joints) -> DMatrix<f64> {
        let dof = v.len();
        let mut columns = DMatrix::zeros(dof, 2 * dof);
        for i in 0..dof {
            columns[(i, i)] = v[i];
            columns[(i, dof + i)] = friction_sign(v[i]);
        }
        columns
    }

    /// Coefficients as `[viscous, static]`.
    pub fn parameters(&self) -> DVector<f64> {
        let dof = self.dof();
        let mut theta = DVector::zeros(2 * dof);
        theta.rows_mut(0, dof).copy_from(&self.viscous);
        theta.rows_mut(dof, dof).copy_from(&self.static_friction);
        theta
    }

    pub fn set_parameters(&mut self, theta: &DVector<f64>) -> Result<()> {
        let dof = self.dof();
        if theta.len() != 2 * dof {
            return Err(SysIdError::shape("friction parameters", &[2 * dof], &[theta.len()]));
        }
        self.viscous = theta.rows(0, dof).into_owned();
        self.static_friction = theta.rows(dof, dof).into_owned();
        Ok(())
    }
}
