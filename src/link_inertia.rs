//! Inertial description of a single link and its linear parameterization.

extern crate nalgebra as na;

use na::{Matrix3, Matrix6, SMatrix, Vector3, Vector6};

use crate::dynamics_traits::LINK_PARAMETERS;
use crate::error::{Result, SysIdError};
use crate::spatial::{crf, skew};

/// 6x10 matrix mapping the dynamic parameters of a link to its spatial force.
pub type BodyRegressor = SMatrix<f64, 6, LINK_PARAMETERS>;

/// Mass distribution of a rigid link, expressed in the link frame.
///
/// Stored in the form that is linear in the physical parameters: the mass, the
/// first moment of mass `m·c` and the rotational inertia about the link frame
/// origin (not about the centre of mass).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkInertia {
    pub mass: f64,
    pub first_moment: Vector3<f64>,
    pub inertia: Matrix3<f64>,
}

impl LinkInertia {
    /// Builds the link from its mass, centre of mass and the inertia tensor about
    /// the centre of mass (as found in URDF files).
    pub fn from_com(mass: f64, com: Vector3<f64>, inertia_com: Matrix3<f64>) -> Self {
        // Parallel axis theorem: I_o = I_c + m·[c]×[c]×ᵀ
        let offset = skew(&com) * skew(&com).transpose();
        LinkInertia {
            mass,
            first_moment: com * mass,
            inertia: inertia_com + offset * mass,
        }
    }

    /// Reads the link from `[m, mcx, mcy, mcz, Ixx, Ixy, Iyy, Ixz, Iyz, Izz]`.
    pub fn from_dynamic_parameters(theta: &[f64]) -> Result<Self> {
        if theta.len() != LINK_PARAMETERS {
            return Err(SysIdError::shape(
                "link dynamic parameters",
                &[LINK_PARAMETERS],
                &[theta.len()],
            ));
        }
        let mut array = [0.0; LINK_PARAMETERS];
        array.copy_from_slice(theta);
        Ok(Self::from_parameter_array(&array))
    }

    fn from_parameter_array(theta: &[f64; LINK_PARAMETERS]) -> Self {
        LinkInertia {
            mass: theta[0],
            first_moment: Vector3::new(theta[1], theta[2], theta[3]),
            inertia: Matrix3::new(
                theta[4], theta[5], theta[7],
                theta[5], theta[6], theta[8],
                theta[7], theta[8], theta[9],
            ),
        }
    }

    /// Inverse of [`LinkInertia::from_dynamic_parameters`].
    pub fn to_dynamic_parameters(&self) -> [f64; LINK_PARAMETERS] {
        let h = &self.first_moment;
        let i = &self.inertia;
        [
            self.mass,
            h.x,
            h.y,
            h.z,
            i[(0, 0)],
            i[(0, 1)],
            i[(1, 1)],
            i[(0, 2)],
            i[(1, 2)],
            i[(2, 2)],
        ]
    }

    /// Centre of mass in the link frame, if the link has mass.
    pub fn com(&self) -> Option<Vector3<f64>> {
        if self.mass > 0.0 {
            Some(self.first_moment / self.mass)
        } else {
            None
        }
    }

    /// 6x6 spatial inertia about the link frame origin.
    pub fn spatial_matrix(&self) -> Matrix6<f64> {
        spatial_inertia(self.mass, &self.first_moment, &self.inertia)
    }
}

fn spatial_inertia(mass: f64, first_moment: &Vector3<f64>, inertia: &Matrix3<f64>) -> Matrix6<f64> {
    let h = skew(first_moment);
    let mut m = Matrix6::zeros();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(inertia);
    m.fixed_view_mut::<3, 3>(0, 3).copy_from(&h);
    m.fixed_view_mut::<3, 3>(3, 0).copy_from(&h.transpose());
    m.fixed_view_mut::<3, 3>(3, 3).copy_from(&(Matrix3::identity() * mass));
    m
}

/// Spatial force `I·a + v ×f (I·v)` of a link moving with velocity `v` and
/// acceleration `a`, written as a linear function of its dynamic parameters.
pub fn body_regressor(v: &Vector6<f64>, a: &Vector6<f64>) -> BodyRegressor {
    let mut regressor = BodyRegressor::zeros();
    let v_cross = crf(v);
    for k in 0..LINK_PARAMETERS {
        let mut unit = [0.0; LINK_PARAMETERS];
        unit[k] = 1.0;
        let basis = LinkInertia::from_parameter_array(&unit).spatial_matrix();
        let force = basis * a + v_cross * (basis * v);
        regressor.set_column(k, &force);
    }
    regressor
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sample_link() -> LinkInertia {
        LinkInertia::from_com(
            1.3,
            Vector3::new(0.05, -0.02, 0.11),
            Matrix3::new(
                0.010, 0.001, 0.000,
                0.001, 0.012, 0.002,
                0.000, 0.002, 0.004,
            ),
        )
    }

    #[test]
    fn test_dynamic_parameters_round_trip() {
        let link = sample_link();
        let theta = link.to_dynamic_parameters();
        let back = LinkInertia::from_dynamic_parameters(&theta).unwrap();
        assert_eq!(link, back);
    }

    #[test]
    fn test_wrong_parameter_count_is_rejected() {
        let result = LinkInertia::from_dynamic_parameters(&[1.0; 9]);
        assert!(matches!(result, Err(SysIdError::ShapeMismatch { .. })));
    }

    #[test]
    fn test_com_recovered() {
        let link = sample_link();
        assert_relative_eq!(link.com().unwrap(), Vector3::new(0.05, -0.02, 0.11), epsilon = 1e-15);
        let massless = LinkInertia::from_dynamic_parameters(&[0.0; 10]).unwrap();
        assert!(massless.com().is_none());
    }

    #[test]
    fn test_parallel_axis_point_mass() {
        // Point mass on the x axis: no inertia about x, m·d² about y and z.
        let link = LinkInertia::from_com(2.0, Vector3::new(0.5, 0.0, 0.0), Matrix3::zeros());
        assert_relative_eq!(link.inertia[(0, 0)], 0.0, epsilon = 1e-15);
        assert_relative_eq!(link.inertia[(1, 1)], 0.5, epsilon = 1e-15);
        assert_relative_eq!(link.inertia[(2, 2)], 0.5, epsilon = 1e-15);
    }

    #[test]
    fn test_body_regressor_matches_spatial_inertia() {
        let link = sample_link();
        let v = Vector6::new(0.3, -0.1, 0.8, 0.2, 0.0, -0.4);
        let a = Vector6::new(-1.0, 0.5, 0.25, 9.81, 0.3, 0.1);
        let inertia = link.spatial_matrix();
        let expected = inertia * a + crf(&v) * (inertia * v);
        let theta = nalgebra::SVector::<f64, LINK_PARAMETERS>::from_row_slice(&link.to_dynamic_parameters());
        assert_relative_eq!(body_regressor(&v, &a) * theta, expected, epsilon = 1e-12);
    }
}
