//! Hardcoded rigid body parameters for a few robots

use crate::parameters::{ChainParameters, JointParameters};

/// Inertia about the centre of mass of a thin rod along x, URDF order.
fn rod_along_x(mass: f64, length: f64, radius: f64) -> [f64; 6] {
    let axial = 0.5 * mass * radius * radius;
    let transverse = mass * (3.0 * radius * radius + length * length) / 12.0;
    [axial, 0.0, 0.0, transverse, 0.0, transverse]
}

#[allow(dead_code)]
impl ChainParameters {
    /// Three joint manipulator: a base yaw joint followed by two pitch joints,
    /// with links pointing along x at zero angles.
    pub fn manipulator_3dof() -> Self {
        ChainParameters {
            gravity: [0.0, 0.0, -9.81],
            joints: vec![
                JointParameters {
                    name: "base_yaw".into(),
                    xyz: [0.0, 0.0, 0.0],
                    rpy: [0.0, 0.0, 0.0],
                    axis: [0.0, 0.0, 1.0],
                    mass: 0.2,
                    com: [0.0, 0.0, 0.05],
                    inertia: [2.0e-4, 0.0, 0.0, 2.0e-4, 0.0, 1.0e-4],
                },
                JointParameters {
                    name: "upper_pitch".into(),
                    xyz: [0.0, 0.0, 0.1],
                    rpy: [0.0, 0.0, 0.0],
                    axis: [0.0, 1.0, 0.0],
                    mass: 0.3,
                    com: [0.08, 0.0, 0.0],
                    inertia: rod_along_x(0.3, 0.16, 0.01),
                },
                JointParameters {
                    name: "lower_pitch".into(),
                    xyz: [0.16, 0.0, 0.0],
                    rpy: [0.0, 0.0, 0.0],
                    axis: [0.0, 1.0, 0.0],
                    mass: 0.1,
                    com: [0.07, 0.0, 0.0],
                    inertia: rod_along_x(0.1, 0.14, 0.008),
                },
            ],
            viscous_friction: vec![0.01; 3],
            static_friction: vec![0.0; 3],
        }
    }

    /// Two link arm swinging in the vertical x-z plane.
    pub fn planar_2dof() -> Self {
        ChainParameters {
            gravity: [0.0, 0.0, -9.81],
            joints: vec![
                JointParameters {
                    name: "shoulder".into(),
                    xyz: [0.0, 0.0, 0.0],
                    rpy: [0.0, 0.0, 0.0],
                    axis: [0.0, 1.0, 0.0],
                    mass: 1.0,
                    com: [0.15, 0.0, 0.0],
                    inertia: rod_along_x(1.0, 0.3, 0.02),
                },
                JointParameters {
                    name: "elbow".into(),
                    xyz: [0.3, 0.0, 0.0],
                    rpy: [0.0, 0.0, 0.0],
                    axis: [0.0, 1.0, 0.0],
                    mass: 0.5,
                    com: [0.125, 0.0, 0.0],
                    inertia: rod_along_x(0.5, 0.25, 0.015),
                },
            ],
            viscous_friction: vec![0.01; 2],
            static_friction: vec![0.0; 2],
        }
    }
}
