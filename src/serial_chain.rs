//! Rigid body dynamics of a serial chain of revolute joints.
//!
//! Inverse dynamics uses the recursive Newton-Euler algorithm, the mass matrix the
//! composite rigid body algorithm. Gravity enters as a fictitious upward acceleration
//! of the base, so it is part of the joint torque regressor.

extern crate nalgebra as na;

use na::{DMatrix, DVector, Matrix3, Matrix6, Rotation3, Unit, Vector3, Vector6};

use crate::dynamics_traits::{Joints, RigidBodyDynamics, LINK_PARAMETERS};
use crate::error::{Result, SysIdError};
use crate::link_inertia::{body_regressor, LinkInertia};
use crate::parameters::ChainParameters;
use crate::spatial::{crf, crm, plucker, revolute_subspace, revolute_transform};

/// A link of the chain, together with the joint that moves it.
#[derive(Debug, Clone)]
pub struct ChainLink {
    /// Fixed transform from the parent link frame to the joint frame.
    tree_transform: Matrix6<f64>,
    axis: Unit<Vector3<f64>>,
    subspace: Vector6<f64>,
    pub inertia: LinkInertia,
}

impl ChainLink {
    pub fn axis(&self) -> &Unit<Vector3<f64>> {
        &self.axis
    }
}

#[derive(Debug, Clone)]
pub struct SerialChain {
    links: Vec<ChainLink>,
    gravity: Vector3<f64>,
}

impl SerialChain {
    /// Creates a new `SerialChain` from the given parameters.
    pub fn new(parameters: &ChainParameters) -> Result<Self> {
        if parameters.joints.is_empty() {
            return Err(SysIdError::InvalidArgument(
                "the chain must have at least one joint".into(),
            ));
        }

        let mut links = Vec::with_capacity(parameters.joints.len());
        for (i, joint) in parameters.joints.iter().enumerate() {
            let axis = Vector3::from(joint.axis);
            if !(axis.norm() > 0.0) {
                return Err(SysIdError::InvalidArgument(format!(
                    "joint {} ('{}') has a zero rotation axis",
                    i, joint.name
                )));
            }
            let axis = Unit::new_normalize(axis);

            let [roll, pitch, yaw] = joint.rpy;
            let rotation = Rotation3::from_euler_angles(roll, pitch, yaw);
            let tree_transform = plucker(&rotation.matrix().transpose(), &Vector3::from(joint.xyz));

            let [ixx, ixy, ixz, iyy, iyz, izz] = joint.inertia;
            let inertia_com = Matrix3::new(
                ixx, ixy, ixz,
                ixy, iyy, iyz,
                ixz, iyz, izz,
            );
            links.push(ChainLink {
                tree_transform,
                subspace: revolute_subspace(&axis),
                axis,
                inertia: LinkInertia::from_com(joint.mass, Vector3::from(joint.com), inertia_com),
            });
        }

        Ok(SerialChain {
            links,
            gravity: Vector3::from(parameters.gravity),
        })
    }

    pub fn links(&self) -> &[ChainLink] {
        &self.links
    }

    pub fn gravity(&self) -> &Vector3<f64> {
        &self.gravity
    }

    /// Plücker transforms from each link's parent frame into the link frame.
    fn link_transforms(&self, q: &Joints) -> Vec<Matrix6<f64>> {
        self.links
            .iter()
            .enumerate()
            .map(|(i, link)| revolute_transform(&link.axis, q[i]) * link.tree_transform)
            .collect()
    }

    /// Spatial velocity and acceleration of every link, in link coordinates.
    fn link_motion(
        &self,
        transforms: &[Matrix6<f64>],
        v: &Joints,
        a: &Joints,
        with_gravity: bool,
    ) -> (Vec<Vector6<f64>>, Vec<Vector6<f64>>) {
        let n = self.links.len();
        let mut velocities = Vec::with_capacity(n);
        let mut accelerations = Vec::with_capacity(n);

        let mut parent_velocity = Vector6::zeros();
        let mut parent_acceleration = if with_gravity {
            Vector6::new(0.0, 0.0, 0.0, -self.gravity.x, -self.gravity.y, -self.gravity.z)
        } else {
            Vector6::zeros()
        };

        for (i, link) in self.links.iter().enumerate() {
            let joint_velocity = link.subspace * v[i];
            let velocity = transforms[i] * parent_velocity + joint_velocity;
            let acceleration = transforms[i] * parent_acceleration
                + link.subspace * a[i]
                + crm(&velocity) * joint_velocity;
            velocities.push(velocity);
            accelerations.push(acceleration);
            parent_velocity = velocity;
            parent_acceleration = acceleration;
        }
        (velocities, accelerations)
    }

    fn rnea(&self, q: &Joints, v: &Joints, a: &Joints, with_gravity: bool) -> Joints {
        let transforms = self.link_transforms(q);
        let (velocities, accelerations) = self.link_motion(&transforms, v, a, with_gravity);

        let mut forces: Vec<Vector6<f64>> = self
            .links
            .iter()
            .zip(velocities.iter().zip(accelerations.iter()))
            .map(|(link, (vel, acc))| {
                let inertia = link.inertia.spatial_matrix();
                inertia * acc + crf(vel) * (inertia * vel)
            })
            .collect();

        let n = self.links.len();
        let mut tau = DVector::zeros(n);
        for i in (0..n).rev() {
            tau[i] = self.links[i].subspace.dot(&forces[i]);
            if i > 0 {
                let transmitted = transforms[i].transpose() * forces[i];
                forces[i - 1] += transmitted;
            }
        }
        tau
    }

    /// Joint space mass matrix M(q).
    pub fn mass_matrix(&self, q: &Joints) -> DMatrix<f64> {
        let n = self.links.len();
        let transforms = self.link_transforms(q);

        let mut composite: Vec<Matrix6<f64>> =
            self.links.iter().map(|l| l.inertia.spatial_matrix()).collect();
        for i in (1..n).rev() {
            let in_parent = transforms[i].transpose() * composite[i] * transforms[i];
            composite[i - 1] += in_parent;
        }

        let mut mass = DMatrix::zeros(n, n);
        for i in 0..n {
            let mut force = composite[i] * self.links[i].subspace;
            mass[(i, i)] = self.links[i].subspace.dot(&force);
            for j in (0..i).rev() {
                force = transforms[j + 1].transpose() * force;
                let coupling = self.links[j].subspace.dot(&force);
                mass[(i, j)] = coupling;
                mass[(j, i)] = coupling;
            }
        }
        mass
    }
}

impl RigidBodyDynamics for SerialChain {
    fn dof(&self) -> usize {
        self.links.len()
    }

    fn forward_dynamics(&self, q: &Joints, v: &Joints, tau: &Joints) -> Result<Joints> {
        let bias = self.rnea(q, v, &DVector::zeros(self.dof()), true);
        let mass = self.mass_matrix(q);
        mass.lu()
            .solve(&(tau - bias))
            .ok_or_else(|| SysIdError::SingularSystem(format!("mass matrix at q = {}", q.transpose())))
    }

    fn inverse_dynamics(&self, q: &Joints, v: &Joints, a: &Joints) -> Joints {
        self.rnea(q, v, a, true)
    }

    fn regressor_matrix(&self, q: &Joints, v: &Joints, a: &Joints) -> DMatrix<f64> {
        let n = self.links.len();
        let transforms = self.link_transforms(q);
        let (velocities, accelerations) = self.link_motion(&transforms, v, a, true);

        let mut regressor = DMatrix::zeros(n, LINK_PARAMETERS * n);
        for j in 0..n {
            // Force of link j, carried down to every joint that supports it.
            let mut block = body_regressor(&velocities[j], &accelerations[j]);
            for i in (0..=j).rev() {
                let row = self.links[i].subspace.transpose() * block;
                regressor
                    .view_mut((i, LINK_PARAMETERS * j), (1, LINK_PARAMETERS))
                    .copy_from(&row);
                if i > 0 {
                    block = transforms[i].transpose() * block;
                }
            }
        }
        regressor
    }

    fn dynamic_parameters(&self) -> DVector<f64> {
        let values: Vec<f64> = self
            .links
            .iter()
            .flat_map(|link| link.inertia.to_dynamic_parameters())
            .collect();
        DVector::from_vec(values)
    }

    fn set_dynamic_parameters(&mut self, theta: &DVector<f64>) -> Result<()> {
        let expected = LINK_PARAMETERS * self.links.len();
        if theta.len() != expected {
            return Err(SysIdError::shape("dynamic parameters", &[expected], &[theta.len()]));
        }
        for (link, chunk) in self.links.iter_mut().zip(theta.as_slice().chunks(LINK_PARAMETERS)) {
            link.inertia = LinkInertia::from_dynamic_parameters(chunk)?;
        }
        Ok(())
    }
}
