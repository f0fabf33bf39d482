//! Identification of the dynamic parameters of serial manipulators from recorded motion,
//! and prediction of future joint states with the identified model.
//!
//! The parameters identified per joint are the ten inertial parameters of the link it
//! moves (mass, first moment of mass and the inertia tensor about the link frame
//! origin) plus viscous and static (Coulomb) friction of the joint. Joint torque is
//! linear in these parameters, `τ = Y(q, v, a)·θ`, so they are found by stacking the
//! regressor `Y` over many recorded samples and solving a ridge regularized least
//! squares problem.
//!
//! # Features
//!
//! - Trajectory preprocessing: differentiation, Gaussian smoothing, trimming,
//!   flattening and seeded subsampling of `[sample, time, joint]` recordings.
//! - Regressor stacking in parallel (feature `parallel`), with the normal equations
//!   and the parameter round trip verified after every fit.
//! - Prediction by integrating the identified model with semi-implicit Euler steps.
//! - A learner interface (`learn` / `predict` / `name`) for harnesses comparing
//!   different dynamics models.
//! - Rigid body dynamics of revolute serial chains (recursive Newton-Euler, composite
//!   rigid body algorithm, joint torque regressor) behind the `RigidBodyDynamics` trait,
//!   so another dynamics engine can be plugged in.
//! - Robot and learner descriptions from YAML (feature `allow_filesystem`).
//!
//! # Usage
//!
//! ```no_run
//! use rs_manipulator_sysid::learner::{DynamicsLearner, LearnerConfig, SystemIdLearner};
//! use rs_manipulator_sysid::parameters::ChainParameters;
//! use rs_manipulator_sysid::robot::Robot;
//! # fn main() -> rs_manipulator_sysid::error::Result<()> {
//! # let observations = ndarray::Array3::<f64>::zeros((1, 3000, 9));
//! # let actions = ndarray::Array3::<f64>::zeros((1, 3000, 3));
//! let robot = Robot::from_parameters(&ChainParameters::manipulator_3dof())?;
//! let mut learner = SystemIdLearner::new(robot, LearnerConfig::default())?;
//! learner.learn(observations.view(), actions.view())?;
//! let next = learner.predict(observations.view(), actions.view(), None)?;
//! # Ok(())
//! # }
//! ```

pub mod parameters;
pub mod parameters_robots;

#[cfg(feature = "allow_filesystem")]
pub mod parameters_from_file;

pub mod parameter_error;
pub mod error;

pub mod utils;

pub mod dynamics_traits;
pub mod spatial;
pub mod link_inertia;
pub mod serial_chain;

pub mod friction;
pub mod robot;

pub mod trajectory;
pub mod smoothing;
pub mod preprocess;

pub mod estimator;
pub mod predictor;
pub mod learner;

pub mod synthetic;

#[cfg(test)]
mod tests;
