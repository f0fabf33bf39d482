//! Least squares identification of the robot parameters from a flat training set.
//!
//! Every training row contributes a dof x 12·dof regressor block and its measured
//! torques. The blocks are stacked into `Y` and `T` and the parameters solve the ridge
//! regularized normal equations `(YᵀY + εI)θ = YᵀT + εμ`.

extern crate nalgebra as na;

use na::{DMatrix, DVector};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::dynamics_traits::RigidBodyDynamics;
use crate::error::{Invariant, Result, SysIdError};
use crate::robot::{Robot, ROUND_TRIP_TOLERANCE};
use crate::trajectory::FlatSamples;
use crate::utils::{map_samples, row_to_joints};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Ridge weight ε. Small enough not to bias a well determined fit.
    pub regularization_epsilon: f64,
    /// Value of every entry of the ridge target μ.
    pub regularization_mu: f64,
    /// Allowed `‖YᵀYθ - YᵀT‖∞`, relative to `max(1, ‖YᵀT‖∞)`.
    pub normal_equation_tolerance: f64,
    /// Allowed difference between written and read back parameters.
    pub round_trip_tolerance: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig {
            regularization_epsilon: 1e-12,
            regularization_mu: 1e-6,
            normal_equation_tolerance: 1e-6,
            round_trip_tolerance: ROUND_TRIP_TOLERANCE,
        }
    }
}

/// Summary of a completed fit.
#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    /// Training rows (flattened samples) used.
    pub samples: usize,
    /// Rows of the stacked regressor, `samples · dof`.
    pub regressor_rows: usize,
    /// Identified parameters, `12 · dof`.
    pub parameters: usize,
    /// `‖YᵀYθ - YᵀT‖∞` of the parameters as read back from the robot.
    pub normal_equation_residual: f64,
    /// Root mean square of `Yθ - T` over all stacked rows.
    pub torque_rms: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ParameterEstimator {
    config: EstimatorConfig,
}

impl ParameterEstimator {
    pub fn new(config: EstimatorConfig) -> Result<Self> {
        let c = &config;
        if !(c.regularization_epsilon >= 0.0) || !c.regularization_epsilon.is_finite() {
            return Err(SysIdError::InvalidArgument(format!(
                "regularization epsilon must be non-negative, got {}",
                c.regularization_epsilon
            )));
        }
        if !c.regularization_mu.is_finite() {
            return Err(SysIdError::InvalidArgument(format!(
                "regularization mu must be finite, got {}",
                c.regularization_mu
            )));
        }
        for (name, value) in [
            ("normal equation tolerance", c.normal_equation_tolerance),
            ("round trip tolerance", c.round_trip_tolerance),
        ] {
            if !(value > 0.0) {
                return Err(SysIdError::InvalidArgument(format!("{} must be positive, got {}", name, value)));
            }
        }
        Ok(ParameterEstimator { config })
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Stacked regressor `Y` (rows·dof x 12·dof) and torque targets `T` (rows·dof).
    /// Row block `t` belongs to training row `t` whatever order the blocks are built in.
    pub fn stack<M: RigidBodyDynamics>(
        robot: &Robot<M>,
        samples: &FlatSamples,
    ) -> Result<(DMatrix<f64>, DVector<f64>)> {
        let dof = robot.dof();
        samples.validate(dof)?;
        let rows = samples.rows();

        let blocks = map_samples(rows, |t| {
            robot.regressor_matrix(
                &row_to_joints(samples.angles.row(t)),
                &row_to_joints(samples.velocities.row(t)),
                &row_to_joints(samples.accelerations.row(t)),
            )
        });

        let mut y = DMatrix::zeros(rows * dof, robot.parameter_count());
        let mut targets = DVector::zeros(rows * dof);
        for (t, block) in blocks.into_iter().enumerate() {
            y.rows_mut(t * dof, dof).copy_from(&block?);
            for j in 0..dof {
                targets[t * dof + j] = samples.torques[[t, j]];
            }
        }
        debug!("Stacked regressor is {} x {}", y.nrows(), y.ncols());
        Ok((y, targets))
    }

    /// Identifies the parameters of `robot` in place. On error the robot keeps the
    /// parameters it had before the call.
    pub fn fit<M: RigidBodyDynamics>(&self, robot: &mut Robot<M>, samples: &FlatSamples) -> Result<FitReport> {
        let (y, targets) = Self::stack(robot, samples)?;
        if y.nrows() == 0 {
            return Err(SysIdError::InvalidArgument("no training rows to fit".into()));
        }

        let parameters = y.ncols();
        let gram = y.tr_mul(&y);
        let projected = y.tr_mul(&targets);

        let epsilon = self.config.regularization_epsilon;
        let lhs = &gram + DMatrix::identity(parameters, parameters) * epsilon;
        let rhs = &projected + DVector::from_element(parameters, epsilon * self.config.regularization_mu);
        let theta = lhs
            .lu()
            .solve(&rhs)
            .ok_or_else(|| SysIdError::SingularSystem("regularized normal equations".into()))?;
        self.check_normal_equation(&gram, &projected, &theta, y.nrows())?;

        let previous = robot.get_params();
        let fitted = robot
            .set_params_with_tolerance(&theta, self.config.round_trip_tolerance)
            .map(|_| robot.get_params())
            .and_then(|fitted| {
                self.check_normal_equation(&gram, &projected, &fitted, y.nrows())?;
                Ok(fitted)
            });
        let fitted = match fitted {
            Ok(fitted) => fitted,
            Err(e) => {
                if let Err(restore) = robot.set_params_with_tolerance(&previous, self.config.round_trip_tolerance) {
                    error!("Could not restore the parameters after a failed fit: {}", restore);
                }
                return Err(e);
            }
        };
        let residual = normal_equation_residual(&gram, &projected, &fitted);

        let errors = &y * &fitted - &targets;
        let report = FitReport {
            samples: samples.rows(),
            regressor_rows: y.nrows(),
            parameters,
            normal_equation_residual: residual,
            torque_rms: (errors.norm_squared() / errors.len() as f64).sqrt(),
        };
        info!(
            "Fitted {} parameters on {} samples, normal equation residual {:e}, torque RMS {:e}",
            report.parameters, report.samples, report.normal_equation_residual, report.torque_rms
        );
        Ok(report)
    }

    fn check_normal_equation(
        &self,
        gram: &DMatrix<f64>,
        projected: &DVector<f64>,
        theta: &DVector<f64>,
        rows: usize,
    ) -> Result<()> {
        let residual = normal_equation_residual(gram, projected, theta);
        if !within_tolerance(residual, projected, self.config.normal_equation_tolerance) {
            error!(
                "Fitted parameters violate the normal equations, residual {:e} over {} rows",
                residual, rows
            );
            return Err(SysIdError::ConsistencyViolation {
                invariant: Invariant::NormalEquation,
                residual,
            });
        }
        Ok(())
    }
}

/// `‖YᵀYθ - YᵀT‖∞` given `YᵀY` and `YᵀT`.
pub fn normal_equation_residual(gram: &DMatrix<f64>, projected: &DVector<f64>, theta: &DVector<f64>) -> f64 {
    (gram * theta - projected).amax()
}

fn within_tolerance(residual: f64, projected: &DVector<f64>, tolerance: f64) -> bool {
    residual <= tolerance * projected.amax().max(1.0)
}

/// True if `θ` solves the least squares problem `Yθ ≈ T` up to `tolerance`, relative
/// to `max(1, ‖YᵀT‖∞)`.
pub fn satisfies_normal_equation(y: &DMatrix<f64>, targets: &DVector<f64>, theta: &DVector<f64>, tolerance: f64) -> bool {
    let projected = y.tr_mul(targets);
    within_tolerance(normal_equation_residual(&y.tr_mul(y), &projected, theta), &projected, tolerance)
}
