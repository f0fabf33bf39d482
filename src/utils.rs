//! Helper functions

extern crate nalgebra as na;

use na::DVector;
use ndarray::{ArrayView1, ArrayViewMut1};

use crate::dynamics_traits::{Joints, JOINT_PARAMETERS, LINK_PARAMETERS};

/// Checks if all elements are finite
pub fn is_valid(values: &Joints) -> bool {
    values.iter().all(|x| x.is_finite())
}

/// Copies one row of a trajectory array into a joint vector.
pub fn row_to_joints(row: ArrayView1<f64>) -> Joints {
    DVector::from_iterator(row.len(), row.iter().copied())
}

/// Writes a joint vector into one row (or part of a row) of a trajectory array.
pub fn joints_to_row(joints: &Joints, mut row: ArrayViewMut1<f64>) {
    for (target, value) in row.iter_mut().zip(joints.iter()) {
        *target = *value;
    }
}

/// Runs `f` for every sample index and returns the results in index order. Samples
/// are processed in parallel when the `parallel` feature is enabled.
#[cfg(feature = "parallel")]
pub(crate) fn map_samples<T, F>(count: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    use rayon::prelude::*;
    (0..count).into_par_iter().map(f).collect()
}

#[cfg(not(feature = "parallel"))]
pub(crate) fn map_samples<T, F>(count: usize, f: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync + Send,
{
    (0..count).map(f).collect()
}

/// Print the identified parameters, one joint per line: the ten inertial
/// parameters followed by viscous and static friction.
pub fn dump_params(theta: &DVector<f64>) {
    let dof = theta.len() / JOINT_PARAMETERS;
    if dof * JOINT_PARAMETERS != theta.len() {
        println!("Unexpected parameter vector of length {}", theta.len());
        return;
    }
    let friction = LINK_PARAMETERS * dof;
    for j in 0..dof {
        let mut row_str = String::new();
        for k in 0..LINK_PARAMETERS {
            row_str.push_str(&format!("{:10.3e} ", theta[LINK_PARAMETERS * j + k]));
        }
        println!(
            "J{}: [{}] viscous {:.4} static {:.4}",
            j + 1,
            row_str.trim_end(),
            theta[friction + j],
            theta[friction + dof + j]
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn test_is_valid() {
        assert!(is_valid(&DVector::from_vec(vec![0.0, 1.0, -1.0])));
        assert!(!is_valid(&DVector::from_vec(vec![0.0, f64::NAN])));
        assert!(!is_valid(&DVector::from_vec(vec![f64::INFINITY])));
    }

    #[test]
    fn test_row_conversions() {
        let data = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let joints = row_to_joints(data.row(1));
        assert_eq!(joints, DVector::from_vec(vec![4.0, 5.0, 6.0]));

        let mut target = Array2::zeros((1, 5));
        joints_to_row(&joints, target.row_mut(0).slice_mut(ndarray::s![2..]));
        assert_eq!(target, array![[0.0, 0.0, 4.0, 5.0, 6.0]]);
    }

    #[test]
    fn test_map_samples_keeps_order() {
        let squares = map_samples(100, |i| i * i);
        assert_eq!(squares.len(), 100);
        assert!(squares.iter().enumerate().all(|(i, &s)| s == i * i));
    }
}
