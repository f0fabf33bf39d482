//! Minimal 6D spatial algebra (Featherstone, "Rigid Body Dynamics Algorithms").
//!
//! Spatial vectors are ordered [angular; linear]: motion vectors are [ω; v],
//! force vectors are [n; f]. A Plücker transform `X` maps motion vectors from a
//! parent frame into a child frame, `Xᵀ` maps force vectors from the child back
//! into the parent.

extern crate nalgebra as na;

use na::{Matrix3, Matrix6, Rotation3, Unit, Vector3, Vector6};

/// Cross product matrix, `skew(a) * b == a × b`.
pub fn skew(a: &Vector3<f64>) -> Matrix3<f64> {
    Matrix3::new(
        0.0, -a.z, a.y,
        a.z, 0.0, -a.x,
        -a.y, a.x, 0.0,
    )
}

/// Plücker transform from frame A to frame B, where `e` rotates A coordinates into
/// B coordinates and `r` is the origin of B expressed in A.
pub fn plucker(e: &Matrix3<f64>, r: &Vector3<f64>) -> Matrix6<f64> {
    let mut x = Matrix6::zeros();
    x.fixed_view_mut::<3, 3>(0, 0).copy_from(e);
    x.fixed_view_mut::<3, 3>(3, 3).copy_from(e);
    x.fixed_view_mut::<3, 3>(3, 0).copy_from(&(-(e * skew(r))));
    x
}

/// Transform across a revolute joint rotated by `angle` about `axis`.
pub fn revolute_transform(axis: &Unit<Vector3<f64>>, angle: f64) -> Matrix6<f64> {
    let rotation = Rotation3::from_axis_angle(axis, angle);
    plucker(&rotation.matrix().transpose(), &Vector3::zeros())
}

/// Motion subspace of a revolute joint about `axis`.
pub fn revolute_subspace(axis: &Unit<Vector3<f64>>) -> Vector6<f64> {
    Vector6::new(axis.x, axis.y, axis.z, 0.0, 0.0, 0.0)
}

/// Spatial cross product operator for motion vectors, `crm(v) * m == v ×ₘ m`.
pub fn crm(v: &Vector6<f64>) -> Matrix6<f64> {
    let w = Vector3::new(v[0], v[1], v[2]);
    let lin = Vector3::new(v[3], v[4], v[5]);
    let mut m = Matrix6::zeros();
    m.fixed_view_mut::<3, 3>(0, 0).copy_from(&skew(&w));
    m.fixed_view_mut::<3, 3>(3, 3).copy_from(&skew(&w));
    m.fixed_view_mut::<3, 3>(3, 0).copy_from(&skew(&lin));
    m
}

/// Spatial cross product operator for force vectors, `crf(v) == -crm(v)ᵀ`.
pub fn crf(v: &Vector6<f64>) -> Matrix6<f64> {
    -crm(v).transpose()
}
