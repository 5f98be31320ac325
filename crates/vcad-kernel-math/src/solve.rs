//! Small dense linear solves.
//!
//! Every solver returns `None` when the system is numerically singular,
//! so Newton loops can skip the update and keep their last iterate.

use nalgebra::{Matrix2, Matrix3, Matrix3x4, Matrix4x3, Vector2, Vector3};

/// Relative determinant threshold below which a matrix is singular.
const SINGULAR_EPSILON: f64 = 1e-14;

fn is_singular(det: f64, scale: f64, dim: i32) -> bool {
    !det.is_finite() || scale == 0.0 || det.abs() <= SINGULAR_EPSILON * scale.powi(dim)
}

/// Solve `a * x = b` for a 2x2 system.
pub fn solve_2x2(a: &Matrix2<f64>, b: &Vector2<f64>) -> Option<Vector2<f64>> {
    if is_singular(a.determinant(), a.amax(), 2) {
        return None;
    }
    a.try_inverse().map(|inv| inv * b)
}

/// Solve `a * x = b` for a 3x3 system.
pub fn solve_3x3(a: &Matrix3<f64>, b: &Vector3<f64>) -> Option<Vector3<f64>> {
    if is_singular(a.determinant(), a.amax(), 3) {
        return None;
    }
    a.try_inverse().map(|inv| inv * b)
}

/// Moore–Penrose pseudo-inverse of a full-row-rank 3x4 matrix:
/// `Jᵗ (J Jᵗ)⁻¹`.
pub fn pseudo_inverse_3x4(j: &Matrix3x4<f64>) -> Option<Matrix4x3<f64>> {
    let jt = j.transpose();
    let jjt: Matrix3<f64> = j * jt;
    if is_singular(jjt.determinant(), jjt.amax(), 3) {
        return None;
    }
    jjt.try_inverse().map(|inv| jt * inv)
}
