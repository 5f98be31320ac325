#![warn(missing_docs)]

//! Math types for the vcad intersection kernel.
//!
//! Thin wrappers around nalgebra providing domain-specific types
//! for parametric geometry: points, vectors, transforms, parameter
//! intervals, bounding boxes, tolerance constants, and the small dense
//! solves used by Newton refinement.

mod bbox;
mod interval;
pub mod solve;

pub use bbox::BoundingBox;
pub use interval::Interval;

use nalgebra::{Matrix4, Vector2, Vector3, Vector4};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A point in 2D parameter space.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D space.
pub type Vec2 = Vector2<f64>;

/// Smallest length treated as nonzero: 2^-32.
///
/// A curve whose bounding box diagonal is shorter than this is a point.
pub const ZERO_TOLERANCE: f64 = 2.328_306_436_538_696_3e-10;

/// An affine map stored as a 4x4 matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// The underlying 4x4 matrix.
    pub matrix: Matrix4<f64>,
}

impl Transform {
    /// Translation by `(dx, dy, dz)`.
    pub fn translation(dx: f64, dy: f64, dz: f64) -> Self {
        let mut m = Matrix4::identity();
        m[(0, 3)] = dx;
        m[(1, 3)] = dy;
        m[(2, 3)] = dz;
        Self { matrix: m }
    }

    /// Rotation about the Z axis by `angle` radians.
    pub fn rotation_z(angle: f64) -> Self {
        let (s, c) = angle.sin_cos();
        let mut m = Matrix4::identity();
        m[(0, 0)] = c;
        m[(0, 1)] = -s;
        m[(1, 0)] = s;
        m[(1, 1)] = c;
        Self { matrix: m }
    }

    /// Map a point.
    pub fn apply_point(&self, p: &Point3) -> Point3 {
        let v = self.matrix * Vector4::new(p.x, p.y, p.z, 1.0);
        Point3::new(v.x, v.y, v.z)
    }
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Linear distance tolerance in model units.
    pub linear: f64,
    /// Angular tolerance in radians.
    pub angular: f64,
}

impl Tolerance {
    /// Default intersection tolerances (0.001 linear, one degree angular).
    pub const DEFAULT: Self = Self {
        linear: 0.001,
        angular: std::f64::consts::PI / 180.0,
    };

    /// Replace a non-positive linear tolerance with the default.
    pub fn resolve(tol: f64) -> f64 {
        if tol > 0.0 {
            tol
        } else {
            Self::DEFAULT.linear
        }
    }

    /// Check if two vectors are parallel or anti-parallel within the
    /// angular tolerance. Zero vectors are never parallel.
    pub fn parallel(&self, a: &Vec3, b: &Vec3) -> bool {
        let la = a.norm();
        let lb = b.norm();
        if la <= ZERO_TOLERANCE || lb <= ZERO_TOLERANCE {
            return false;
        }
        a.dot(b).abs() / (la * lb) >= self.angular.cos()
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_translation() {
        let t = Transform::translation(10.0, 20.0, 30.0);
        let result = t.apply_point(&Point3::new(1.0, 2.0, 3.0));
        assert!((result - Point3::new(11.0, 22.0, 33.0)).norm() < 1e-12);
    }

    #[test]
    fn test_rotation_z_90() {
        let t = Transform::rotation_z(PI / 2.0);
        let result = t.apply_point(&Point3::new(1.0, 0.0, 0.0));
        assert!(result.x.abs() < 1e-12);
        assert!((result.y - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_zero_tolerance_is_two_to_minus_32() {
        assert_eq!(ZERO_TOLERANCE, 2f64.powi(-32));
    }

    #[test]
    fn test_tolerance_resolve() {
        assert_eq!(Tolerance::resolve(0.0), 0.001);
        assert_eq!(Tolerance::resolve(-1.0), 0.001);
        assert_eq!(Tolerance::resolve(0.5), 0.5);
    }

    #[test]
    fn test_tolerance_parallel() {
        let tol = Tolerance::DEFAULT;
        assert!(tol.parallel(&Vec3::z(), &Vec3::new(0.0, 0.0, -3.0)));
        assert!(tol.parallel(&Vec3::z(), &Vec3::new(0.001, 0.0, 1.0)));
        assert!(!tol.parallel(&Vec3::z(), &Vec3::x()));
        assert!(!tol.parallel(&Vec3::zeros(), &Vec3::x()));
    }
}
