#![warn(missing_docs)]

//! Rational B-spline geometry for the vcad intersection kernel.
//!
//! Provides the NURBS curves and surfaces the intersection engine
//! subdivides and refines: exact evaluation with first and second
//! derivatives, knot insertion, splitting, sub-domain extraction,
//! isocurves, control-hull bounding boxes and flatness tests.
//!
//! # Key types
//!
//! - [`NurbsCurve`]: rational B-spline curve in 3D (2D curves live in z = 0)
//! - [`NurbsSurface`]: rational tensor-product NURBS surface
//!
//! # Algorithms
//!
//! - **Cox–de Boor recursion** with basis derivatives for evaluation
//! - **Boehm's algorithm** for knot insertion (refinement and splitting)
//! - **Quotient rule on homogeneous derivatives** for rational derivatives
//!
//! Every knot vector is expected to be clamped (end knots repeated
//! `degree + 1` times).

mod curve;
mod surface;

pub use curve::{link_curves, NurbsCurve};
pub use surface::{Direction, NurbsSurface, SurfaceDerivatives};

use nalgebra::Vector4;
use vcad_kernel_math::Point3;

/// A homogeneous control point `(w*x, w*y, w*z, w)`.
pub type Homogeneous = Vector4<f64>;

/// Relative tolerance for snapping a parameter onto an existing knot.
const KNOT_SNAP: f64 = 1e-12;

// =============================================================================
// Knot vector utilities
// =============================================================================

/// Validate a knot vector: non-decreasing, length = n_control_points + degree + 1.
fn validate_knots(knots: &[f64], n_points: usize, degree: usize) -> bool {
    if knots.len() != n_points + degree + 1 || n_points <= degree {
        return false;
    }
    knots.windows(2).all(|w| w[0] <= w[1])
}

/// Find the knot span index for parameter `t`.
///
/// Returns `i` such that `knots[i] <= t < knots[i+1]`, clamped to valid range.
/// For `t` at the end of the domain, returns the last valid span.
fn find_span(knots: &[f64], n: usize, degree: usize, t: f64) -> usize {
    // n = number of control points - 1 (last index)
    if t >= knots[n + 1] {
        // last non-degenerate span
        let mut span = n;
        while span > degree && knots[span] >= knots[n + 1] {
            span -= 1;
        }
        return span;
    }
    if t <= knots[degree] {
        let mut span = degree;
        while span < n && knots[span + 1] <= knots[degree] {
            span += 1;
        }
        return span;
    }
    let mut low = degree;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while t < knots[mid] || t >= knots[mid + 1] {
        if t < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Compute non-zero basis function values at parameter `t`.
///
/// Returns a vector of `degree + 1` values `N[span-degree..=span]` at `t`.
#[cfg(test)]
fn basis_functions(knots: &[f64], span: usize, degree: usize, t: f64) -> Vec<f64> {
    basis_function_derivatives(knots, span, degree, t, 0).swap_remove(0)
}

/// Non-zero basis functions and their derivatives up to order `n` at `t`.
///
/// `ders[k][j]` is the k-th derivative of `N[span-degree+j]`. Orders above
/// the degree are zero.
fn basis_function_derivatives(
    knots: &[f64],
    span: usize,
    degree: usize,
    t: f64,
    n: usize,
) -> Vec<Vec<f64>> {
    let p = degree;
    let mut ders = vec![vec![0.0; p + 1]; n + 1];
    let mut ndu = vec![vec![0.0; p + 1]; p + 1];
    let mut left = vec![0.0; p + 1];
    let mut right = vec![0.0; p + 1];
    ndu[0][0] = 1.0;

    for j in 1..=p {
        left[j] = t - knots[span + 1 - j];
        right[j] = knots[span + j] - t;
        let mut saved = 0.0;
        for r in 0..j {
            // lower triangle holds knot differences
            ndu[j][r] = right[r + 1] + left[j - r];
            let temp = if ndu[j][r].abs() < 1e-30 {
                0.0
            } else {
                ndu[r][j - 1] / ndu[j][r]
            };
            ndu[r][j] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        ndu[j][j] = saved;
    }
    for j in 0..=p {
        ders[0][j] = ndu[j][p];
    }

    let n_eff = n.min(p);
    let pi = p as isize;
    let mut a = vec![vec![0.0; p + 1]; 2];
    for r in 0..=pi {
        let (mut s1, mut s2) = (0usize, 1usize);
        a[0][0] = 1.0;
        for k in 1..=(n_eff as isize) {
            let mut d = 0.0;
            let rk = r - k;
            let pk = pi - k;
            if r >= k {
                let den = ndu[(pk + 1) as usize][rk as usize];
                a[s2][0] = if den.abs() < 1e-30 {
                    0.0
                } else {
                    a[s1][0] / den
                };
                d = a[s2][0] * ndu[rk as usize][pk as usize];
            }
            let j1 = if rk >= -1 { 1 } else { -rk };
            let j2 = if r - 1 <= pk { k - 1 } else { pi - r };
            for j in j1..=j2 {
                let den = ndu[(pk + 1) as usize][(rk + j) as usize];
                a[s2][j as usize] = if den.abs() < 1e-30 {
                    0.0
                } else {
                    (a[s1][j as usize] - a[s1][(j - 1) as usize]) / den
                };
                d += a[s2][j as usize] * ndu[(rk + j) as usize][pk as usize];
            }
            if r <= pk {
                let den = ndu[(pk + 1) as usize][r as usize];
                a[s2][k as usize] = if den.abs() < 1e-30 {
                    0.0
                } else {
                    -a[s1][(k - 1) as usize] / den
                };
                d += a[s2][k as usize] * ndu[r as usize][pk as usize];
            }
            ders[k as usize][r as usize] = d;
            std::mem::swap(&mut s1, &mut s2);
        }
    }

    let mut factor = p as f64;
    for k in 1..=n_eff {
        for d in ders[k].iter_mut() {
            *d *= factor;
        }
        factor *= (p - k) as f64;
    }
    ders
}

/// Distinct knot values inside the domain `[knots[degree], knots[n_points]]`.
fn distinct_knots(knots: &[f64], n_points: usize, degree: usize) -> Vec<f64> {
    let mut out: Vec<f64> = Vec::new();
    for &k in &knots[degree..=n_points] {
        match out.last() {
            Some(&last) if k <= last => {}
            _ => out.push(k),
        }
    }
    out
}

/// Binomial coefficient for the small orders used by rational derivatives.
fn binomial(n: usize, k: usize) -> f64 {
    (0..k).fold(1.0, |acc, i| acc * (n - i) as f64 / (i + 1) as f64)
}

// =============================================================================
// Weighted control points
// =============================================================================

/// A weighted control point for NURBS (homogeneous coordinates).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedPoint {
    /// 3D position (in Cartesian coordinates, not weighted).
    pub point: Point3,
    /// Weight (must be > 0).
    pub weight: f64,
}

impl WeightedPoint {
    /// Create a weighted point.
    pub fn new(point: Point3, weight: f64) -> Self {
        Self { point, weight }
    }

    /// Create with unit weight.
    pub fn unweighted(point: Point3) -> Self {
        Self { point, weight: 1.0 }
    }

    /// Convert to homogeneous coordinates: `(w*x, w*y, w*z, w)`.
    pub fn to_homogeneous(&self) -> Homogeneous {
        Homogeneous::new(
            self.weight * self.point.x,
            self.weight * self.point.y,
            self.weight * self.point.z,
            self.weight,
        )
    }

    /// Convert from homogeneous coordinates.
    pub fn from_homogeneous(h: Homogeneous) -> Self {
        let w = h[3];
        if w.abs() < 1e-30 {
            Self {
                point: Point3::origin(),
                weight: 0.0,
            }
        } else {
            Self {
                point: Point3::new(h[0] / w, h[1] / w, h[2] / w),
                weight: w,
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_span() {
        let knots = vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0];
        // 4 control points, degree 2, n=3
        assert_eq!(find_span(&knots, 3, 2, 0.0), 2);
        assert_eq!(find_span(&knots, 3, 2, 0.25), 2);
        assert_eq!(find_span(&knots, 3, 2, 0.5), 3);
        assert_eq!(find_span(&knots, 3, 2, 1.0), 3); // end of domain
    }

    #[test]
    fn test_find_span_multiple_interior_knot() {
        let knots = vec![0.0, 0.0, 0.0, 0.5, 0.5, 1.0, 1.0, 1.0];
        assert_eq!(find_span(&knots, 4, 2, 0.49), 2);
        assert_eq!(find_span(&knots, 4, 2, 0.5), 4);
        assert_eq!(find_span(&knots, 4, 2, 1.0), 4);
    }

    #[test]
    fn test_basis_partition_of_unity() {
        // Basis functions should sum to 1 at any parameter value
        let knots = vec![0.0, 0.0, 0.0, 0.25, 0.5, 0.75, 1.0, 1.0, 1.0];
        let degree = 2;
        let n = 5; // 6 control points, n = last index

        for i in 0..=20 {
            let t = i as f64 / 20.0;
            let span = find_span(&knots, n, degree, t);
            let basis = basis_functions(&knots, span, degree, t);
            let sum: f64 = basis.iter().sum();
            assert!(
                (sum - 1.0).abs() < 1e-10,
                "partition of unity failed at t={}: sum={}",
                t,
                sum
            );
        }
    }

    #[test]
    fn test_basis_derivatives_sum_to_zero() {
        let knots = vec![0.0, 0.0, 0.0, 0.0, 0.3, 0.6, 1.0, 1.0, 1.0, 1.0];
        let degree = 3;
        let n = 5;
        for i in 0..=10 {
            let t = i as f64 / 10.0;
            let span = find_span(&knots, n, degree, t);
            let ders = basis_function_derivatives(&knots, span, degree, t, 2);
            let d1: f64 = ders[1].iter().sum();
            let d2: f64 = ders[2].iter().sum();
            assert!(d1.abs() < 1e-9, "first derivatives at t={}: {}", t, d1);
            assert!(d2.abs() < 1e-8, "second derivatives at t={}: {}", t, d2);
        }
    }

    #[test]
    fn test_basis_derivative_matches_finite_difference() {
        let knots = vec![0.0, 0.0, 0.0, 0.4, 1.0, 1.0, 1.0];
        let degree = 2;
        let n = 3;
        let t = 0.6;
        let h = 1e-6;
        let span = find_span(&knots, n, degree, t);
        let ders = basis_function_derivatives(&knots, span, degree, t, 1);
        let lo = basis_functions(&knots, span, degree, t - h);
        let hi = basis_functions(&knots, span, degree, t + h);
        for j in 0..=degree {
            let fd = (hi[j] - lo[j]) / (2.0 * h);
            assert!((ders[1][j] - fd).abs() < 1e-5, "basis {}: {} vs {}", j, ders[1][j], fd);
        }
    }

    #[test]
    fn test_distinct_knots() {
        let knots = vec![0.0, 0.0, 0.0, 0.25, 0.25, 0.5, 1.0, 1.0, 1.0];
        assert_eq!(distinct_knots(&knots, 6, 2), vec![0.0, 0.25, 0.5, 1.0]);
    }

    #[test]
    fn test_binomial() {
        assert_eq!(binomial(2, 0), 1.0);
        assert_eq!(binomial(2, 1), 2.0);
        assert_eq!(binomial(4, 2), 6.0);
    }

    #[test]
    fn test_homogeneous_round_trip_keeps_weight() {
        let wp = WeightedPoint::new(Point3::new(1.0, 2.0, 3.0), 0.5);
        let h = wp.to_homogeneous();
        assert!((h[0] - 0.5).abs() < 1e-15);
        let back = WeightedPoint::from_homogeneous(h);
        assert!((back.point - wp.point).norm() < 1e-12);
        assert_eq!(back.weight, 0.5);
    }
}
