//! Simplification of result curves.
//!
//! Intersection curves come out as dense polylines. A polyline that is
//! straight within tolerance is replaced by a line, and one that follows
//! a planar ellipse by an exact rational arc. Both keep the parameter
//! domain of the input, and refitting a fitted curve returns it
//! unchanged.

use std::f64::consts::{PI, TAU};

use nalgebra::{Matrix2, Matrix3, SMatrix, SymmetricEigen, Vector2};
use tracing::trace;

use vcad_kernel_math::solve::solve_2x2;
use vcad_kernel_math::{Point3, Tolerance, Vec3, ZERO_TOLERANCE};
use vcad_kernel_nurbs::NurbsCurve;

/// Fewest spans worth testing for a conic.
const CONIC_MIN_SPANS: usize = 10;

/// Replace `curve` by a line or an elliptical arc when every knot point
/// lies within `tol` of one; otherwise return it as is.
pub fn fit_curve(curve: NurbsCurve, tol: f64) -> NurbsCurve {
    let tol = Tolerance::resolve(tol);
    let dom = curve.domain();
    let samples: Vec<Point3> = curve
        .span_vector()
        .iter()
        .map(|&t| curve.point_at(t))
        .collect();
    if samples.len() < 2 {
        return curve;
    }

    if is_straight(&samples, tol) {
        let mut line = NurbsCurve::line(samples[0], samples[samples.len() - 1]);
        line.set_domain(dom.min, dom.max);
        return line;
    }
    if curve.span_count() >= CONIC_MIN_SPANS {
        if let Some(mut arc) = fit_ellipse(&samples, tol) {
            trace!(spans = curve.span_count(), "polyline fitted by an elliptical arc");
            arc.set_domain(dom.min, dom.max);
            return arc;
        }
    }
    curve
}

/// True if the samples advance along their chord and stay within `tol`
/// of it.
fn is_straight(samples: &[Point3], tol: f64) -> bool {
    let p0 = samples[0];
    let chord = samples[samples.len() - 1] - p0;
    let len2 = chord.norm_squared();
    if len2 <= ZERO_TOLERANCE * ZERO_TOLERANCE {
        return false;
    }
    let slack = tol / len2.sqrt();
    let mut last = 0.0;
    for p in samples {
        let s = (p - p0).dot(&chord) / len2;
        if s < last - slack || (p - (p0 + chord * s)).norm() > tol {
            return false;
        }
        last = s.max(last);
    }
    true
}

fn fit_ellipse(samples: &[Point3], tol: f64) -> Option<NurbsCurve> {
    let n = samples.len() as f64;
    let centroid = Point3::from(samples.iter().map(|p| p.coords).sum::<Vec3>() / n);
    let mut cov = Matrix3::zeros();
    for p in samples {
        let d = p - centroid;
        cov += d * d.transpose();
    }
    let eigen = SymmetricEigen::new(cov);
    let normal: Vec3 = eigen.eigenvectors.column(eigen.eigenvalues.imin()).into();
    let e1: Vec3 = eigen.eigenvectors.column(eigen.eigenvalues.imax()).into();
    let e2 = normal.cross(&e1);
    if samples.iter().any(|p| (p - centroid).dot(&normal).abs() > tol) {
        return None;
    }

    let local: Vec<(f64, f64)> = samples
        .iter()
        .map(|p| ((p - centroid).dot(&e1), (p - centroid).dot(&e2)))
        .collect();
    let scale = local
        .iter()
        .fold(0.0f64, |m, &(x, y)| m.max(x.abs()).max(y.abs()));
    if scale <= ZERO_TOLERANCE {
        return None;
    }

    // Conic through six spread samples, in scaled coordinates.
    let last = local.len() - 1;
    let mut m = SMatrix::<f64, 6, 6>::zeros();
    for k in 0..6 {
        let (x, y) = local[k * last / 6];
        let (x, y) = (x / scale, y / scale);
        m.set_row(
            k,
            &SMatrix::<f64, 1, 6>::from_row_slice(&[x * x, x * y, y * y, x, y, 1.0]),
        );
    }
    let svd = m.svd(false, true);
    let v_t = svd.v_t?;
    let q = v_t.row(svd.singular_values.imin());
    let (a, b, c, d, e, f) = (q[0], q[1], q[2], q[3], q[4], q[5]);
    if b * b - 4.0 * a * c >= 0.0 {
        return None;
    }

    let center = solve_2x2(&Matrix2::new(2.0 * a, b, b, 2.0 * c), &Vector2::new(-d, -e))?;
    let (x0, y0) = (center.x, center.y);
    let f0 = a * x0 * x0 + b * x0 * y0 + c * y0 * y0 + d * x0 + e * y0 + f;
    let theta = 0.5 * b.atan2(a - c);
    let (s, co) = theta.sin_cos();
    let a1 = a * co * co + b * co * s + c * s * s;
    let c1 = a * s * s - b * co * s + c * co * co;
    let r1 = -f0 / a1;
    let r2 = -f0 / c1;
    if !(r1 > 0.0 && r2 > 0.0 && r1.is_finite() && r2.is_finite()) {
        return None;
    }
    let (ra, rb) = (r1.sqrt() * scale, r2.sqrt() * scale);

    let origin = centroid + e1 * (x0 * scale) + e2 * (y0 * scale);
    let x_axis = e1 * co + e2 * s;
    let mut y_axis = e2 * co - e1 * s;

    let mut angles = Vec::with_capacity(samples.len());
    for p in samples {
        let w = p - origin;
        let (x, y) = (w.dot(&x_axis), w.dot(&y_axis));
        let phi = (y / rb).atan2(x / ra);
        if ((x - ra * phi.cos()).powi(2) + (y - rb * phi.sin()).powi(2)).sqrt() > tol {
            return None;
        }
        angles.push(phi);
    }

    let mut unwrapped = Vec::with_capacity(angles.len());
    unwrapped.push(angles[0]);
    let mut sign = 0.0;
    for w in angles.windows(2) {
        let mut step = w[1] - w[0];
        if step > PI {
            step -= TAU;
        } else if step <= -PI {
            step += TAU;
        }
        if step.abs() <= ZERO_TOLERANCE {
            return None;
        }
        if sign == 0.0 {
            sign = step.signum();
        } else if step.signum() != sign {
            return None;
        }
        let prev = unwrapped[unwrapped.len() - 1];
        unwrapped.push(prev + step);
    }
    if sign < 0.0 {
        y_axis = -y_axis;
        for phi in &mut unwrapped {
            *phi = -*phi;
        }
    }
    let (theta0, theta1) = (unwrapped[0], unwrapped[unwrapped.len() - 1]);
    if theta1 - theta0 > TAU + 1e-9 {
        return None;
    }
    Some(NurbsCurve::ellipse_arc(
        origin, &x_axis, &y_axis, ra, rb, theta0, theta1,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use vcad_kernel_math::Interval;

    fn circle_points(center: Point3, r: f64, from: f64, to: f64, n: usize) -> Vec<Point3> {
        (0..n)
            .map(|i| {
                let a = from + (to - from) * i as f64 / (n - 1) as f64;
                center + Vec3::new(r * a.cos(), r * a.sin(), 0.0)
            })
            .collect()
    }

    #[test]
    fn test_collinear_polyline_becomes_line() {
        let pts: Vec<Point3> = (0..6).map(|i| Point3::new(i as f64, 2.0 * i as f64, 0.0)).collect();
        let params: Vec<f64> = (0..6).map(|i| 0.5 + 0.1 * i as f64).collect();
        let fitted = fit_curve(NurbsCurve::polyline_with_params(&pts, &params), 0.001);
        assert_eq!(fitted.control_points.len(), 2);
        assert_eq!(fitted.domain(), Interval::new(0.5, 1.0));
        assert_relative_eq!(fitted.point_at_end(), Point3::new(5.0, 10.0, 0.0), epsilon = 1e-12);

        let again = fit_curve(fitted.clone(), 0.001);
        assert_eq!(again, fitted);
    }

    #[test]
    fn test_backtracking_polyline_is_kept() {
        let pts = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ];
        let fitted = fit_curve(NurbsCurve::polyline(&pts), 0.001);
        assert_eq!(fitted.control_points.len(), 4);
    }

    #[test]
    fn test_full_circle_polyline_becomes_ellipse() {
        let center = Point3::new(1.0, 2.0, 0.5);
        let pts = circle_points(center, 3.0, 0.0, TAU, 17);
        let poly = NurbsCurve::polyline(&pts);
        let fitted = fit_curve(poly.clone(), 0.001);
        assert!(fitted.span_count() <= 4);
        assert_eq!(fitted.domain(), poly.domain());
        for i in 0..40 {
            let t = fitted.domain().parameter_at(i as f64 / 39.0);
            let d = (fitted.point_at(t) - center).norm();
            assert!((d - 3.0).abs() < 0.001, "radius {} at {}", d, t);
        }
        assert!(fitted.is_closed());

        let again = fit_curve(fitted.clone(), 0.001);
        assert_eq!(again, fitted);
    }

    #[test]
    fn test_clockwise_arc_keeps_direction() {
        let center = Point3::origin();
        let pts = circle_points(center, 1.0, PI, 0.0, 12);
        let fitted = fit_curve(NurbsCurve::polyline(&pts), 0.001);
        assert!(fitted.span_count() < CONIC_MIN_SPANS);
        assert_relative_eq!(fitted.point_at_start(), pts[0], epsilon = 1e-6);
        assert_relative_eq!(fitted.point_at_end(), pts[11], epsilon = 1e-6);
        let mid = fitted.point_at(fitted.domain().mid());
        assert!((mid - Point3::new(0.0, 1.0, 0.0)).norm() < 0.001, "{}", mid);
    }

    #[test]
    fn test_wavy_polyline_is_kept() {
        let pts: Vec<Point3> = (0..12)
            .map(|i| {
                let x = i as f64 * 0.5;
                Point3::new(x, (3.0 * x).sin(), 0.0)
            })
            .collect();
        let poly = NurbsCurve::polyline(&pts);
        let fitted = fit_curve(poly.clone(), 0.001);
        assert_eq!(fitted, poly);
    }
}
