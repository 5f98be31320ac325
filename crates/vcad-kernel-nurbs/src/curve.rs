//! Rational B-spline curves.

use crate::{
    basis_function_derivatives, binomial, distinct_knots, find_span, validate_knots, Homogeneous,
    WeightedPoint, KNOT_SNAP,
};
use std::f64::consts::FRAC_PI_2;
use vcad_kernel_math::{BoundingBox, Interval, Point3, Transform, Vec3, ZERO_TOLERANCE};

/// A rational B-spline (NURBS) curve in 3D.
///
/// Evaluated by computing a 4D non-rational B-spline in homogeneous
/// coordinates and dividing by the weight. Parameter-space curves are
/// stored the same way with `z = 0`.
#[derive(Debug, Clone, PartialEq)]
pub struct NurbsCurve {
    /// Weighted control points.
    pub control_points: Vec<WeightedPoint>,
    /// Clamped knot vector.
    pub knots: Vec<f64>,
    /// Polynomial degree (at least 1).
    pub degree: usize,
}

impl NurbsCurve {
    /// Create a NURBS curve.
    ///
    /// # Panics
    /// Panics if the knot vector length doesn't match `n + degree + 1`, is
    /// decreasing anywhere, or the degree is zero.
    pub fn new(control_points: Vec<WeightedPoint>, knots: Vec<f64>, degree: usize) -> Self {
        assert!(
            degree >= 1 && validate_knots(&knots, control_points.len(), degree),
            "invalid knot vector: len={} but expected {} (n={}, p={})",
            knots.len(),
            control_points.len() + degree + 1,
            control_points.len(),
            degree
        );
        Self {
            control_points,
            knots,
            degree,
        }
    }

    /// Straight segment from `p0` to `p1` over `[0, 1]`.
    pub fn line(p0: Point3, p1: Point3) -> Self {
        Self::new(
            vec![WeightedPoint::unweighted(p0), WeightedPoint::unweighted(p1)],
            vec![0.0, 0.0, 1.0, 1.0],
            1,
        )
    }

    /// Degree-1 curve through `points` with parameters `0, 1, ..., n-1`.
    ///
    /// # Panics
    /// Panics with fewer than two points.
    pub fn polyline(points: &[Point3]) -> Self {
        let params: Vec<f64> = (0..points.len()).map(|i| i as f64).collect();
        Self::polyline_with_params(points, &params)
    }

    /// Degree-1 curve through `points` at the given increasing parameters.
    ///
    /// # Panics
    /// Panics with fewer than two points or mismatched lengths.
    pub fn polyline_with_params(points: &[Point3], params: &[f64]) -> Self {
        assert!(
            points.len() >= 2 && points.len() == params.len(),
            "polyline needs at least two points with one parameter each"
        );
        let mut knots = Vec::with_capacity(points.len() + 2);
        knots.push(params[0]);
        knots.extend_from_slice(params);
        knots.push(params[params.len() - 1]);
        let cps = points
            .iter()
            .map(|p| WeightedPoint::unweighted(*p))
            .collect();
        Self::new(cps, knots, 1)
    }

    /// Create a NURBS circle in the XY plane.
    ///
    /// A full circle requires 9 control points with degree 2.
    pub fn circle(center: Point3, radius: f64) -> Self {
        let w = 1.0_f64 / 2.0_f64.sqrt(); // cos(45°)
        let r = radius;
        let c = center;

        let pts = vec![
            WeightedPoint::new(Point3::new(c.x + r, c.y, c.z), 1.0),
            WeightedPoint::new(Point3::new(c.x + r, c.y + r, c.z), w),
            WeightedPoint::new(Point3::new(c.x, c.y + r, c.z), 1.0),
            WeightedPoint::new(Point3::new(c.x - r, c.y + r, c.z), w),
            WeightedPoint::new(Point3::new(c.x - r, c.y, c.z), 1.0),
            WeightedPoint::new(Point3::new(c.x - r, c.y - r, c.z), w),
            WeightedPoint::new(Point3::new(c.x, c.y - r, c.z), 1.0),
            WeightedPoint::new(Point3::new(c.x + r, c.y - r, c.z), w),
            WeightedPoint::new(Point3::new(c.x + r, c.y, c.z), 1.0),
        ];

        let knots = vec![
            0.0, 0.0, 0.0, 0.25, 0.25, 0.5, 0.5, 0.75, 0.75, 1.0, 1.0, 1.0,
        ];

        Self::new(pts, knots, 2)
    }

    /// Elliptical arc `center + a·cos θ·x_axis + b·sin θ·y_axis` for
    /// `θ ∈ [theta0, theta1]`, as a quadratic rational curve with one
    /// segment per quarter turn. The domain is `[theta0, theta1]`.
    ///
    /// The axes are expected to be orthonormal.
    pub fn ellipse_arc(
        center: Point3,
        x_axis: &Vec3,
        y_axis: &Vec3,
        a: f64,
        b: f64,
        theta0: f64,
        theta1: f64,
    ) -> Self {
        let sweep = theta1 - theta0;
        let narcs = ((sweep.abs() / FRAC_PI_2) - 1e-9).ceil().clamp(1.0, 8.0) as usize;
        let dtheta = sweep / narcs as f64;
        let w1 = (0.5 * dtheta).cos();
        let map = |x: f64, y: f64| center + x_axis * (a * x) + y_axis * (b * y);

        let mut pts = Vec::with_capacity(2 * narcs + 1);
        pts.push(WeightedPoint::unweighted(map(theta0.cos(), theta0.sin())));
        let mut knots = vec![theta0; 3];
        for i in 0..narcs {
            let ta = theta0 + i as f64 * dtheta;
            let tm = ta + 0.5 * dtheta;
            let tb = if i + 1 == narcs { theta1 } else { ta + dtheta };
            pts.push(WeightedPoint::new(map(tm.cos() / w1, tm.sin() / w1), w1));
            pts.push(WeightedPoint::unweighted(map(tb.cos(), tb.sin())));
            if i + 1 < narcs {
                knots.extend_from_slice(&[tb, tb]);
            }
        }
        knots.extend_from_slice(&[theta1; 3]);
        Self::new(pts, knots, 2)
    }

    /// Index of the last control point.
    fn last(&self) -> usize {
        self.control_points.len() - 1
    }

    /// Parameter domain.
    pub fn domain(&self) -> Interval {
        Interval::new(self.knots[self.degree], self.knots[self.control_points.len()])
    }

    /// Affinely remap the knots so the domain becomes `[t0, t1]`.
    ///
    /// Ignored unless `t0 < t1`.
    pub fn set_domain(&mut self, t0: f64, t1: f64) {
        let dom = self.domain();
        if t0 >= t1 || dom.length() <= 0.0 {
            return;
        }
        let scale = (t1 - t0) / dom.length();
        for k in &mut self.knots {
            *k = t0 + (*k - dom.min) * scale;
        }
        // pin the ends exactly
        let p = self.degree;
        let n = self.control_points.len();
        self.knots[p] = t0;
        self.knots[n] = t1;
    }

    /// Homogeneous derivatives `A^(k)(t)` for `k = 0..=order`.
    fn homogeneous_derivatives(&self, t: f64, order: usize) -> Vec<Homogeneous> {
        let n = self.last();
        let dom = self.domain();
        let t = dom.clamp(t);
        let span = find_span(&self.knots, n, self.degree, t);
        let ders = basis_function_derivatives(&self.knots, span, self.degree, t, order);
        ders.iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .fold(Homogeneous::zeros(), |acc, (j, &b)| {
                        acc + self.control_points[span - self.degree + j].to_homogeneous() * b
                    })
            })
            .collect()
    }

    /// The homogeneous point at `t`, before the weight division.
    pub fn homogeneous_at(&self, t: f64) -> Homogeneous {
        self.homogeneous_derivatives(t, 0)[0]
    }

    /// Evaluate the curve at parameter `t`.
    pub fn point_at(&self, t: f64) -> Point3 {
        let h = self.homogeneous_at(t);
        if h[3].abs() < 1e-30 {
            Point3::origin()
        } else {
            Point3::new(h[0] / h[3], h[1] / h[3], h[2] / h[3])
        }
    }

    /// Curve start point.
    pub fn point_at_start(&self) -> Point3 {
        self.point_at(self.domain().min)
    }

    /// Curve end point.
    pub fn point_at_end(&self) -> Point3 {
        self.point_at(self.domain().max)
    }

    /// Position and derivatives up to `order` at `t`.
    ///
    /// Entry 0 is the position as a vector from the origin; entry `k` is
    /// the exact k-th derivative of the rational curve.
    pub fn derivatives(&self, t: f64, order: usize) -> Vec<Vec3> {
        let aw = self.homogeneous_derivatives(t, order);
        let w0 = aw[0][3];
        let mut ck: Vec<Vec3> = Vec::with_capacity(order + 1);
        if w0.abs() < 1e-30 {
            return vec![Vec3::zeros(); order + 1];
        }
        for k in 0..=order {
            let mut v = aw[k].xyz();
            for i in 1..=k {
                v -= ck[k - i] * (binomial(k, i) * aw[i][3]);
            }
            ck.push(v / w0);
        }
        ck
    }

    /// Point and first derivative.
    pub fn ev1der(&self, t: f64) -> (Point3, Vec3) {
        let d = self.derivatives(t, 1);
        (Point3::from(d[0]), d[1])
    }

    /// Point, first and second derivatives.
    pub fn ev2der(&self, t: f64) -> (Point3, Vec3, Vec3) {
        let d = self.derivatives(t, 2);
        (Point3::from(d[0]), d[1], d[2])
    }

    /// Unit tangent at `t`, or zero where the derivative vanishes.
    pub fn tangent_at(&self, t: f64) -> Vec3 {
        let (_, d1) = self.ev1der(t);
        let len = d1.norm();
        if len <= ZERO_TOLERANCE {
            Vec3::zeros()
        } else {
            d1 / len
        }
    }

    /// Distinct knot values across the domain (span boundaries).
    pub fn span_vector(&self) -> Vec<f64> {
        distinct_knots(&self.knots, self.control_points.len(), self.degree)
    }

    /// Number of non-empty spans.
    pub fn span_count(&self) -> usize {
        self.span_vector().len().saturating_sub(1)
    }

    /// Reverse the direction. The domain is unchanged.
    pub fn reverse(&mut self) {
        let a = self.knots[0];
        let b = self.knots[self.knots.len() - 1];
        self.control_points.reverse();
        self.knots = self.knots.iter().rev().map(|k| a + b - k).collect();
    }

    /// A reversed copy.
    pub fn reversed(&self) -> Self {
        let mut c = self.clone();
        c.reverse();
        c
    }

    /// Insert a knot using Boehm's algorithm (rational version).
    pub fn insert_knot(&self, t: f64) -> Self {
        let n = self.last();
        let p = self.degree;
        let span = find_span(&self.knots, n, p, t);

        let mut new_knots = Vec::with_capacity(self.knots.len() + 1);
        new_knots.extend_from_slice(&self.knots[..=span]);
        new_knots.push(t);
        new_knots.extend_from_slice(&self.knots[span + 1..]);

        // interpolate in homogeneous space
        let mut new_pts = Vec::with_capacity(self.control_points.len() + 1);
        new_pts.extend_from_slice(&self.control_points[..=(span - p)]);
        for i in (span - p + 1)..=span {
            let alpha = (t - self.knots[i]) / (self.knots[i + p] - self.knots[i]);
            let h0 = self.control_points[i - 1].to_homogeneous();
            let h1 = self.control_points[i].to_homogeneous();
            new_pts.push(WeightedPoint::from_homogeneous(h0 * (1.0 - alpha) + h1 * alpha));
        }
        new_pts.extend_from_slice(&self.control_points[span..]);

        Self::new(new_pts, new_knots, p)
    }

    fn knot_multiplicity(&self, t: f64) -> usize {
        self.knots.iter().filter(|&&k| k == t).count()
    }

    /// Snap `t` onto an existing knot if it is within rounding noise of one.
    fn snap_to_knot(&self, t: f64) -> f64 {
        let eps = KNOT_SNAP * self.domain().length().max(1.0);
        self.knots
            .iter()
            .copied()
            .find(|k| (k - t).abs() <= eps)
            .unwrap_or(t)
    }

    /// Split at an interior parameter into two curves whose domains
    /// are `[min, t]` and `[t, max]`.
    ///
    /// Returns `None` if `t` is not strictly inside the domain.
    pub fn split(&self, t: f64) -> Option<(Self, Self)> {
        let t = self.snap_to_knot(t);
        if !t.is_finite() || !self.domain().includes_interior(t) {
            return None;
        }
        let p = self.degree;
        let mut c = self.clone();
        for _ in self.knot_multiplicity(t).min(p)..p {
            c = c.insert_knot(t);
        }
        let first = c.knots.iter().position(|&k| k == t)?;
        let mult = c.knot_multiplicity(t);

        let mut left_knots = c.knots[..first].to_vec();
        left_knots.extend(std::iter::repeat(t).take(p + 1));
        let left = Self::new(c.control_points[..first].to_vec(), left_knots, p);

        let right_start = first + mult - p - 1;
        let mut right_knots = vec![t; p + 1];
        right_knots.extend_from_slice(&c.knots[first + mult..]);
        let right = Self::new(c.control_points[right_start..].to_vec(), right_knots, p);
        Some((left, right))
    }

    /// The piece of the curve over `interval ∩ domain`.
    ///
    /// Returns `None` when the interval is decreasing or misses the domain.
    pub fn sub_curve(&self, interval: &Interval) -> Option<Self> {
        if interval.is_decreasing() {
            return None;
        }
        let dom = self.domain();
        let sub = dom.intersection(interval)?;
        if !sub.is_increasing() {
            return None;
        }
        let mut piece = self.clone();
        if sub.min > dom.min {
            piece = piece.split(sub.min).map(|(_, r)| r).unwrap_or(piece);
        }
        if sub.max < dom.max {
            piece = piece.split(sub.max).map(|(l, _)| l).unwrap_or(piece);
        }
        Some(piece)
    }

    /// Bounding box of the control points. Encloses the curve when all
    /// weights are positive.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.control_points.iter().map(|cp| &cp.point))
    }

    /// True if every control point lies within `tol` of the chord between
    /// the end points and the control points advance along it.
    pub fn is_linear(&self, tol: f64) -> bool {
        let p0 = self.control_points[0].point;
        let p1 = self.control_points[self.last()].point;
        let chord = p1 - p0;
        let len = chord.norm();
        if len <= ZERO_TOLERANCE {
            return false;
        }
        let dir = chord / len;
        let mut furthest = 0.0_f64;
        for cp in &self.control_points {
            let v = cp.point - p0;
            let s = v.dot(&dir);
            if (v - dir * s).norm() > tol || s < furthest - tol {
                return false;
            }
            furthest = furthest.max(s);
        }
        true
    }

    /// True if the curve ends where it starts and is not a single point.
    pub fn is_closed(&self) -> bool {
        self.control_points.len() > 2
            && (self.point_at_start() - self.point_at_end()).norm() <= ZERO_TOLERANCE
            && self.bounding_box().diagonal_length() > ZERO_TOLERANCE
    }

    /// Apply an affine transform to the control points.
    pub fn transform(&self, t: &Transform) -> Self {
        let control_points = self
            .control_points
            .iter()
            .map(|cp| WeightedPoint::new(t.apply_point(&cp.point), cp.weight))
            .collect();
        Self {
            control_points,
            knots: self.knots.clone(),
            degree: self.degree,
        }
    }

    /// Sample points at every span boundary plus `per_span - 1` interior
    /// parameters of each span.
    pub fn sample_spans(&self, per_span: usize) -> Vec<(f64, Point3)> {
        let spans = self.span_vector();
        let per_span = per_span.max(1);
        let mut out = Vec::with_capacity(spans.len() * per_span);
        for w in spans.windows(2) {
            let span = Interval::new(w[0], w[1]);
            for i in 0..per_span {
                let t = span.parameter_at(i as f64 / per_span as f64);
                out.push((t, self.point_at(t)));
            }
        }
        let end = self.domain().max;
        out.push((end, self.point_at(end)));
        out
    }
}

/// Join `b` onto the end of `a`, consuming both.
///
/// The caller guarantees `a` ends where `b` starts. Curves of equal degree
/// are joined exactly by concatenating knot vectors (rescaling `b`'s
/// weights so the shared control point agrees); otherwise both are
/// resampled into one polyline.
pub fn link_curves(a: NurbsCurve, b: NurbsCurve) -> NurbsCurve {
    let a_dom = a.domain();
    let b_dom = b.domain();
    let shift = a_dom.max - b_dom.min;

    if a.degree == b.degree {
        let p = a.degree;
        let w_end = a.control_points[a.last()].weight;
        let w_start = b.control_points[0].weight;
        let scale = if w_start.abs() < 1e-30 {
            1.0
        } else {
            w_end / w_start
        };

        let mut control_points = a.control_points;
        control_points.extend(
            b.control_points[1..]
                .iter()
                .map(|cp| WeightedPoint::new(cp.point, cp.weight * scale)),
        );
        let mut knots = a.knots;
        knots.pop();
        knots.extend(b.knots[p + 1..].iter().map(|k| k + shift));
        return NurbsCurve::new(control_points, knots, p);
    }

    let mut points = Vec::new();
    let mut params = Vec::new();
    for (t, pt) in a.sample_spans(2 * a.degree) {
        points.push(pt);
        params.push(t);
    }
    for (t, pt) in b.sample_spans(2 * b.degree).into_iter().skip(1) {
        points.push(pt);
        params.push(t + shift);
    }
    NurbsCurve::polyline_with_params(&points, &params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn quadratic() -> NurbsCurve {
        let pts = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 2.0, 0.0),
            Point3::new(3.0, 2.0, 1.0),
            Point3::new(4.0, 0.0, 0.0),
        ]
        .into_iter()
        .map(WeightedPoint::unweighted)
        .collect();
        NurbsCurve::new(pts, vec![0.0, 0.0, 0.0, 0.5, 1.0, 1.0, 1.0], 2)
    }

    #[test]
    fn test_line() {
        let line = NurbsCurve::line(Point3::origin(), Point3::new(10.0, 0.0, 0.0));
        let mid = line.point_at(0.5);
        assert!((mid.x - 5.0).abs() < 1e-10);
        assert!(line.is_linear(1e-9));
        assert!(!line.is_closed());
        let (_, d1) = line.ev1der(0.3);
        assert!((d1 - Vec3::new(10.0, 0.0, 0.0)).norm() < 1e-10);
    }

    #[test]
    fn test_nurbs_circle() {
        let circle = NurbsCurve::circle(Point3::origin(), 5.0);
        let dom = circle.domain();
        for i in 0..=20 {
            let t = dom.parameter_at(i as f64 / 20.0);
            let p = circle.point_at(t);
            let r = (p.x * p.x + p.y * p.y).sqrt();
            assert!((r - 5.0).abs() < 1e-8, "radius at t={}: {}", t, r);
            assert!(p.z.abs() < 1e-10);
        }
        assert!(circle.is_closed());
        assert!(!circle.is_linear(0.1));
    }

    #[test]
    fn test_nurbs_circle_specific_points() {
        let circle = NurbsCurve::circle(Point3::origin(), 10.0);
        let p25 = circle.point_at(0.25);
        assert!(p25.x.abs() < 1e-8, "x at 0.25: {}", p25.x);
        assert!((p25.y - 10.0).abs() < 1e-8, "y at 0.25: {}", p25.y);
        let p50 = circle.point_at(0.5);
        assert!((p50.x + 10.0).abs() < 1e-8, "x at 0.5: {}", p50.x);
    }

    #[test]
    fn test_rational_derivatives_match_finite_difference() {
        let circle = NurbsCurve::circle(Point3::new(1.0, 2.0, 0.0), 3.0);
        let h = 1e-5;
        for &t in &[0.1, 0.3, 0.6, 0.9] {
            let (_, d1, d2) = circle.ev2der(t);
            let (_, d1_lo) = circle.ev1der(t - h);
            let (_, d1_hi) = circle.ev1der(t + h);
            let fd1 = (circle.point_at(t + h) - circle.point_at(t - h)) / (2.0 * h);
            let fd2 = (d1_hi - d1_lo) / (2.0 * h);
            assert!((d1 - fd1).norm() < 1e-5 * d1.norm(), "d1 at t={}", t);
            assert!((d2 - fd2).norm() < 1e-4 * d2.norm(), "d2 at t={}", t);
        }
    }

    #[test]
    fn test_circle_tangent_is_perpendicular_to_radius() {
        let circle = NurbsCurve::circle(Point3::origin(), 2.0);
        for &t in &[0.0, 0.2, 0.45, 0.8] {
            let p = circle.point_at(t);
            let tan = circle.tangent_at(t);
            assert!((tan.norm() - 1.0).abs() < 1e-10);
            assert!(tan.dot(&p.coords).abs() < 1e-9);
        }
    }

    #[test]
    fn test_knot_insertion_preserves_shape() {
        let circle = NurbsCurve::circle(Point3::origin(), 5.0);
        let refined = circle.insert_knot(0.125);
        assert_eq!(refined.control_points.len(), circle.control_points.len() + 1);
        for i in 0..=20 {
            let t = i as f64 / 20.0;
            assert!((refined.point_at(t) - circle.point_at(t)).norm() < 1e-9);
        }
    }

    #[test]
    fn test_split_reproduces_parent() {
        let curve = quadratic();
        let (left, right) = curve.split(0.3).unwrap();
        assert!((left.domain().max - 0.3).abs() < 1e-15);
        assert!((right.domain().min - 0.3).abs() < 1e-15);
        for i in 0..=10 {
            let t = 0.3 * i as f64 / 10.0;
            assert!((left.point_at(t) - curve.point_at(t)).norm() < 1e-10);
            let t = 0.3 + 0.7 * i as f64 / 10.0;
            assert!((right.point_at(t) - curve.point_at(t)).norm() < 1e-10);
        }
    }

    #[test]
    fn test_split_at_existing_knot() {
        let circle = NurbsCurve::circle(Point3::origin(), 1.0);
        let (left, right) = circle.split(0.5).unwrap();
        assert!((left.point_at_end() - Point3::new(-1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((right.point_at_start() - Point3::new(-1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((right.point_at(0.75) - circle.point_at(0.75)).norm() < 1e-12);
    }

    #[test]
    fn test_split_outside_domain_fails() {
        let curve = quadratic();
        assert!(curve.split(0.0).is_none());
        assert!(curve.split(1.0).is_none());
        assert!(curve.split(1.5).is_none());
    }

    #[test]
    fn test_sub_curve() {
        let curve = quadratic();
        let sub = curve.sub_curve(&Interval::new(0.2, 0.7)).unwrap();
        assert_eq!(sub.domain(), Interval::new(0.2, 0.7));
        assert!((sub.point_at(0.45) - curve.point_at(0.45)).norm() < 1e-10);
        let whole = curve.sub_curve(&Interval::new(-1.0, 2.0)).unwrap();
        assert_eq!(whole.domain(), curve.domain());
        assert!(curve.sub_curve(&Interval::new(2.0, 3.0)).is_none());
        assert!(curve.sub_curve(&Interval::new(0.7, 0.2)).is_none());
    }

    #[test]
    fn test_bounding_box_encloses_curve() {
        let curve = quadratic();
        let bbox = curve.bounding_box();
        for i in 0..=20 {
            let p = curve.point_at(i as f64 / 20.0);
            assert!(bbox.contains_point(&p, 1e-12));
        }
    }

    #[test]
    fn test_reverse_keeps_domain() {
        let curve = quadratic();
        let rev = curve.reversed();
        assert_eq!(rev.domain(), curve.domain());
        for i in 0..=10 {
            let t = i as f64 / 10.0;
            assert!((rev.point_at(t) - curve.point_at(1.0 - t)).norm() < 1e-10);
        }
    }

    #[test]
    fn test_set_domain() {
        let mut curve = quadratic();
        let before = curve.point_at(0.25);
        curve.set_domain(2.0, 6.0);
        assert_eq!(curve.domain(), Interval::new(2.0, 6.0));
        assert!((curve.point_at(3.0) - before).norm() < 1e-10);
    }

    #[test]
    fn test_polyline() {
        let pts = [
            Point3::origin(),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        let poly = NurbsCurve::polyline(&pts);
        assert_eq!(poly.domain(), Interval::new(0.0, 2.0));
        assert!((poly.point_at(1.5) - Point3::new(1.0, 0.5, 0.0)).norm() < 1e-12);
        assert!(!poly.is_linear(1e-3));
        assert_eq!(poly.span_vector(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_is_linear_rejects_folded_polyline() {
        let pts = [
            Point3::origin(),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(3.0, 0.0, 0.0),
        ];
        assert!(!NurbsCurve::polyline(&pts).is_linear(1e-3));
    }

    #[test]
    fn test_ellipse_arc() {
        let arc = NurbsCurve::ellipse_arc(
            Point3::new(1.0, 1.0, 0.0),
            &Vec3::x(),
            &Vec3::y(),
            3.0,
            2.0,
            0.25 * PI,
            1.75 * PI,
        );
        let dom = arc.domain();
        assert!((dom.min - 0.25 * PI).abs() < 1e-12);
        assert!((dom.max - 1.75 * PI).abs() < 1e-12);
        for i in 0..=30 {
            let p = arc.point_at(dom.parameter_at(i as f64 / 30.0));
            let x = (p.x - 1.0) / 3.0;
            let y = (p.y - 1.0) / 2.0;
            assert!((x * x + y * y - 1.0).abs() < 1e-9);
        }
        let start = arc.point_at_start();
        let expected = Point3::new(1.0 + 3.0 * (0.25 * PI).cos(), 1.0 + 2.0 * (0.25 * PI).sin(), 0.0);
        assert!((start - expected).norm() < 1e-12);
    }

    #[test]
    fn test_link_curves_same_degree() {
        let a = NurbsCurve::line(Point3::origin(), Point3::new(1.0, 0.0, 0.0));
        let b = NurbsCurve::line(Point3::new(1.0, 0.0, 0.0), Point3::new(1.0, 1.0, 0.0));
        let joined = link_curves(a, b);
        assert_eq!(joined.domain(), Interval::new(0.0, 2.0));
        assert_eq!(joined.control_points.len(), 3);
        assert!((joined.point_at(1.5) - Point3::new(1.0, 0.5, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_link_curves_rescales_weights() {
        let circle = NurbsCurve::circle(Point3::origin(), 1.0);
        let (a, b) = circle.split(0.3).unwrap();
        let joined = link_curves(a, b);
        for i in 0..=20 {
            let t = i as f64 / 20.0;
            assert!((joined.point_at(t) - circle.point_at(t)).norm() < 1e-10);
        }
    }

    #[test]
    fn test_link_curves_mixed_degree() {
        let circle = NurbsCurve::circle(Point3::origin(), 1.0);
        let (arc, _) = circle.split(0.25).unwrap();
        let tail = NurbsCurve::line(Point3::new(0.0, 1.0, 0.0), Point3::new(-1.0, 1.0, 0.0));
        let joined = link_curves(arc, tail);
        assert_eq!(joined.degree, 1);
        assert!((joined.point_at_start() - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((joined.point_at_end() - Point3::new(-1.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_transform() {
        let line = NurbsCurve::line(Point3::origin(), Point3::new(1.0, 0.0, 0.0));
        let moved = line.transform(&Transform::translation(0.0, 0.0, 2.0));
        assert!((moved.point_at(0.5) - Point3::new(0.5, 0.0, 2.0)).norm() < 1e-12);
    }
}
