//! Rational tensor-product surfaces.

use crate::{
    basis_function_derivatives, binomial, distinct_knots, find_span, validate_knots, Homogeneous,
    NurbsCurve, WeightedPoint,
};
use vcad_kernel_math::{BoundingBox, Interval, Point3, Transform, Vec3, ZERO_TOLERANCE};

/// A surface parameter direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// First parameter.
    U,
    /// Second parameter.
    V,
}

impl Direction {
    /// The other direction.
    pub fn other(self) -> Self {
        match self {
            Direction::U => Direction::V,
            Direction::V => Direction::U,
        }
    }
}

/// Position and partial derivatives up to second order.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceDerivatives {
    /// S(u, v).
    pub point: Point3,
    /// ∂S/∂u.
    pub du: Vec3,
    /// ∂S/∂v.
    pub dv: Vec3,
    /// ∂²S/∂u².
    pub duu: Vec3,
    /// ∂²S/∂u∂v.
    pub duv: Vec3,
    /// ∂²S/∂v².
    pub dvv: Vec3,
}

/// A rational tensor-product NURBS surface.
#[derive(Debug, Clone)]
pub struct NurbsSurface {
    /// Weighted control points in row-major order (`v_idx * n_u + u_idx`).
    pub control_points: Vec<WeightedPoint>,
    /// Number of control points in u.
    pub n_u: usize,
    /// Number of control points in v.
    pub n_v: usize,
    /// Knot vector in u.
    pub knots_u: Vec<f64>,
    /// Knot vector in v.
    pub knots_v: Vec<f64>,
    /// Degree in u.
    pub degree_u: usize,
    /// Degree in v.
    pub degree_v: usize,
}

impl NurbsSurface {
    /// Create a NURBS surface.
    ///
    /// # Panics
    /// Panics if the control net size or either knot vector is inconsistent.
    pub fn new(
        control_points: Vec<WeightedPoint>,
        n_u: usize,
        n_v: usize,
        knots_u: Vec<f64>,
        knots_v: Vec<f64>,
        degree_u: usize,
        degree_v: usize,
    ) -> Self {
        assert_eq!(control_points.len(), n_u * n_v);
        assert!(degree_u >= 1 && validate_knots(&knots_u, n_u, degree_u));
        assert!(degree_v >= 1 && validate_knots(&knots_v, n_v, degree_v));
        Self {
            control_points,
            n_u,
            n_v,
            knots_u,
            knots_v,
            degree_u,
            degree_v,
        }
    }

    /// Bilinear patch over `[0, 1]²` with `S(0,0) = p00`, `S(1,0) = p10`,
    /// `S(0,1) = p01`, `S(1,1) = p11`.
    pub fn bilinear(p00: Point3, p10: Point3, p01: Point3, p11: Point3) -> Self {
        let pts = [p00, p10, p01, p11]
            .into_iter()
            .map(WeightedPoint::unweighted)
            .collect();
        Self::new(
            pts,
            2,
            2,
            vec![0.0, 0.0, 1.0, 1.0],
            vec![0.0, 0.0, 1.0, 1.0],
            1,
            1,
        )
    }

    /// Sphere as a biquadratic surface of revolution about the z axis.
    ///
    /// `u` runs around the axis (closed), `v` runs from the south pole
    /// (`v = 0`) to the north pole (`v = 1`).
    pub fn sphere(center: Point3, radius: f64) -> Self {
        let w = 1.0_f64 / 2.0_f64.sqrt();
        // unit circle control polygon (x, y, weight)
        let ring = [
            (1.0, 0.0, 1.0),
            (1.0, 1.0, w),
            (0.0, 1.0, 1.0),
            (-1.0, 1.0, w),
            (-1.0, 0.0, 1.0),
            (-1.0, -1.0, w),
            (0.0, -1.0, 1.0),
            (1.0, -1.0, w),
            (1.0, 0.0, 1.0),
        ];
        // half-circle profile (radius, height, weight)
        let profile = [
            (0.0, -1.0, 1.0),
            (1.0, -1.0, w),
            (1.0, 0.0, 1.0),
            (1.0, 1.0, w),
            (0.0, 1.0, 1.0),
        ];
        let mut pts = Vec::with_capacity(ring.len() * profile.len());
        for &(rho, z, wv) in &profile {
            for &(x, y, wu) in &ring {
                pts.push(WeightedPoint::new(
                    Point3::new(
                        center.x + radius * rho * x,
                        center.y + radius * rho * y,
                        center.z + radius * z,
                    ),
                    wu * wv,
                ));
            }
        }
        Self::new(
            pts,
            ring.len(),
            profile.len(),
            vec![
                0.0, 0.0, 0.0, 0.25, 0.25, 0.5, 0.5, 0.75, 0.75, 1.0, 1.0, 1.0,
            ],
            vec![0.0, 0.0, 0.0, 0.5, 0.5, 1.0, 1.0, 1.0],
            2,
            2,
        )
    }

    /// Get a weighted control point at `(u_idx, v_idx)`.
    fn wcp(&self, u_idx: usize, v_idx: usize) -> &WeightedPoint {
        &self.control_points[v_idx * self.n_u + u_idx]
    }

    /// Degree in `dir`.
    pub fn degree(&self, dir: Direction) -> usize {
        match dir {
            Direction::U => self.degree_u,
            Direction::V => self.degree_v,
        }
    }

    fn knots(&self, dir: Direction) -> &[f64] {
        match dir {
            Direction::U => &self.knots_u,
            Direction::V => &self.knots_v,
        }
    }

    fn count(&self, dir: Direction) -> usize {
        match dir {
            Direction::U => self.n_u,
            Direction::V => self.n_v,
        }
    }

    /// Parameter domain in `dir`.
    pub fn domain(&self, dir: Direction) -> Interval {
        let n = self.count(dir);
        let knots = self.knots(dir);
        Interval::new(knots[self.degree(dir)], knots[n])
    }

    /// Homogeneous mixed partials `S^w_{k,l}` for `k + l <= 2`.
    fn homogeneous_derivatives(&self, u: f64, v: f64) -> [[Homogeneous; 3]; 3] {
        let (pu, pv) = (self.degree_u, self.degree_v);
        let u = self.domain(Direction::U).clamp(u);
        let v = self.domain(Direction::V).clamp(v);
        let span_u = find_span(&self.knots_u, self.n_u - 1, pu, u);
        let span_v = find_span(&self.knots_v, self.n_v - 1, pv, v);
        let nu = basis_function_derivatives(&self.knots_u, span_u, pu, u, 2);
        let nv = basis_function_derivatives(&self.knots_v, span_v, pv, v, 2);

        let mut skl = [[Homogeneous::zeros(); 3]; 3];
        for k in 0..=2 {
            for l in 0..=(2 - k) {
                let mut acc = Homogeneous::zeros();
                for (j, &bv) in nv[l].iter().enumerate() {
                    let v_idx = span_v - pv + j;
                    for (i, &bu) in nu[k].iter().enumerate() {
                        let u_idx = span_u - pu + i;
                        acc += self.wcp(u_idx, v_idx).to_homogeneous() * (bu * bv);
                    }
                }
                skl[k][l] = acc;
            }
        }
        skl
    }

    /// Evaluate at `(u, v)`.
    pub fn point_at(&self, u: f64, v: f64) -> Point3 {
        let h = self.homogeneous_derivatives(u, v)[0][0];
        if h[3].abs() < 1e-30 {
            Point3::origin()
        } else {
            Point3::new(h[0] / h[3], h[1] / h[3], h[2] / h[3])
        }
    }

    /// Exact rational position and partials up to second order.
    pub fn derivatives(&self, u: f64, v: f64) -> SurfaceDerivatives {
        let aw = self.homogeneous_derivatives(u, v);
        let w00 = aw[0][0][3];
        let mut s = [[Vec3::zeros(); 3]; 3];
        if w00.abs() >= 1e-30 {
            for k in 0..=2 {
                for l in 0..=(2 - k) {
                    let mut val = aw[k][l].xyz();
                    for j in 1..=l {
                        val -= s[k][l - j] * (binomial(l, j) * aw[0][j][3]);
                    }
                    for i in 1..=k {
                        val -= s[k - i][l] * (binomial(k, i) * aw[i][0][3]);
                        let mut v2 = Vec3::zeros();
                        for j in 1..=l {
                            v2 += s[k - i][l - j] * (binomial(l, j) * aw[i][j][3]);
                        }
                        val -= v2 * binomial(k, i);
                    }
                    s[k][l] = val / w00;
                }
            }
        }
        SurfaceDerivatives {
            point: Point3::from(s[0][0]),
            du: s[1][0],
            dv: s[0][1],
            duu: s[2][0],
            duv: s[1][1],
            dvv: s[0][2],
        }
    }

    /// Point and first partials.
    pub fn ev1der(&self, u: f64, v: f64) -> (Point3, Vec3, Vec3) {
        let d = self.derivatives(u, v);
        (d.point, d.du, d.dv)
    }

    /// Point, first partials and second partials `(Suu, Suv, Svv)`.
    pub fn ev2der(&self, u: f64, v: f64) -> (Point3, Vec3, Vec3, Vec3, Vec3, Vec3) {
        let d = self.derivatives(u, v);
        (d.point, d.du, d.dv, d.duu, d.duv, d.dvv)
    }

    /// Unit normal `Su × Sv` at `(u, v)`.
    ///
    /// At a degenerate point (a pole) the normal is taken a small step
    /// toward the domain interior. `None` if it still vanishes.
    pub fn normal_at(&self, u: f64, v: f64) -> Option<Vec3> {
        let (_, du, dv) = self.ev1der(u, v);
        let n = du.cross(&dv);
        if n.norm() > ZERO_TOLERANCE * (1.0 + du.norm() * dv.norm()) {
            return Some(n.normalize());
        }
        let dom_u = self.domain(Direction::U);
        let dom_v = self.domain(Direction::V);
        let step_u = 1e-6 * dom_u.length() * (dom_u.mid() - u).signum();
        let step_v = 1e-6 * dom_v.length() * (dom_v.mid() - v).signum();
        for (su, sv) in [(0.0, step_v), (step_u, 0.0), (step_u, step_v)] {
            let (_, du, dv) = self.ev1der(dom_u.clamp(u + su), dom_v.clamp(v + sv));
            let n = du.cross(&dv);
            if n.norm() > ZERO_TOLERANCE * (1.0 + du.norm() * dv.norm()) {
                return Some(n.normalize());
            }
        }
        None
    }

    /// Distinct knot values across the domain in `dir`.
    pub fn span_vector(&self, dir: Direction) -> Vec<f64> {
        distinct_knots(self.knots(dir), self.count(dir), self.degree(dir))
    }

    /// The control row running along `dir` at index `idx` of the other
    /// direction, as a curve.
    fn row_curve(&self, dir: Direction, idx: usize) -> NurbsCurve {
        let cps = match dir {
            Direction::U => self.control_points[idx * self.n_u..(idx + 1) * self.n_u].to_vec(),
            Direction::V => (0..self.n_v).map(|j| *self.wcp(idx, j)).collect(),
        };
        NurbsCurve {
            control_points: cps,
            knots: self.knots(dir).to_vec(),
            degree: self.degree(dir),
        }
    }

    /// Rebuild a surface from control rows running along `dir`.
    fn from_rows(&self, dir: Direction, rows: Vec<NurbsCurve>) -> Option<Self> {
        let first = rows.first()?;
        let len = first.control_points.len();
        let knots = first.knots.clone();
        let degree = first.degree;
        let mut control_points = vec![WeightedPoint::unweighted(Point3::origin()); len * rows.len()];
        for (r, row) in rows.iter().enumerate() {
            if row.control_points.len() != len {
                return None;
            }
            for (c, cp) in row.control_points.iter().enumerate() {
                let idx = match dir {
                    Direction::U => r * len + c,
                    Direction::V => c * rows.len() + r,
                };
                control_points[idx] = *cp;
            }
        }
        let mut out = self.clone();
        out.control_points = control_points;
        match dir {
            Direction::U => {
                out.n_u = len;
                out.knots_u = knots;
                out.degree_u = degree;
            }
            Direction::V => {
                out.n_v = len;
                out.knots_v = knots;
                out.degree_v = degree;
            }
        }
        Some(out)
    }

    fn rows(&self, dir: Direction) -> impl Iterator<Item = NurbsCurve> + '_ {
        (0..self.count(dir.other())).map(move |idx| self.row_curve(dir, idx))
    }

    /// Split at an interior parameter of `dir`.
    pub fn split(&self, dir: Direction, t: f64) -> Option<(Self, Self)> {
        let mut lo = Vec::with_capacity(self.count(dir.other()));
        let mut hi = Vec::with_capacity(self.count(dir.other()));
        for row in self.rows(dir) {
            let (a, b) = row.split(t)?;
            lo.push(a);
            hi.push(b);
        }
        Some((self.from_rows(dir, lo)?, self.from_rows(dir, hi)?))
    }

    /// The piece of the surface over `u × v`, each clipped to the domain.
    pub fn sub_surface(&self, u: &Interval, v: &Interval) -> Option<Self> {
        let restricted = self.restrict(Direction::U, u)?;
        restricted.restrict(Direction::V, v)
    }

    fn restrict(&self, dir: Direction, interval: &Interval) -> Option<Self> {
        if *interval == self.domain(dir) {
            return Some(self.clone());
        }
        let rows = self
            .rows(dir)
            .map(|row| row.sub_curve(interval))
            .collect::<Option<Vec<_>>>()?;
        self.from_rows(dir, rows)
    }

    /// The isocurve obtained by holding parameter `fixed` at `value`.
    ///
    /// The curve runs along the other direction and is exact.
    pub fn iso_curve(&self, fixed: Direction, value: f64) -> Option<NurbsCurve> {
        if !self.domain(fixed).includes(value) {
            return None;
        }
        let control_points = self
            .rows(fixed)
            .map(|row| WeightedPoint::from_homogeneous(row.homogeneous_at(value)))
            .collect();
        let run = fixed.other();
        Some(NurbsCurve::new(
            control_points,
            self.knots(run).to_vec(),
            self.degree(run),
        ))
    }

    /// Bounding box of the control net. Encloses the surface when all
    /// weights are positive.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_points(self.control_points.iter().map(|cp| &cp.point))
    }

    /// A plane through the control net: origin and unit normal.
    ///
    /// `None` when the control points are collinear or coincident.
    pub fn control_plane(&self) -> Option<(Point3, Vec3)> {
        let p0 = self.control_points[0].point;
        let far = self
            .control_points
            .iter()
            .map(|cp| cp.point - p0)
            .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))?;
        if far.norm() <= ZERO_TOLERANCE {
            return None;
        }
        let normal = self
            .control_points
            .iter()
            .map(|cp| far.cross(&(cp.point - p0)))
            .max_by(|a, b| a.norm_squared().total_cmp(&b.norm_squared()))?;
        if normal.norm() <= ZERO_TOLERANCE * far.norm() {
            return None;
        }
        Some((p0, normal.normalize()))
    }

    /// True if every control point lies within `tol` of one plane.
    ///
    /// Degenerate nets (collinear control points) count as planar.
    pub fn is_planar(&self, tol: f64) -> bool {
        match self.control_plane() {
            Some((origin, normal)) => self
                .control_points
                .iter()
                .all(|cp| (cp.point - origin).dot(&normal).abs() <= tol),
            None => true,
        }
    }

    /// True if the first and last control rows across `dir` coincide.
    pub fn is_closed(&self, dir: Direction) -> bool {
        let n = self.count(dir);
        if n <= 2 {
            return false;
        }
        (0..self.count(dir.other())).all(|k| {
            let (a, b) = match dir {
                Direction::U => (self.wcp(0, k), self.wcp(n - 1, k)),
                Direction::V => (self.wcp(k, 0), self.wcp(k, n - 1)),
            };
            (a.point - b.point).norm() <= ZERO_TOLERANCE
        })
    }

    /// Apply an affine transform to the control net.
    pub fn transform(&self, t: &Transform) -> Self {
        let mut out = self.clone();
        for cp in &mut out.control_points {
            cp.point = t.apply_point(&cp.point);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saddle() -> NurbsSurface {
        let mut pts = Vec::new();
        for j in 0..3 {
            for i in 0..3 {
                let z = if i == 1 && j == 1 { 1.0 } else { 0.0 };
                pts.push(WeightedPoint::new(
                    Point3::new(i as f64, j as f64, z),
                    if i == 1 { 2.0 } else { 1.0 },
                ));
            }
        }
        NurbsSurface::new(
            pts,
            3,
            3,
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            2,
            2,
        )
    }

    #[test]
    fn test_bilinear() {
        let s = NurbsSurface::bilinear(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(10.0, 0.0, 0.0),
            Point3::new(0.0, 10.0, 0.0),
            Point3::new(10.0, 10.0, 0.0),
        );
        let mid = s.point_at(0.5, 0.5);
        assert!((mid - Point3::new(5.0, 5.0, 0.0)).norm() < 1e-10);
        let n = s.normal_at(0.5, 0.5).unwrap();
        assert!((n.z - 1.0).abs() < 1e-12);
        assert!(s.is_planar(1e-9));
        assert!(!s.is_closed(Direction::U));
    }

    #[test]
    fn test_sphere_points_on_radius() {
        let c = Point3::new(1.0, -2.0, 0.5);
        let s = NurbsSurface::sphere(c, 3.0);
        for i in 0..=8 {
            for j in 0..=8 {
                let p = s.point_at(i as f64 / 8.0, j as f64 / 8.0);
                assert!(((p - c).norm() - 3.0).abs() < 1e-9);
            }
        }
        assert!((s.point_at(0.3, 0.0) - Point3::new(1.0, -2.0, -2.5)).norm() < 1e-12);
        assert!((s.point_at(0.3, 1.0) - Point3::new(1.0, -2.0, 3.5)).norm() < 1e-12);
        assert!(s.is_closed(Direction::U));
        assert!(!s.is_closed(Direction::V));
        assert!(!s.is_planar(0.1));
    }

    #[test]
    fn test_sphere_normal_points_outward() {
        let s = NurbsSurface::sphere(Point3::origin(), 2.0);
        for &(u, v) in &[(0.1, 0.3), (0.6, 0.5), (0.9, 0.8)] {
            let p = s.point_at(u, v);
            let n = s.normal_at(u, v).unwrap();
            assert!((n - p.coords / 2.0).norm() < 1e-9, "normal at ({}, {})", u, v);
        }
    }

    #[test]
    fn test_sphere_normal_at_pole() {
        let s = NurbsSurface::sphere(Point3::origin(), 1.0);
        let south = s.normal_at(0.2, 0.0).unwrap();
        assert!((south.z + 1.0).abs() < 1e-4, "south pole normal {:?}", south);
        let north = s.normal_at(0.7, 1.0).unwrap();
        assert!((north.z - 1.0).abs() < 1e-4, "north pole normal {:?}", north);
    }

    #[test]
    fn test_derivatives_match_finite_difference() {
        let s = saddle();
        let (u, v) = (0.37, 0.61);
        let h = 1e-5;
        let d = s.derivatives(u, v);
        let fd_u = (s.point_at(u + h, v) - s.point_at(u - h, v)) / (2.0 * h);
        let fd_v = (s.point_at(u, v + h) - s.point_at(u, v - h)) / (2.0 * h);
        assert!((d.du - fd_u).norm() < 1e-6);
        assert!((d.dv - fd_v).norm() < 1e-6);

        let fd_uu = (s.derivatives(u + h, v).du - s.derivatives(u - h, v).du) / (2.0 * h);
        let fd_uv = (s.derivatives(u, v + h).du - s.derivatives(u, v - h).du) / (2.0 * h);
        let fd_vv = (s.derivatives(u, v + h).dv - s.derivatives(u, v - h).dv) / (2.0 * h);
        assert!((d.duu - fd_uu).norm() < 1e-5);
        assert!((d.duv - fd_uv).norm() < 1e-5);
        assert!((d.dvv - fd_vv).norm() < 1e-5);
    }

    #[test]
    fn test_split_reproduces_parent() {
        let s = NurbsSurface::sphere(Point3::origin(), 1.0);
        let (a, b) = s.split(Direction::U, 0.4).unwrap();
        assert_eq!(a.domain(Direction::U), Interval::new(0.0, 0.4));
        assert_eq!(b.domain(Direction::U), Interval::new(0.4, 1.0));
        assert_eq!(a.domain(Direction::V), s.domain(Direction::V));
        assert!((a.point_at(0.2, 0.3) - s.point_at(0.2, 0.3)).norm() < 1e-10);
        assert!((b.point_at(0.7, 0.6) - s.point_at(0.7, 0.6)).norm() < 1e-10);

        let (c, d) = s.split(Direction::V, 0.25).unwrap();
        assert!((c.point_at(0.8, 0.1) - s.point_at(0.8, 0.1)).norm() < 1e-10);
        assert!((d.point_at(0.8, 0.9) - s.point_at(0.8, 0.9)).norm() < 1e-10);
        assert!(s.split(Direction::V, 1.0).is_none());
    }

    #[test]
    fn test_sub_surface() {
        let s = saddle();
        let sub = s
            .sub_surface(&Interval::new(0.25, 0.75), &Interval::new(0.1, 0.5))
            .unwrap();
        assert_eq!(sub.domain(Direction::U), Interval::new(0.25, 0.75));
        assert_eq!(sub.domain(Direction::V), Interval::new(0.1, 0.5));
        assert!((sub.point_at(0.5, 0.3) - s.point_at(0.5, 0.3)).norm() < 1e-10);
        let bbox = sub.bounding_box();
        assert!(bbox.volume() < s.bounding_box().volume());
    }

    #[test]
    fn test_iso_curve_matches_surface() {
        let s = NurbsSurface::sphere(Point3::origin(), 1.0);
        let along_v = s.iso_curve(Direction::U, 0.3).unwrap();
        let along_u = s.iso_curve(Direction::V, 0.6).unwrap();
        for i in 0..=10 {
            let t = i as f64 / 10.0;
            assert!((along_v.point_at(t) - s.point_at(0.3, t)).norm() < 1e-10);
            assert!((along_u.point_at(t) - s.point_at(t, 0.6)).norm() < 1e-10);
        }
        assert!(along_u.is_closed());
        assert!(s.iso_curve(Direction::U, 1.5).is_none());
    }

    #[test]
    fn test_span_vector() {
        let s = NurbsSurface::sphere(Point3::origin(), 1.0);
        assert_eq!(s.span_vector(Direction::U), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(s.span_vector(Direction::V), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_bounding_box_encloses_surface() {
        let s = saddle();
        let bbox = s.bounding_box();
        for i in 0..=10 {
            for j in 0..=10 {
                let p = s.point_at(i as f64 / 10.0, j as f64 / 10.0);
                assert!(bbox.contains_point(&p, 1e-12));
            }
        }
    }

    #[test]
    fn test_transform() {
        let s = NurbsSurface::sphere(Point3::origin(), 1.0);
        let moved = s.transform(&Transform::translation(5.0, 0.0, 0.0));
        assert!((moved.point_at(0.0, 0.5) - Point3::new(6.0, 0.0, 0.0)).norm() < 1e-12);
    }
}
