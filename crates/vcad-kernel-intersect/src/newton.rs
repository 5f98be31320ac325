//! Newton–Raphson refinement of intersection candidates.
//!
//! Every solver iterates at most [`MAX_NEWTON_ITERATIONS`] times, keeps
//! its parameters inside the given domains, and accepts the result only
//! if the refined points lie within the tolerance of each other. A
//! singular step ends the iteration early; the last iterate is still
//! tested.

use crate::MAX_NEWTON_ITERATIONS;
use nalgebra::{Matrix2, Matrix3, Matrix3x4, Vector2, Vector3, Vector4};
use vcad_kernel_math::solve::{pseudo_inverse_3x4, solve_2x2, solve_3x3};
use vcad_kernel_math::{Interval, Point2, Point3, ZERO_TOLERANCE};
use vcad_kernel_nurbs::{NurbsCurve, NurbsSurface};

/// Parameter steps below this fraction of the domain count as converged.
const STEP_TOLERANCE: f64 = 1e-14;

/// Closest point on `curve` to `target`, starting from `t`.
pub(crate) fn point_curve(
    curve: &NurbsCurve,
    domain: &Interval,
    target: &Point3,
    t: f64,
    tol: f64,
) -> Option<(f64, Point3)> {
    let mut t = domain.clamp(t);
    let eps = STEP_TOLERANCE * domain.length().max(1.0);
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let (p, d1, d2) = curve.ev2der(t);
        let diff = p - target;
        if diff.norm() <= ZERO_TOLERANCE {
            break;
        }
        let f = diff.dot(&d1);
        let df = diff.dot(&d2) + d1.dot(&d1);
        if df.abs() <= ZERO_TOLERANCE {
            break;
        }
        let next = domain.clamp(t - f / df);
        let done = (next - t).abs() <= eps;
        t = next;
        if done {
            break;
        }
    }
    accept_curve(curve, target, t, tol)
}

fn accept_curve(curve: &NurbsCurve, target: &Point3, t: f64, tol: f64) -> Option<(f64, Point3)> {
    if t.is_nan() {
        return None;
    }
    let p = curve.point_at(t);
    ((p - target).norm() <= tol).then_some((t, p))
}

/// Closest point on `surface` to `target`, starting from `uv`.
///
/// Where the second-order system is singular (a point on the axis of a
/// pole, say) the step falls back to the first-order normal equations.
pub(crate) fn point_surface(
    surface: &NurbsSurface,
    u_dom: &Interval,
    v_dom: &Interval,
    target: &Point3,
    uv: Point2,
    tol: f64,
) -> Option<(Point2, Point3)> {
    let (mut u, mut v) = (u_dom.clamp(uv.x), v_dom.clamp(uv.y));
    let eps = STEP_TOLERANCE * u_dom.length().max(v_dom.length()).max(1.0);
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let d = surface.derivatives(u, v);
        let diff = d.point - target;
        if diff.norm() <= ZERO_TOLERANCE {
            break;
        }
        let f = Vector2::new(diff.dot(&d.du), diff.dot(&d.dv));
        let suv = d.du.dot(&d.dv);
        let hessian = Matrix2::new(
            d.du.dot(&d.du) + diff.dot(&d.duu),
            suv + diff.dot(&d.duv),
            suv + diff.dot(&d.duv),
            d.dv.dot(&d.dv) + diff.dot(&d.dvv),
        );
        let gram = Matrix2::new(d.du.dot(&d.du), suv, suv, d.dv.dot(&d.dv));
        let Some(step) = solve_2x2(&hessian, &-f).or_else(|| solve_2x2(&gram, &-f)) else {
            break;
        };
        let nu = u_dom.clamp(u + step.x);
        let nv = v_dom.clamp(v + step.y);
        let done = (nu - u).abs() <= eps && (nv - v).abs() <= eps;
        u = nu;
        v = nv;
        if done {
            break;
        }
    }
    if u.is_nan() || v.is_nan() {
        return None;
    }
    let p = surface.point_at(u, v);
    ((p - target).norm() <= tol).then_some((Point2::new(u, v), p))
}

/// A refined curve/curve intersection.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CurveCurveRoot {
    pub ta: f64,
    pub tb: f64,
    pub a: Point3,
    pub b: Point3,
}

/// Solve `A(ta) = B(tb)` starting from `(ta, tb)`.
///
/// Each step solves the 2x2 system formed by the pair of coordinate
/// rows with the largest Jacobian determinant.
pub(crate) fn curve_curve(
    a: &NurbsCurve,
    a_dom: &Interval,
    b: &NurbsCurve,
    b_dom: &Interval,
    ta: f64,
    tb: f64,
    tol: f64,
) -> Option<CurveCurveRoot> {
    let (mut ta, mut tb) = (a_dom.clamp(ta), b_dom.clamp(tb));
    let eps = STEP_TOLERANCE * a_dom.length().max(b_dom.length()).max(1.0);
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let (pa, da) = a.ev1der(ta);
        let (pb, db) = b.ev1der(tb);
        let f = pa - pb;
        if f.norm() <= ZERO_TOLERANCE {
            break;
        }
        let Some(step) = best_row_pair_step(&f, &da, &db).or_else(|| project_step(&f, &db)) else {
            break;
        };
        let na = a_dom.clamp(ta + step.x);
        let nb = b_dom.clamp(tb + step.y);
        let done = (na - ta).abs() <= eps && (nb - tb).abs() <= eps;
        ta = na;
        tb = nb;
        if done {
            break;
        }
    }
    if ta.is_nan() || tb.is_nan() {
        return None;
    }
    let pa = a.point_at(ta);
    let pb = b.point_at(tb);
    ((pa - pb).norm() <= tol).then_some(CurveCurveRoot { ta, tb, a: pa, b: pb })
}

fn best_row_pair_step(
    f: &Vector3<f64>,
    da: &Vector3<f64>,
    db: &Vector3<f64>,
) -> Option<Vector2<f64>> {
    const ROWS: [(usize, usize); 3] = [(0, 1), (0, 2), (1, 2)];
    let (i, j) = ROWS.into_iter().max_by(|&(i0, j0), &(i1, j1)| {
        let d0 = (da[i0] * -db[j0] + db[i0] * da[j0]).abs();
        let d1 = (da[i1] * -db[j1] + db[i1] * da[j1]).abs();
        d0.total_cmp(&d1)
    })?;
    let jac = Matrix2::new(da[i], -db[i], da[j], -db[j]);
    solve_2x2(&jac, &Vector2::new(-f[i], -f[j]))
}

/// With parallel tangents only `tb` moves, toward the foot of `A(ta)`
/// on B.
fn project_step(f: &Vector3<f64>, db: &Vector3<f64>) -> Option<Vector2<f64>> {
    let len2 = db.norm_squared();
    (len2 > ZERO_TOLERANCE * ZERO_TOLERANCE).then(|| Vector2::new(0.0, f.dot(db) / len2))
}

/// A refined curve/surface intersection.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CurveSurfaceRoot {
    pub t: f64,
    pub uv: Point2,
    pub a: Point3,
    pub b: Point3,
}

/// Solve `C(t) = S(u, v)` starting from `(t, uv)`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn curve_surface(
    curve: &NurbsCurve,
    t_dom: &Interval,
    surface: &NurbsSurface,
    u_dom: &Interval,
    v_dom: &Interval,
    t: f64,
    uv: Point2,
    tol: f64,
) -> Option<CurveSurfaceRoot> {
    let (mut t, mut u, mut v) = (t_dom.clamp(t), u_dom.clamp(uv.x), v_dom.clamp(uv.y));
    let eps = STEP_TOLERANCE * t_dom.length().max(u_dom.length()).max(v_dom.length()).max(1.0);
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let (pc, dc) = curve.ev1der(t);
        let (ps, su, sv) = surface.ev1der(u, v);
        let f = pc - ps;
        if f.norm() <= ZERO_TOLERANCE {
            break;
        }
        let jac = Matrix3::from_columns(&[dc, -su, -sv]);
        let Some(step) = solve_3x3(&jac, &-f) else {
            break;
        };
        let nt = t_dom.clamp(t + step.x);
        let nu = u_dom.clamp(u + step.y);
        let nv = v_dom.clamp(v + step.z);
        let done = (nt - t).abs() <= eps && (nu - u).abs() <= eps && (nv - v).abs() <= eps;
        t = nt;
        u = nu;
        v = nv;
        if done {
            break;
        }
    }
    if t.is_nan() || u.is_nan() || v.is_nan() {
        return None;
    }
    let a = curve.point_at(t);
    let b = surface.point_at(u, v);
    ((a - b).norm() <= tol).then_some(CurveSurfaceRoot {
        t,
        uv: Point2::new(u, v),
        a,
        b,
    })
}

/// A refined surface/surface intersection point.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SurfaceSurfaceRoot {
    pub uv_a: Point2,
    pub uv_b: Point2,
    pub point: Point3,
}

/// Parameter domains of one surface operand.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Rect {
    pub u: Interval,
    pub v: Interval,
}

impl Rect {
    pub fn clamp(&self, uv: Point2) -> Point2 {
        Point2::new(self.u.clamp(uv.x), self.v.clamp(uv.y))
    }
}

/// Move `(uv_a, uv_b)` onto the intersection of two surfaces.
///
/// The system has four unknowns and three equations; each step takes the
/// minimum-norm update through the pseudo-inverse of the Jacobian.
pub(crate) fn surface_surface(
    a: &NurbsSurface,
    a_rect: &Rect,
    b: &NurbsSurface,
    b_rect: &Rect,
    uv_a: Point2,
    uv_b: Point2,
    tol: f64,
) -> Option<SurfaceSurfaceRoot> {
    let mut x = Vector4::new(uv_a.x, uv_a.y, uv_b.x, uv_b.y);
    let clamp = |x: Vector4<f64>| {
        let a = a_rect.clamp(Point2::new(x[0], x[1]));
        let b = b_rect.clamp(Point2::new(x[2], x[3]));
        Vector4::new(a.x, a.y, b.x, b.y)
    };
    x = clamp(x);
    let eps = STEP_TOLERANCE
        * a_rect
            .u
            .length()
            .max(a_rect.v.length())
            .max(b_rect.u.length())
            .max(b_rect.v.length())
            .max(1.0);
    for _ in 0..MAX_NEWTON_ITERATIONS {
        let (pa, sau, sav) = a.ev1der(x[0], x[1]);
        let (pb, sbu, sbv) = b.ev1der(x[2], x[3]);
        let f = pa - pb;
        if f.norm() <= ZERO_TOLERANCE {
            break;
        }
        let jac = Matrix3x4::from_columns(&[sau, sav, -sbu, -sbv]);
        let Some(pinv) = pseudo_inverse_3x4(&jac) else {
            break;
        };
        let next = clamp(x - pinv * f);
        let done = (next - x).amax() <= eps;
        x = next;
        if done {
            break;
        }
    }
    if x.iter().any(|c| c.is_nan()) {
        return None;
    }
    let pa = a.point_at(x[0], x[1]);
    let pb = b.point_at(x[2], x[3]);
    ((pa - pb).norm() <= tol).then(|| SurfaceSurfaceRoot {
        uv_a: Point2::new(x[0], x[1]),
        uv_b: Point2::new(x[2], x[3]),
        point: nalgebra::center(&pa, &pb),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcad_kernel_math::Vec3;
    use vcad_kernel_nurbs::Direction;

    fn rect(surface: &NurbsSurface) -> Rect {
        Rect {
            u: surface.domain(Direction::U),
            v: surface.domain(Direction::V),
        }
    }

    #[test]
    fn test_point_curve_on_circle() {
        let circle = NurbsCurve::circle(Point3::origin(), 1.0);
        let dom = circle.domain();
        let target = Point3::new(0.0, 1.0, 0.0);
        let (t, p) = point_curve(&circle, &dom, &target, 0.2, 1e-6).unwrap();
        assert!((t - 0.25).abs() < 1e-6, "t = {}", t);
        assert!((p - target).norm() < 1e-6);
    }

    #[test]
    fn test_point_curve_rejects_far_point() {
        let line = NurbsCurve::line(Point3::origin(), Point3::new(1.0, 0.0, 0.0));
        let dom = line.domain();
        let target = Point3::new(0.5, 0.1, 0.0);
        assert!(point_curve(&line, &dom, &target, 0.0, 0.001).is_none());
        let (t, _) = point_curve(&line, &dom, &target, 0.0, 0.2).unwrap();
        assert!((t - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_point_surface_at_pole() {
        let sphere = NurbsSurface::sphere(Point3::origin(), 1.0);
        let rect = rect(&sphere);
        let pole = sphere.point_at(0.3, rect.v.min);
        let start = Point2::new(0.3, rect.v.min + 0.01);
        let (uv, p) = point_surface(&sphere, &rect.u, &rect.v, &pole, start, 1e-6).unwrap();
        assert!((p - pole).norm() < 1e-6);
        assert!((uv.y - rect.v.min).abs() < 1e-3, "v = {}", uv.y);
    }

    #[test]
    fn test_curve_curve_crossing() {
        let a = NurbsCurve::line(Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 2.0, 0.0));
        let b = NurbsCurve::circle(Point3::new(2.0, 0.0, 0.0), 2.0);
        let root = curve_curve(&a, &a.domain(), &b, &b.domain(), 0.9, 0.27, 1e-9).unwrap();
        assert!((root.a - root.b).norm() < 1e-9);
        assert!((root.a - Point3::new(2.0, 2.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn test_curve_surface_crossing() {
        let plane = NurbsSurface::bilinear(
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(-1.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        );
        let line = NurbsCurve::line(Point3::new(0.2, 0.1, -1.0), Point3::new(0.2, 0.1, 3.0));
        let rect = rect(&plane);
        let root = curve_surface(
            &line,
            &line.domain(),
            &plane,
            &rect.u,
            &rect.v,
            0.9,
            Point2::new(0.5, 0.5),
            1e-9,
        )
        .unwrap();
        assert!((root.t - 0.25).abs() < 1e-9);
        assert!((root.uv.x - 0.6).abs() < 1e-9);
        assert!((root.uv.y - 0.55).abs() < 1e-9);
    }

    #[test]
    fn test_surface_surface_lands_on_both() {
        let a = NurbsSurface::bilinear(
            Point3::new(-1.0, -1.0, 0.0),
            Point3::new(1.0, -1.0, 0.0),
            Point3::new(-1.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        );
        let sphere = NurbsSurface::sphere(Point3::new(0.0, 0.0, 0.5), 1.0);
        let ra = rect(&a);
        let rb = rect(&sphere);
        let root = surface_surface(
            &a,
            &ra,
            &sphere,
            &rb,
            Point2::new(0.82, 0.73),
            Point2::new(0.1, 0.3),
            1e-8,
        )
        .unwrap();
        assert!(root.point.z.abs() < 1e-8);
        let r = Vec3::new(root.point.x, root.point.y, 0.0).norm();
        assert!((r - 0.75f64.sqrt()).abs() < 1e-6, "r = {}", r);
    }
}
