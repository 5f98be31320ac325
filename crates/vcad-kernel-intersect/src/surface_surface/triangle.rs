//! Leaf pairs approximated by triangles.

use super::{Context, RawPoint};
use crate::curve_curve::{line_line, LineLine};
use crate::subdivision::Subsurface;
use vcad_kernel_math::{Point2, Point3, Tolerance, Vec3, ZERO_TOLERANCE};

type Triangle = [Point3; 3];

/// Corner indices of the two triangles covering a patch. Corners are
/// `(u0, v0)`, `(u0, v1)`, `(u1, v0)`, `(u1, v1)`.
const SPLIT: [[usize; 3]; 2] = [[0, 1, 2], [1, 2, 3]];

fn corners(node: &Subsurface) -> ([Point2; 4], [Point3; 4]) {
    let (u, v) = (node.u(), node.v());
    let uv = [
        Point2::new(u.min, v.min),
        Point2::new(u.min, v.max),
        Point2::new(u.max, v.min),
        Point2::new(u.max, v.max),
    ];
    let xyz = uv.map(|p| node.surface().point_at(p.x, p.y));
    (uv, xyz)
}

/// Cross the triangles of two leaves and refine the average crossing
/// on both surfaces.
pub(super) fn leaf_point(ctx: &Context<'_>, na: &Subsurface, nb: &Subsurface) -> Option<RawPoint> {
    let (uv_a, xyz_a) = corners(na);
    let (uv_b, xyz_b) = corners(nb);

    let mut n = 0.0;
    let mut point = Vec3::zeros();
    let mut seed_a = Point2::origin().coords;
    let mut seed_b = Point2::origin().coords;
    for ia in SPLIT {
        let ta: Triangle = ia.map(|i| xyz_a[i]);
        for ib in SPLIT {
            let tb: Triangle = ib.map(|i| xyz_b[i]);
            let Some(p) = triangle_intersection(&ta, &tb, ctx.tol) else {
                continue;
            };
            let (Some(wa), Some(wb)) = (barycentric(&ta, &p), barycentric(&tb, &p)) else {
                continue;
            };
            let blend = |w: [f64; 3], idx: [usize; 3], uv: &[Point2; 4]| {
                uv[idx[0]].coords * w[0] + uv[idx[1]].coords * w[1] + uv[idx[2]].coords * w[2]
            };
            seed_a += blend(wa, ia, &uv_a);
            seed_b += blend(wb, ib, &uv_b);
            point += p.coords;
            n += 1.0;
        }
    }
    if n == 0.0 {
        return None;
    }
    let point = Point3::from(point / n);
    let shared = na.intersect(nb, ctx.tol)?;
    if !shared.contains_point(&point, ctx.tol) {
        return None;
    }
    ctx.newton(Point2::from(seed_a / n), Point2::from(seed_b / n))
        .map(RawPoint::from)
}

fn unit_normal(t: &Triangle) -> Option<Vec3> {
    let n = (t[1] - t[0]).cross(&(t[2] - t[0]));
    let len = n.norm();
    (len > ZERO_TOLERANCE).then(|| n / len)
}

/// A point shared by two triangles within `tol`, or `None`.
///
/// Crossing triangles give the middle of the segment they share.
/// Coplanar triangles give the average of their edge crossings and of
/// the corners each holds of the other.
fn triangle_intersection(t1: &Triangle, t2: &Triangle, tol: f64) -> Option<Point3> {
    let n1 = unit_normal(t1)?;
    let n2 = unit_normal(t2)?;
    let d1 = n1.dot(&t1[0].coords);
    let d2 = n2.dot(&t2[0].coords);
    let s2 = t2.map(|p| n1.dot(&p.coords) - d1);
    let s1 = t1.map(|p| n2.dot(&p.coords) - d2);

    if Tolerance::DEFAULT.parallel(&n1, &n2) {
        if s2.iter().all(|s| s.abs() <= tol) {
            return coplanar(t1, t2, tol);
        }
        return None;
    }
    let one_side = |s: &[f64; 3]| s.iter().all(|&x| x > tol) || s.iter().all(|&x| x < -tol);
    if one_side(&s1) || one_side(&s2) {
        return None;
    }

    let dir = n1.cross(&n2).normalize();
    let c = n1.dot(&n2);
    let origin = Point3::from(((d1 - d2 * c) * n1 + (d2 - d1 * c) * n2) / (1.0 - c * c));
    let (lo1, hi1) = span_on_line(t1, &s1, &origin, &dir, tol)?;
    let (lo2, hi2) = span_on_line(t2, &s2, &origin, &dir, tol)?;
    let (lo, hi) = (lo1.max(lo2), hi1.min(hi2));
    if lo > hi + tol {
        return None;
    }
    Some(origin + dir * (0.5 * (lo + hi)))
}

/// Range of the line `origin + s·dir` covered by a triangle whose
/// corners lie at signed distances `s` from the other plane.
fn span_on_line(t: &Triangle, s: &[f64; 3], origin: &Point3, dir: &Vec3, tol: f64) -> Option<(f64, f64)> {
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    let mut add = |p: Point3| {
        let x = (p - origin).dot(dir);
        lo = lo.min(x);
        hi = hi.max(x);
    };
    for i in 0..3 {
        let j = (i + 1) % 3;
        if s[i].abs() <= tol {
            add(t[i]);
        }
        if (s[i] > tol && s[j] < -tol) || (s[i] < -tol && s[j] > tol) {
            let f = s[i] / (s[i] - s[j]);
            add(t[i] + (t[j] - t[i]) * f);
        }
    }
    (lo <= hi).then_some((lo, hi))
}

fn coplanar(t1: &Triangle, t2: &Triangle, tol: f64) -> Option<Point3> {
    let mut sum = Vec3::zeros();
    let mut n = 0.0;
    for i in 0..3 {
        let (a0, a1) = (t1[i], t1[(i + 1) % 3]);
        for j in 0..3 {
            let (b0, b1) = (t2[j], t2[(j + 1) % 3]);
            let at = |s: f64| (a0 + (a1 - a0) * s).coords;
            match line_line(&a0, &a1, &b0, &b1, tol) {
                LineLine::Disjoint => continue,
                LineLine::Point(s, _) => sum += at(s),
                LineLine::Overlap([s0, s1], _) => sum += at(0.5 * (s0 + s1)),
            }
            n += 1.0;
        }
    }
    for (tri, other) in [(t1, t2), (t2, t1)] {
        for p in other {
            if barycentric(tri, p).is_some_and(|w| w.iter().all(|&x| x >= 0.0)) {
                sum += p.coords;
                n += 1.0;
            }
        }
    }
    (n > 0.0).then(|| Point3::from(sum / n))
}

/// Barycentric weights of the projection of `p` onto the plane of `t`.
fn barycentric(t: &Triangle, p: &Point3) -> Option<[f64; 3]> {
    let e0 = t[1] - t[0];
    let e1 = t[2] - t[0];
    let e2 = p - t[0];
    let (d00, d01, d11) = (e0.dot(&e0), e0.dot(&e1), e1.dot(&e1));
    let (d20, d21) = (e2.dot(&e0), e2.dot(&e1));
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() <= ZERO_TOLERANCE * d00 * d11 {
        return None;
    }
    let v = (d11 * d20 - d01 * d21) / denom;
    let w = (d00 * d21 - d01 * d20) / denom;
    Some([1.0 - v - w, v, w])
}
