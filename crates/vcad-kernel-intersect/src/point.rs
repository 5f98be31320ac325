//! Point/point, point/curve and point/surface intersection.

use tracing::warn;

use crate::events::{PointEvent, PointParams};
use crate::newton;
use crate::query::{CurveQuery, SurfaceQuery};
use crate::subdivision::{Subcurve, Subsurface};
use crate::MAX_SUBDIVISION_DEPTH;
use vcad_kernel_math::{Point2, Point3, Tolerance, ZERO_TOLERANCE};

/// Report `a` and `b` as one event if they lie within `tol`.
pub fn intersect_point_point(
    a: &Point3,
    b: &Point3,
    tol: f64,
    events: &mut Vec<PointEvent>,
) -> usize {
    let tol = Tolerance::resolve(tol);
    if (a - b).norm() <= tol {
        events.push(PointEvent::new(*a, *b, PointParams::None));
        1
    } else {
        0
    }
}

/// Find where `point` lies on a curve, within `tol`.
pub fn intersect_point_curve(
    point: &Point3,
    curve: CurveQuery<'_>,
    tol: f64,
    events: &mut Vec<PointEvent>,
) -> usize {
    let tol = Tolerance::resolve(tol);
    let root = match curve.root() {
        Ok(root) => root,
        Err(err) => {
            warn!(%err, "point/curve intersection skipped");
            return 0;
        }
    };
    match point_on_curve(point, &root, tol) {
        Some((t, p)) => {
            events.push(PointEvent::new(*point, p, PointParams::Curve(t)));
            1
        }
        None => 0,
    }
}

/// Find where `point` lies on a surface, within `tol`.
pub fn intersect_point_surface(
    point: &Point3,
    surface: SurfaceQuery<'_>,
    tol: f64,
    events: &mut Vec<PointEvent>,
) -> usize {
    let tol = Tolerance::resolve(tol);
    let root = match surface.root() {
        Ok(root) => root,
        Err(err) => {
            warn!(%err, "point/surface intersection skipped");
            return 0;
        }
    };
    match point_on_surface(point, &root, tol) {
        Some((uv, p)) => {
            events.push(PointEvent::new(*point, p, PointParams::Surface(uv)));
            1
        }
        None => 0,
    }
}

/// Parameter and position of `point` on the curve under `root`.
///
/// Descends to the leaves whose boxes hold the point, starts Newton from
/// the projection onto each leaf chord and returns the first hit.
pub(crate) fn point_on_curve(point: &Point3, root: &Subcurve, tol: f64) -> Option<(f64, Point3)> {
    if !root.is_point_in(point, tol) {
        return None;
    }
    let mut nodes = vec![root];
    for _ in 0..MAX_SUBDIVISION_DEPTH {
        let mut next = Vec::new();
        let mut progressed = false;
        for node in nodes {
            let kids = if node.is_linear() { None } else { node.split() };
            match kids {
                Some(kids) => {
                    progressed = true;
                    next.extend(kids.iter().filter(|k| k.is_point_in(point, tol)));
                }
                None => next.push(node),
            }
        }
        nodes = next;
        if !progressed {
            break;
        }
    }
    let dom = root.domain();
    nodes.into_iter().find_map(|leaf| {
        let p0 = leaf.curve().point_at_start();
        let chord = leaf.curve().point_at_end() - p0;
        let len2 = chord.norm_squared();
        let s = if len2 <= ZERO_TOLERANCE * ZERO_TOLERANCE {
            0.0
        } else {
            ((point - p0).dot(&chord) / len2).clamp(0.0, 1.0)
        };
        let t = leaf.domain().parameter_at(s);
        newton::point_curve(root.curve(), &dom, point, t, tol)
    })
}

/// Parameters and position of `point` on the surface under `root`.
pub(crate) fn point_on_surface(
    point: &Point3,
    root: &Subsurface,
    tol: f64,
) -> Option<(Point2, Point3)> {
    if !root.is_point_in(point, tol) {
        return None;
    }
    let mut nodes = vec![root];
    for _ in 0..MAX_SUBDIVISION_DEPTH {
        let mut next = Vec::new();
        let mut progressed = false;
        for node in nodes {
            let kids = if node.is_planar() { None } else { node.split() };
            match kids {
                Some(kids) => {
                    progressed = true;
                    next.extend(kids.iter().filter(|k| k.is_point_in(point, tol)));
                }
                None => next.push(node),
            }
        }
        nodes = next;
        if !progressed {
            break;
        }
    }
    let (u_dom, v_dom) = (root.u(), root.v());
    nodes.into_iter().find_map(|leaf| {
        let start = Point2::new(leaf.u().mid(), leaf.v().mid());
        newton::point_surface(root.surface(), &u_dom, &v_dom, point, start, tol)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcad_kernel_math::Interval;
    use vcad_kernel_nurbs::{Direction, NurbsCurve, NurbsSurface};

    #[test]
    fn test_point_point() {
        let mut events = Vec::new();
        let a = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(intersect_point_point(&a, &Point3::new(1.0, 2.0, 3.0005), 0.0, &mut events), 1);
        assert_eq!(intersect_point_point(&a, &Point3::new(1.0, 2.0, 3.1), 0.0, &mut events), 0);
        assert_eq!(events.len(), 1);
        assert!((events[0].radius - 0.00025).abs() < 1e-12);
    }

    #[test]
    fn test_point_curve_on_circle() {
        let circle = NurbsCurve::circle(Point3::origin(), 2.0);
        let mut events = vec![PointEvent::new(Point3::origin(), Point3::origin(), PointParams::None)];
        let p = Point3::new(-2.0f64.sqrt(), 2.0f64.sqrt(), 0.0);
        let n = intersect_point_curve(&p, CurveQuery::new(&circle), 0.001, &mut events);
        assert_eq!(n, 1);
        assert_eq!(events.len(), 2);
        let PointParams::Curve(t) = events[1].params else {
            panic!("expected curve parameters");
        };
        assert!((circle.point_at(t) - p).norm() < 0.001);
        assert!((t - 0.375).abs() < 1e-3, "t = {}", t);
    }

    #[test]
    fn test_point_curve_respects_domain() {
        let line = NurbsCurve::line(Point3::origin(), Point3::new(1.0, 0.0, 0.0));
        let mut events = Vec::new();
        let q = CurveQuery::new(&line).with_domain(Interval::new(0.0, 0.5));
        let p = Point3::new(0.75, 0.0, 0.0);
        assert_eq!(intersect_point_curve(&p, q, 0.001, &mut events), 0);
        assert_eq!(intersect_point_curve(&p, CurveQuery::new(&line), 0.001, &mut events), 1);
    }

    #[test]
    fn test_point_curve_reuses_tree() {
        let circle = NurbsCurve::circle(Point3::origin(), 1.0);
        let tree = Subcurve::new(&circle, None).unwrap();
        let mut events = Vec::new();
        for i in 0..8 {
            let t = i as f64 / 8.0;
            let p = circle.point_at(t);
            let q = CurveQuery::new(&circle).with_tree(&tree);
            assert_eq!(intersect_point_curve(&p, q, 0.0, &mut events), 1);
        }
        assert_eq!(events.len(), 8);
    }

    #[test]
    fn test_point_surface_on_sphere() {
        let sphere = NurbsSurface::sphere(Point3::new(1.0, 0.0, 0.0), 2.0);
        let target = sphere.point_at(0.3, 0.6);
        let mut events = Vec::new();
        assert_eq!(intersect_point_surface(&target, SurfaceQuery::new(&sphere), 0.0, &mut events), 1);
        let PointParams::Surface(uv) = events[0].params else {
            panic!("expected surface parameters");
        };
        assert!((sphere.point_at(uv.x, uv.y) - target).norm() < 0.001);
        let off = Point3::new(1.0, 0.0, 0.0);
        assert_eq!(intersect_point_surface(&off, SurfaceQuery::new(&sphere), 0.0, &mut events), 0);
    }

    #[test]
    fn test_point_surface_at_pole() {
        let sphere = NurbsSurface::sphere(Point3::origin(), 1.0);
        let v_min = sphere.domain(Direction::V).min;
        let pole = sphere.point_at(0.0, v_min);
        let mut events = Vec::new();
        assert_eq!(intersect_point_surface(&pole, SurfaceQuery::new(&sphere), 0.0, &mut events), 1);
        let PointParams::Surface(uv) = events[0].params else {
            panic!("expected surface parameters");
        };
        assert!((uv.y - v_min).abs() < 0.01, "v = {}", uv.y);
        assert!(events[0].radius < 0.001);
    }
}
