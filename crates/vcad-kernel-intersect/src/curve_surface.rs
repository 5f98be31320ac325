//! Curve/surface intersection.
//!
//! The curve and surface trees are descended together with flat nodes
//! left whole. A straight piece against a flat patch is solved against
//! the patch plane; every other pair is refined with Newton from both
//! ends of the curve interval and checked for a coincident range when
//! the two refinements disagree.

use tracing::{debug, warn};

use crate::curve_curve::{line_line, parameter_tolerance, LineLine};
use crate::error::IntersectError;
use crate::events::{CurveSurfaceEvent, XKind};
use crate::fit::fit_curve;
use crate::newton::{self, CurveSurfaceRoot};
use crate::point::point_on_surface;
use crate::query::{CurveQuery, SurfaceQuery, Tolerances};
use crate::subdivision::{candidate_pairs, Subcurve, Subsurface};
use crate::CSI_OVERLAP_TEST_POINTS;
use vcad_kernel_math::{Interval, Point2, Point3, Tolerance, Vec3, ZERO_TOLERANCE};
use vcad_kernel_nurbs::NurbsCurve;

/// Intersect a curve with a surface and append the events to `events`.
///
/// When `overlap2d` is given it receives one entry per appended event:
/// the pre-image of an overlap range in the surface parameter space
/// (`z = 0`, parameterized like the curve), or `None` for a point.
///
/// Returns the number of events appended.
pub fn intersect_curve_surface(
    curve: CurveQuery<'_>,
    surface: SurfaceQuery<'_>,
    tolerances: &Tolerances,
    events: &mut Vec<CurveSurfaceEvent>,
    overlap2d: Option<&mut Vec<Option<NurbsCurve>>>,
) -> usize {
    let tols = tolerances.resolved();
    match curve_surface(curve, surface, &tols) {
        Ok(found) => {
            if let Some(out) = overlap2d {
                out.extend(found.iter().map(|hit| hit.curve_2d(tols.fitting)));
            }
            let n = found.len();
            events.extend(found.into_iter().map(|hit| hit.event));
            n
        }
        Err(err) => {
            warn!(%err, "curve/surface intersection skipped");
            0
        }
    }
}

/// One curve/surface sample: curve parameter, surface parameters and
/// the two witness points.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Sample {
    pub t: f64,
    pub uv: Point2,
    pub a: Point3,
    pub b: Point3,
}

impl From<CurveSurfaceRoot> for Sample {
    fn from(r: CurveSurfaceRoot) -> Self {
        Self {
            t: r.t,
            uv: r.uv,
            a: r.a,
            b: r.b,
        }
    }
}

/// An event together with the samples an overlap was confirmed on.
#[derive(Debug, Clone)]
pub(crate) struct CsxHit {
    pub event: CurveSurfaceEvent,
    /// Increasing in `t`; empty for points.
    pub samples: Vec<Sample>,
}

impl CsxHit {
    fn point(s: Sample) -> Self {
        Self {
            event: CurveSurfaceEvent::point(s.a, s.b, s.t, s.uv),
            samples: Vec::new(),
        }
    }

    fn overlap(mut samples: Vec<Sample>) -> Self {
        samples.sort_by(|x, y| x.t.total_cmp(&y.t));
        let (first, last) = (samples[0], samples[samples.len() - 1]);
        Self {
            event: CurveSurfaceEvent {
                kind: XKind::Overlap,
                a: [first.a, last.a],
                b: [first.b, last.b],
                a_params: [first.t, last.t],
                b_params: [first.uv, last.uv],
            },
            samples,
        }
    }

    fn uv_box(&self) -> (Interval, Interval) {
        let mut u = Interval::new(f64::INFINITY, f64::NEG_INFINITY);
        let mut v = u;
        for s in &self.samples {
            u = Interval::new(u.min.min(s.uv.x), u.max.max(s.uv.x));
            v = Interval::new(v.min.min(s.uv.y), v.max.max(s.uv.y));
        }
        (u, v)
    }

    /// Pre-image of an overlap in the surface parameter space.
    pub fn curve_2d(&self, fit_tol: f64) -> Option<NurbsCurve> {
        if self.event.is_point() {
            return None;
        }
        let mut params: Vec<f64> = Vec::with_capacity(self.samples.len());
        let mut points: Vec<Point3> = Vec::with_capacity(self.samples.len());
        for s in &self.samples {
            if params.last().is_some_and(|&t| s.t <= t) {
                continue;
            }
            params.push(s.t);
            points.push(Point3::new(s.uv.x, s.uv.y, 0.0));
        }
        (points.len() >= 2).then(|| {
            fit_curve(NurbsCurve::polyline_with_params(&points, &params), fit_tol)
        })
    }
}

pub(crate) fn curve_surface(
    curve: CurveQuery<'_>,
    surface: SurfaceQuery<'_>,
    tols: &Tolerances,
) -> Result<Vec<CsxHit>, IntersectError> {
    let tree_c = curve.root()?;
    let tree_s = surface.root()?;
    let root_c: &Subcurve = &tree_c;
    let root_s: &Subsurface = &tree_s;
    let tol = tols.intersection;

    if root_c.bbox().diagonal_length() < ZERO_TOLERANCE {
        return Ok(degenerate(root_c, root_s, tol).into_iter().collect());
    }
    if !root_c.bbox().intersects(root_s.bbox(), tol) {
        return Ok(Vec::new());
    }

    let diag = root_s.bbox().diagonal_length();
    let ctx = Context {
        curve: root_c,
        surface: root_s,
        tol,
        overlap_tol: tols.overlap,
        t_tol: parameter_tolerance(tol, &root_c.domain(), root_c.bbox()),
        u_tol: parameter_tolerance(tol, &root_s.u(), root_s.bbox()),
        v_tol: parameter_tolerance(tol, &root_s.v(), root_s.bbox()),
    };
    let pairs = candidate_pairs(root_c, root_s, tol, false, |_| false);
    debug!(pairs = pairs.len(), diag, "curve/surface candidate pairs");

    let mut points = Vec::new();
    let mut overlaps = Vec::new();
    for (nc, ns) in pairs {
        if nc.is_linear() && ns.is_planar() && ctx.flat_pair(nc, ns, &mut points, &mut overlaps) {
            continue;
        }
        ctx.curved_pair(nc, ns, &mut points, &mut overlaps);
    }
    Ok(ctx.finish(points, overlaps))
}

/// A curve that collapses to a point lies on the surface over its whole
/// domain, or nowhere.
fn degenerate(root_c: &Subcurve, root_s: &Subsurface, tol: f64) -> Option<CsxHit> {
    let dom = root_c.domain();
    let p = root_c.curve().point_at_start();
    let (uv, q) = point_on_surface(&p, root_s, tol)?;
    let at = |t: f64| Sample { t, uv, a: p, b: q };
    Some(CsxHit::overlap(vec![at(dom.min), at(dom.max)]))
}

/// Unit normal and a point of the plane through a flat patch, from the
/// first corner triple that is not collinear.
fn patch_plane(corners: &[Point3; 4]) -> Option<(Point3, Vec3)> {
    const TRIPLES: [[usize; 3]; 4] = [[0, 1, 2], [0, 1, 3], [0, 2, 3], [1, 2, 3]];
    TRIPLES.iter().find_map(|&[i, j, k]| {
        let e1 = corners[j] - corners[i];
        let e2 = corners[k] - corners[i];
        let n = e1.cross(&e2);
        let scale = e1.norm() * e2.norm();
        (scale > 0.0 && n.norm() > ZERO_TOLERANCE * scale).then(|| (corners[i], n.normalize()))
    })
}

struct Context<'a> {
    curve: &'a Subcurve,
    surface: &'a Subsurface,
    tol: f64,
    overlap_tol: f64,
    t_tol: f64,
    u_tol: f64,
    v_tol: f64,
}

impl Context<'_> {
    fn newton(&self, t: f64, uv: Point2) -> Option<Sample> {
        newton::curve_surface(
            self.curve.curve(),
            &self.curve.domain(),
            self.surface.surface(),
            &self.surface.u(),
            &self.surface.v(),
            t,
            uv,
            self.tol,
        )
        .map(Sample::from)
    }

    /// Surface parameters of `p`, refined from `guess` on the root
    /// surface.
    fn project(&self, p: &Point3, guess: Point2) -> Point2 {
        newton::point_surface(
            self.surface.surface(),
            &self.surface.u(),
            &self.surface.v(),
            p,
            guess,
            self.tol,
        )
        .map_or(guess, |(uv, _)| uv)
    }

    fn sample(&self, t: f64, uv: Point2) -> Sample {
        let uv = self.project(&self.curve.curve().point_at(t), uv);
        Sample {
            t,
            uv,
            a: self.curve.curve().point_at(t),
            b: self.surface.surface().point_at(uv.x, uv.y),
        }
    }

    /// Straight curve piece against a flat patch. Returns false if the
    /// patch does not span a plane, so the pair goes the general way.
    fn flat_pair(
        &self,
        nc: &Subcurve,
        ns: &Subsurface,
        points: &mut Vec<CsxHit>,
        overlaps: &mut Vec<CsxHit>,
    ) -> bool {
        let (u, v) = (ns.u(), ns.v());
        let patch = ns.surface();
        let uvs = [
            Point2::new(u.min, v.min),
            Point2::new(u.max, v.min),
            Point2::new(u.max, v.max),
            Point2::new(u.min, v.max),
        ];
        let corners = uvs.map(|q| patch.point_at(q.x, q.y));
        let Some((origin, normal)) = patch_plane(&corners) else {
            return false;
        };
        let (p0, p1) = (nc.curve().point_at_start(), nc.curve().point_at_end());
        let d0 = (p0 - origin).dot(&normal);
        let d1 = (p1 - origin).dot(&normal);
        let tol = self.tol;

        if d0.abs() <= tol && d1.abs() <= tol {
            self.coplanar(nc, ns, &corners, &uvs, points, overlaps);
        } else if (d0 > tol && d1 > tol) || (d0 < -tol && d1 < -tol) {
            // both ends on one side
        } else {
            let s = if (d0 - d1).abs() > ZERO_TOLERANCE {
                (d0 / (d0 - d1)).clamp(0.0, 1.0)
            } else {
                0.5
            };
            let q = p0 + (p1 - p0) * s;
            if let Some((uv, _)) = point_on_surface(&q, ns, tol) {
                let t = nc.domain().parameter_at(s);
                match self.newton(t, uv) {
                    Some(root) => points.push(CsxHit::point(root)),
                    None => {
                        let guess = self.sample(t, uv);
                        if (guess.a - guess.b).norm() <= tol {
                            points.push(CsxHit::point(guess));
                        }
                    }
                }
            }
        }
        true
    }

    /// A straight piece lying in the patch plane: its in-patch ends and
    /// its crossings with the patch edges bound the shared range.
    fn coplanar(
        &self,
        nc: &Subcurve,
        ns: &Subsurface,
        corners: &[Point3; 4],
        uvs: &[Point2; 4],
        points: &mut Vec<CsxHit>,
        overlaps: &mut Vec<CsxHit>,
    ) {
        let (p0, p1) = (nc.curve().point_at_start(), nc.curve().point_at_end());
        let dom = nc.domain();
        let mut hits: Vec<(f64, Point2)> = Vec::new();
        for (s, p) in [(0.0, p0), (1.0, p1)] {
            if let Some((uv, _)) = point_on_surface(&p, ns, self.tol) {
                hits.push((dom.parameter_at(s), uv));
            }
        }
        for i in 0..4 {
            let j = (i + 1) % 4;
            let edge_uv = |s: f64| uvs[i] + (uvs[j] - uvs[i]) * s;
            match line_line(&p0, &p1, &corners[i], &corners[j], self.tol) {
                LineLine::Disjoint => {}
                LineLine::Point(sa, sb) => hits.push((dom.parameter_at(sa), edge_uv(sb))),
                LineLine::Overlap(sa, sb) => {
                    for k in 0..2 {
                        hits.push((dom.parameter_at(sa[k]), edge_uv(sb[k])));
                    }
                }
            }
        }
        hits.sort_by(|x, y| x.0.total_cmp(&y.0));
        hits.dedup_by(|next, kept| (next.0 - kept.0).abs() <= self.t_tol);

        let samples: Vec<Sample> = hits.iter().map(|&(t, uv)| self.sample(t, uv)).collect();
        match samples.len() {
            0 => {}
            1 => points.push(CsxHit::point(samples[0])),
            _ => overlaps.push(CsxHit::overlap(samples)),
        }
    }

    /// Refine from the curve parameter `t`. The projection of `C(t)` is
    /// kept where the curve runs along the surface there; elsewhere
    /// Newton from `t` and the patch center moves a near miss onto the
    /// actual crossing or touching point.
    fn solve(&self, t: f64, ns: &Subsurface) -> Option<Sample> {
        let p = self.curve.curve().point_at(t);
        let on = point_on_surface(&p, self.surface, self.tol).map(|(uv, b)| Sample { t, uv, a: p, b });
        if let Some(s) = on.filter(|s| self.runs_along(s)) {
            return Some(s);
        }
        self.newton(t, Point2::new(ns.u().mid(), ns.v().mid())).or(on)
    }

    /// True if the curve tangent at `s` lies in the tangent plane of the
    /// surface within the angular tolerance.
    fn runs_along(&self, s: &Sample) -> bool {
        let d = self.curve.curve().tangent_at(s.t);
        match self.surface.surface().normal_at(s.uv.x, s.uv.y) {
            Some(n) if d.norm() > 0.0 => d.dot(&n).abs() <= Tolerance::DEFAULT.angular.sin(),
            _ => true,
        }
    }

    fn curved_pair(
        &self,
        nc: &Subcurve,
        ns: &Subsurface,
        points: &mut Vec<CsxHit>,
        overlaps: &mut Vec<CsxHit>,
    ) {
        let first = self.solve(nc.domain().min, ns);
        let last = self.solve(nc.domain().max, ns);
        match (first, last) {
            (Some(p), Some(q)) => {
                if (p.a - q.a).norm() <= self.tol && (p.b - q.b).norm() <= self.tol {
                    points.push(CsxHit::point(p));
                } else if let Some(inner) = self.overlap_samples(p.t, q.t) {
                    let mut samples = vec![p, q];
                    samples.extend(inner);
                    overlaps.push(CsxHit::overlap(samples));
                } else {
                    points.push(CsxHit::point(p));
                    points.push(CsxHit::point(q));
                }
            }
            (Some(p), None) | (None, Some(p)) => points.push(CsxHit::point(p)),
            (None, None) => {}
        }
    }

    /// Interior samples between `t0` and `t1` if all of them lie on the
    /// surface within the overlap tolerance.
    fn overlap_samples(&self, t0: f64, t1: f64) -> Option<Vec<Sample>> {
        let curve = self.curve.curve();
        (1..=CSI_OVERLAP_TEST_POINTS)
            .map(|i| {
                let s = i as f64 / (CSI_OVERLAP_TEST_POINTS + 1) as f64;
                let t = t0 + (t1 - t0) * s;
                let a = curve.point_at(t);
                point_on_surface(&a, self.surface, self.overlap_tol)
                    .map(|(uv, b)| Sample { t, uv, a, b })
            })
            .collect()
    }

    /// Merge overlaps that continue one another, turn overlaps shorter
    /// than the tolerance into points, and drop duplicate or covered
    /// points.
    fn finish(&self, points: Vec<CsxHit>, mut overlaps: Vec<CsxHit>) -> Vec<CsxHit> {
        overlaps.sort_by(|x, y| x.event.a_params[0].total_cmp(&y.event.a_params[0]));
        let mut merged: Vec<CsxHit> = Vec::with_capacity(overlaps.len());
        for o in overlaps {
            match merged.last_mut() {
                Some(last) if self.continues(last, &o) => {
                    let mut samples = std::mem::take(&mut last.samples);
                    samples.extend(o.samples);
                    *last = CsxHit::overlap(samples);
                }
                _ => merged.push(o),
            }
        }

        let tol = self.tol;
        let mut out: Vec<CsxHit> = Vec::new();
        let mut candidates = points;
        for o in merged {
            if (o.event.a[0] - o.event.a[1]).norm() <= tol {
                candidates.push(CsxHit::point(o.samples[0]));
            } else {
                out.push(o);
            }
        }

        let overlap_count = out.len();
        for p in candidates {
            let t = p.event.a_params[0];
            let covered = out[..overlap_count].iter().any(|o| {
                o.event.a_params[0] - self.t_tol <= t && t <= o.event.a_params[1] + self.t_tol
            });
            let duplicate = out[overlap_count..].iter().any(|q| {
                (q.event.a[0] - p.event.a[0]).norm() <= tol
                    && (q.event.b[0] - p.event.b[0]).norm() <= tol
            });
            if !covered && !duplicate {
                out.push(p);
            }
        }
        out.sort_by(|x, y| x.event.a_params[0].total_cmp(&y.event.a_params[0]));
        out
    }

    fn continues(&self, last: &CsxHit, next: &CsxHit) -> bool {
        if next.event.a_params[0] - last.event.a_params[1] > self.t_tol {
            return false;
        }
        let (lu, lv) = last.uv_box();
        let (nu, nv) = next.uv_box();
        lu.grow(self.u_tol).intersection(&nu).is_some()
            && lv.grow(self.v_tol).intersection(&nv).is_some()
    }
}
