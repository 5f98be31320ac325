//! Curve/curve intersection.
//!
//! Both curves are subdivided in lockstep until the candidate pieces are
//! straight or the depth limit is reached. Straight pairs are solved in
//! closed form; the rest are refined with Newton from the corners of the
//! candidate intervals, and a pair whose refinements disagree is checked
//! for a coincident range by sampling.

use tracing::{debug, warn};

use crate::error::IntersectError;
use crate::events::CurveCurveEvent;
use crate::newton::{self, CurveCurveRoot};
use crate::point::point_on_curve;
use crate::query::{CurveQuery, Tolerances};
use crate::subdivision::{candidate_pairs, Subcurve};
use crate::CCI_OVERLAP_TEST_POINTS;
use vcad_kernel_math::{BoundingBox, Interval, Point3, ZERO_TOLERANCE};

/// Intersect two curves and append the events to `events`.
///
/// Returns the number of events appended.
pub fn intersect_curve_curve(
    a: CurveQuery<'_>,
    b: CurveQuery<'_>,
    tolerances: &Tolerances,
    events: &mut Vec<CurveCurveEvent>,
) -> usize {
    match curve_curve(a, b, &tolerances.resolved()) {
        Ok(found) => {
            let n = found.len();
            events.extend(found);
            n
        }
        Err(err) => {
            warn!(%err, "curve/curve intersection skipped");
            0
        }
    }
}

pub(crate) fn curve_curve(
    a: CurveQuery<'_>,
    b: CurveQuery<'_>,
    tols: &Tolerances,
) -> Result<Vec<CurveCurveEvent>, IntersectError> {
    let tree_a = a.root()?;
    let tree_b = b.root()?;
    let root_a: &Subcurve = &tree_a;
    let root_b: &Subcurve = &tree_b;
    let tol = tols.intersection;

    let a_is_point = root_a.bbox().diagonal_length() < ZERO_TOLERANCE;
    let b_is_point = root_b.bbox().diagonal_length() < ZERO_TOLERANCE;
    if a_is_point || b_is_point {
        return Ok(degenerate(root_a, root_b, a_is_point, b_is_point, tol)
            .into_iter()
            .collect());
    }
    if !root_a.bbox().intersects(root_b.bbox(), tol) {
        return Ok(Vec::new());
    }

    let ctx = Context {
        root_a,
        root_b,
        tol,
        overlap_tol: tols.overlap,
    };
    let pairs = candidate_pairs(root_a, root_b, tol, false, |_| false);
    debug!(pairs = pairs.len(), "curve/curve candidate pairs");

    let mut points = Vec::new();
    let mut overlaps = Vec::new();
    for (na, nb) in pairs {
        if na.is_linear() && nb.is_linear() {
            ctx.linear_pair(na, nb, &mut points, &mut overlaps);
        } else {
            ctx.curved_pair(na, nb, &mut points, &mut overlaps);
        }
    }

    let t1_tol = parameter_tolerance(tol, &root_a.domain(), root_a.bbox());
    let t2_tol = parameter_tolerance(tol, &root_b.domain(), root_b.bbox());
    Ok(finish(points, overlaps, tol, t1_tol, t2_tol))
}

/// A curve that collapses to a point overlaps the other operand over
/// its whole domain wherever the point lies on it.
fn degenerate(
    root_a: &Subcurve,
    root_b: &Subcurve,
    a_is_point: bool,
    b_is_point: bool,
    tol: f64,
) -> Option<CurveCurveEvent> {
    let (da, db) = (root_a.domain(), root_b.domain());
    let pa = root_a.curve().point_at_start();
    let pb = root_b.curve().point_at_start();
    match (a_is_point, b_is_point) {
        (true, true) => ((pa - pb).norm() <= tol)
            .then(|| CurveCurveEvent::overlap([pa, pa], [pb, pb], [da.min, da.max], [db.min, db.max])),
        (true, false) => {
            let (t, p) = point_on_curve(&pa, root_b, tol)?;
            Some(CurveCurveEvent::overlap([pa, pa], [p, p], [da.min, da.max], [t, t]))
        }
        _ => {
            let (t, p) = point_on_curve(&pb, root_a, tol)?;
            Some(CurveCurveEvent::overlap([p, p], [pb, pb], [t, t], [db.min, db.max]))
        }
    }
}

/// A 3D distance expressed as a parameter step on a curve.
pub(crate) fn parameter_tolerance(tol: f64, domain: &Interval, bbox: &BoundingBox) -> f64 {
    let diag = bbox.diagonal_length();
    if diag > ZERO_TOLERANCE {
        tol * domain.length() / diag
    } else {
        tol
    }
}

struct Context<'a> {
    root_a: &'a Subcurve,
    root_b: &'a Subcurve,
    tol: f64,
    overlap_tol: f64,
}

impl Context<'_> {
    fn newton(&self, ta: f64, tb: f64) -> Option<CurveCurveRoot> {
        newton::curve_curve(
            self.root_a.curve(),
            &self.root_a.domain(),
            self.root_b.curve(),
            &self.root_b.domain(),
            ta,
            tb,
            self.tol,
        )
    }

    fn linear_pair(
        &self,
        na: &Subcurve,
        nb: &Subcurve,
        points: &mut Vec<CurveCurveEvent>,
        overlaps: &mut Vec<CurveCurveEvent>,
    ) {
        let (a0, a1) = (na.curve().point_at_start(), na.curve().point_at_end());
        let (b0, b1) = (nb.curve().point_at_start(), nb.curve().point_at_end());
        match line_line(&a0, &a1, &b0, &b1, self.tol) {
            LineLine::Disjoint => {}
            LineLine::Point(sa, sb) => {
                let ta = na.domain().parameter_at(sa);
                let tb = nb.domain().parameter_at(sb);
                if let Some(root) = self.newton(ta, tb) {
                    points.push(root_event(&root));
                }
            }
            LineLine::Overlap(sa, sb) => {
                let ends: [(f64, Point3, f64, Point3); 2] = std::array::from_fn(|i| {
                    let qa = a0 + (a1 - a0) * sa[i];
                    let qb = b0 + (b1 - b0) * sb[i];
                    let ta = self.project(self.root_a, &qa, na.domain().parameter_at(sa[i]));
                    let tb = self.project(self.root_b, &qb, nb.domain().parameter_at(sb[i]));
                    (ta, self.root_a.curve().point_at(ta), tb, self.root_b.curve().point_at(tb))
                });
                let [(ta0, pa0, tb0, pb0), (ta1, pa1, tb1, pb1)] = ends;
                overlaps.push(CurveCurveEvent::overlap([pa0, pa1], [pb0, pb1], [ta0, ta1], [tb0, tb1]));
            }
        }
    }

    /// Parameter of `q` on the curve under `root`, or `guess` if Newton
    /// does not land within tolerance.
    fn project(&self, root: &Subcurve, q: &Point3, guess: f64) -> f64 {
        newton::point_curve(root.curve(), &root.domain(), q, guess, self.tol)
            .map_or(guess, |(t, _)| t)
    }

    fn curved_pair(
        &self,
        na: &Subcurve,
        nb: &Subcurve,
        points: &mut Vec<CurveCurveEvent>,
        overlaps: &mut Vec<CurveCurveEvent>,
    ) {
        let (da, db) = (na.domain(), nb.domain());
        // the crossed corners meet when B runs against A
        let starts = [(da.min, db.min), (da.max, db.max), (da.min, db.max), (da.max, db.min)];
        let mut roots: Vec<CurveCurveRoot> = Vec::with_capacity(starts.len());
        for (ta, tb) in starts {
            if let Some(root) = self.newton(ta, tb) {
                if !roots.iter().any(|r| self.same_root(r, &root)) {
                    roots.push(root);
                }
            }
        }
        let Some((lo, hi)) = extremes(&roots) else {
            return;
        };
        if self.same_root(&lo, &hi) {
            points.push(root_event(&lo));
        } else if self.is_overlap(lo.ta, hi.ta) {
            let (lo, hi) = self.widen(na, nb, lo, hi);
            overlaps.push(CurveCurveEvent::overlap(
                [lo.a, hi.a],
                [lo.b, hi.b],
                [lo.ta, hi.ta],
                [lo.tb, hi.tb],
            ));
        } else {
            points.extend(roots.iter().map(root_event));
        }
    }

    fn same_root(&self, p: &CurveCurveRoot, q: &CurveCurveRoot) -> bool {
        (p.a - q.a).norm() <= self.tol && (p.b - q.b).norm() <= self.tol
    }

    /// Stretch a confirmed overlap out to the leaf ends that lie on the
    /// other curve, so neighbouring leaf pairs meet exactly.
    fn widen(
        &self,
        na: &Subcurve,
        nb: &Subcurve,
        lo: CurveCurveRoot,
        hi: CurveCurveRoot,
    ) -> (CurveCurveRoot, CurveCurveRoot) {
        let (ca, cb) = (self.root_a.curve(), self.root_b.curve());
        let mut ends = vec![lo, hi];
        for ta in [na.domain().min, na.domain().max] {
            let a = ca.point_at(ta);
            let guess = nearer_end(nb, &a);
            if let Some((tb, b)) = newton::point_curve(cb, &self.root_b.domain(), &a, guess, self.tol) {
                ends.push(CurveCurveRoot { ta, tb, a, b });
            }
        }
        for tb in [nb.domain().min, nb.domain().max] {
            let b = cb.point_at(tb);
            let guess = nearer_end(na, &b);
            if let Some((ta, a)) = newton::point_curve(ca, &self.root_a.domain(), &b, guess, self.tol) {
                ends.push(CurveCurveRoot { ta, tb, a, b });
            }
        }
        match extremes(&ends) {
            Some((wlo, whi))
                if (wlo.ta < lo.ta || whi.ta > hi.ta) && self.is_overlap(wlo.ta, whi.ta) =>
            {
                (wlo, whi)
            }
            _ => (lo, hi),
        }
    }

    /// True if every interior sample of curve A between `t0` and `t1`
    /// lies on curve B within the overlap tolerance.
    fn is_overlap(&self, t0: f64, t1: f64) -> bool {
        let curve = self.root_a.curve();
        (1..=CCI_OVERLAP_TEST_POINTS).all(|i| {
            let s = i as f64 / (CCI_OVERLAP_TEST_POINTS + 1) as f64;
            let p = curve.point_at(t0 + (t1 - t0) * s);
            point_on_curve(&p, self.root_b, self.overlap_tol).is_some()
        })
    }
}

fn root_event(root: &CurveCurveRoot) -> CurveCurveEvent {
    CurveCurveEvent::point(root.a, root.b, root.ta, root.tb)
}

/// Roots with the smallest and largest parameter on A.
fn extremes(roots: &[CurveCurveRoot]) -> Option<(CurveCurveRoot, CurveCurveRoot)> {
    let lo = roots.iter().min_by(|x, y| x.ta.total_cmp(&y.ta))?;
    let hi = roots.iter().max_by(|x, y| x.ta.total_cmp(&y.ta))?;
    Some((*lo, *hi))
}

/// The end of `node` closer to `p`.
fn nearer_end(node: &Subcurve, p: &Point3) -> f64 {
    let dom = node.domain();
    let d0 = (node.curve().point_at_start() - p).norm();
    let d1 = (node.curve().point_at_end() - p).norm();
    if d0 <= d1 {
        dom.min
    } else {
        dom.max
    }
}

/// Remove duplicate points, merge touching overlaps, and drop points
/// that an overlap already covers.
fn finish(
    points: Vec<CurveCurveEvent>,
    mut overlaps: Vec<CurveCurveEvent>,
    tol: f64,
    t1_tol: f64,
    t2_tol: f64,
) -> Vec<CurveCurveEvent> {
    overlaps.sort_by(|x, y| x.a_params[0].total_cmp(&y.a_params[0]));
    let mut merged: Vec<CurveCurveEvent> = Vec::with_capacity(overlaps.len());
    for o in overlaps {
        debug_assert!(o.a_params[0] <= o.a_params[1]);
        match merged.last_mut() {
            Some(last) if continues(last, &o, t1_tol, t2_tol) => {
                if o.a_params[1] > last.a_params[1] {
                    last.a[1] = o.a[1];
                    last.b[1] = o.b[1];
                    last.a_params[1] = o.a_params[1];
                    last.b_params[1] = o.b_params[1];
                }
            }
            _ => merged.push(o),
        }
    }

    let mut out: Vec<CurveCurveEvent> = Vec::new();
    let mut candidates = points;
    for o in merged {
        if (o.a[0] - o.a[1]).norm() <= tol {
            candidates.push(CurveCurveEvent::point(o.a[0], o.b[0], o.a_params[0], o.b_params[0]));
        } else {
            out.push(o);
        }
    }

    let overlap_count = out.len();
    for p in candidates {
        let t = p.a_params[0];
        let covered = out[..overlap_count]
            .iter()
            .any(|o| o.a_params[0] - t1_tol <= t && t <= o.a_params[1] + t1_tol);
        let duplicate = out[overlap_count..]
            .iter()
            .any(|q| (q.a[0] - p.a[0]).norm() <= tol && (q.b[0] - p.b[0]).norm() <= tol);
        if !covered && !duplicate {
            out.push(p);
        }
    }
    out.sort_by(|x, y| x.a_params[0].total_cmp(&y.a_params[0]));
    out
}

/// True if `next` starts where `last` ends on A and carries its B range
/// on in the same direction.
fn continues(last: &CurveCurveEvent, next: &CurveCurveEvent, t1_tol: f64, t2_tol: f64) -> bool {
    if next.a_params[0] - last.a_params[1] > t1_tol {
        return false;
    }
    let step = |e: &CurveCurveEvent| e.b_params[1] - e.b_params[0];
    let (s0, s1) = (step(last), step(next));
    if s0.abs() > t2_tol && s1.abs() > t2_tol && s0.signum() != s1.signum() {
        return false;
    }
    let range = |e: &CurveCurveEvent| {
        let mut r = Interval::new(e.b_params[0], e.b_params[1]);
        r.make_increasing();
        r
    };
    range(last).grow(t2_tol).intersection(&range(next)).is_some()
}

// =============================================================================
// Closed-form segment intersection
// =============================================================================

/// Intersection of two straight segments, in normalized segment
/// parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum LineLine {
    Disjoint,
    Point(f64, f64),
    /// Matching ends of a shared range: `a[i]` on A pairs with `b[i]`
    /// on B.
    Overlap([f64; 2], [f64; 2]),
}

/// Intersect segments `a0a1` and `b0b1` within `tol`.
pub(crate) fn line_line(a0: &Point3, a1: &Point3, b0: &Point3, b1: &Point3, tol: f64) -> LineLine {
    let da = a1 - a0;
    let db = b1 - b0;
    let (la2, lb2) = (da.norm_squared(), db.norm_squared());
    let eps2 = ZERO_TOLERANCE * ZERO_TOLERANCE;
    if la2 <= eps2 || lb2 <= eps2 {
        return LineLine::Disjoint;
    }
    let (la, lb) = (la2.sqrt(), lb2.sqrt());
    let on_a = |p: &Point3| (p - a0).dot(&da) / la2;
    let on_b = |p: &Point3| ((p - b0).dot(&db) / lb2).clamp(0.0, 1.0);
    let off_a = |p: &Point3, s: f64| (p - (a0 + da * s)).norm();

    let (s0, s1) = (on_a(b0), on_a(b1));
    if off_a(b0, s0) <= tol && off_a(b1, s1) <= tol {
        let slack = tol / la;
        let (lo, hi) = (s0.min(s1), s0.max(s1));
        if lo > 1.0 + slack || hi < -slack {
            return LineLine::Disjoint;
        }
        let lo = lo.clamp(0.0, 1.0);
        let hi = hi.clamp(0.0, 1.0);
        let b_at = |s: f64| on_b(&(a0 + da * s));
        if (hi - lo) * la <= tol {
            let s = 0.5 * (lo + hi);
            return LineLine::Point(s, b_at(s));
        }
        return LineLine::Overlap([lo, hi], [b_at(lo), b_at(hi)]);
    }

    let w = a0 - b0;
    let b = da.dot(&db);
    let d = da.dot(&w);
    let e = db.dot(&w);
    let denom = la2 * lb2 - b * b;
    if denom <= ZERO_TOLERANCE * la2 * lb2 {
        return LineLine::Disjoint;
    }
    let sa = (b * e - lb2 * d) / denom;
    let sb = (la2 * e - b * d) / denom;
    let (slack_a, slack_b) = (tol / la, tol / lb);
    let outside = |s: f64, slack: f64| s < -slack || s > 1.0 + slack;
    if outside(sa, slack_a) || outside(sb, slack_b) {
        return LineLine::Disjoint;
    }
    let (sa, sb) = (sa.clamp(0.0, 1.0), sb.clamp(0.0, 1.0));
    if ((a0 + da * sa) - (b0 + db * sb)).norm() <= tol {
        LineLine::Point(sa, sb)
    } else {
        LineLine::Disjoint
    }
}
