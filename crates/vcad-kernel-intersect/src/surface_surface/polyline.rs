//! Chaining refined points into intersection curves.

use tracing::debug;

use super::overlap::OverlapRegion;
use super::{Context, RawPoint, Side};
use crate::events::{SsxKind, SsxLocus, SurfaceSurfaceEvent};
use crate::fit::fit_curve;
use crate::newton::Rect;
use crate::point::point_on_curve;
use crate::subdivision::Subcurve;
use vcad_kernel_math::{Interval, Point2, Point3, Vec2, ZERO_TOLERANCE};
use vcad_kernel_nurbs::NurbsCurve;

/// Normal samples taken along a curve to classify it.
const CLASSIFY_SAMPLES: usize = 5;

/// Largest angle between the normals of points that may be gathered into
/// one touching point.
const TOUCH_ANGLE: f64 = 0.1;

/// Turn the raw points into curve and point events.
pub(super) fn build(
    ctx: &Context<'_>,
    raw: Vec<RawPoint>,
    regions: &[OverlapRegion],
    contacts: &[NurbsCurve],
) -> Vec<SurfaceSurfaceEvent> {
    let total = raw.len();
    let limits = Limits::new(ctx);
    let contact_trees: Vec<Subcurve> = contacts
        .iter()
        .filter_map(|c| Subcurve::new(c, None).ok())
        .collect();
    let points: Vec<RawPoint> = dedupe(ctx, &limits, raw)
        .into_iter()
        .filter(|p| !regions.iter().any(|r| r.contains_uv(&p.uv_a)))
        .filter(|p| !on_any(&contact_trees, &p.point, ctx.tol))
        .collect();
    if points.is_empty() {
        return Vec::new();
    }

    let mut chains = Chains::new(points.len());
    for pair in point_pairs(&points, &limits) {
        chains.link(pair.i, pair.j);
    }
    chains.seam(&points, &limits);

    // longest first, so a stub along a longer chain finds it covered
    let mut lines: Vec<&Vec<usize>> = chains.lines.iter().filter(|l| l.len() >= 2).collect();
    lines.sort_by(|x, y| length(&points, y).total_cmp(&length(&points, x)));

    let mut events = Vec::new();
    let mut trees: Vec<Subcurve> = Vec::new();
    let mut spots: Vec<RawPoint> = Vec::new();
    for line in lines {
        if line.iter().all(|&k| on_any(&trees, &points[k].point, ctx.tol)) {
            continue;
        }
        let size = extent(&points, line);
        if size <= ctx.tol || (size <= limits.dist3 && line.iter().all(|&k| touching(ctx, &points[k]))) {
            spots.push(touch_point(ctx, &points, line));
            continue;
        }
        let closed = line.len() >= 3 && limits.near(&points[line[0]], &points[line[line.len() - 1]]);
        let seq: Vec<RawPoint> = line.iter().map(|&k| points[k]).collect();
        for (piece, piece_closed) in limits.cut(ctx, seq, closed) {
            let Some(event) = curve_event(ctx, &piece, piece_closed) else {
                continue;
            };
            if let Some(curve) = event.curve_3d() {
                if let Ok(tree) = Subcurve::new(curve, None) {
                    trees.push(tree);
                }
            }
            events.push(event);
        }
    }
    let curves = events.len();

    let isolated = points
        .iter()
        .enumerate()
        .filter(|(k, _)| chains.owner[*k].is_none())
        .map(|(_, p)| *p);
    let mut singles: Vec<(f64, RawPoint)> = spots
        .into_iter()
        .chain(isolated)
        .map(|p| (misalignment(ctx, &p), p))
        .collect();
    // best contact first, the rest of its tolerance band merges into it
    singles.sort_by(|x, y| x.0.total_cmp(&y.0));
    let touch = 1.0 - TOUCH_ANGLE.cos();
    let mut placed: Vec<(Point3, bool)> = Vec::new();
    for (m, p) in singles {
        let touches = m <= touch;
        let merged = placed.iter().any(|(q, t)| {
            let d = (q - p.point).norm();
            d <= ctx.tol || (touches && *t && d <= limits.dist3)
        });
        if merged || on_any(&trees, &p.point, ctx.tol) {
            continue;
        }
        placed.push((p.point, touches));
        let kind = if ctx.normals_parallel(&p.uv_a, &p.uv_b) {
            SsxKind::TangentPoint
        } else {
            SsxKind::TransversePoint
        };
        events.push(SurfaceSurfaceEvent {
            kind,
            locus: SsxLocus::Point {
                point: p.point,
                uv_a: p.uv_a,
                uv_b: p.uv_b,
            },
        });
    }
    debug!(
        raw = total,
        kept = points.len(),
        curves,
        points = events.len() - curves,
        "surface/surface points chained"
    );
    events
}

fn on_any(trees: &[Subcurve], p: &Point3, tol: f64) -> bool {
    trees.iter().any(|t| point_on_curve(p, t, tol).is_some())
}

/// Length of the polyline through `line`.
fn length(points: &[RawPoint], line: &[usize]) -> f64 {
    line.windows(2)
        .map(|w| (points[w[1]].point - points[w[0]].point).norm())
        .sum()
}

/// Diagonal of the box around the points of `line`.
fn extent(points: &[RawPoint], line: &[usize]) -> f64 {
    let first = points[line[0]].point.coords;
    let (lo, hi) = line.iter().fold((first, first), |(lo, hi), &k| {
        let c = points[k].point.coords;
        (lo.inf(&c), hi.sup(&c))
    });
    (hi - lo).norm()
}

/// `1 - |na . nb|` at a point, zero where the surfaces touch.
fn misalignment(ctx: &Context<'_>, p: &RawPoint) -> f64 {
    let na = ctx.a.surface().normal_at(p.uv_a.x, p.uv_a.y);
    let nb = ctx.b.surface().normal_at(p.uv_b.x, p.uv_b.y);
    match (na, nb) {
        (Some(na), Some(nb)) => 1.0 - na.dot(&nb).abs().min(1.0),
        _ => 1.0,
    }
}

fn touching(ctx: &Context<'_>, p: &RawPoint) -> bool {
    misalignment(ctx, p) <= 1.0 - TOUCH_ANGLE.cos()
}

/// The point of a collapsed chain where the normals agree best.
fn touch_point(ctx: &Context<'_>, points: &[RawPoint], line: &[usize]) -> RawPoint {
    line.iter()
        .map(|&k| points[k])
        .min_by(|p, q| misalignment(ctx, p).total_cmp(&misalignment(ctx, q)))
        .unwrap_or(points[line[0]])
}

/// Drop points that repeat an earlier one in model space and in both
/// parameter spaces. The result is sorted by `x`.
fn dedupe(ctx: &Context<'_>, limits: &Limits, mut raw: Vec<RawPoint>) -> Vec<RawPoint> {
    raw.sort_by(|p, q| p.point.x.total_cmp(&q.point.x));
    let mut kept: Vec<RawPoint> = Vec::with_capacity(raw.len());
    for p in raw {
        let duplicate = kept
            .iter()
            .rev()
            .take_while(|q| p.point.x - q.point.x <= ctx.tol)
            .any(|q| {
                (p.point - q.point).norm() <= ctx.tol
                    && limits.within(Side::A, &p.uv_a, &q.uv_a, &ctx.uv_tol_a)
                    && limits.within(Side::B, &p.uv_b, &q.uv_b, &ctx.uv_tol_b)
            });
        if !duplicate {
            kept.push(p);
        }
    }
    kept
}

fn uv_of(side: Side, p: &RawPoint) -> Point2 {
    match side {
        Side::A => p.uv_a,
        Side::B => p.uv_b,
    }
}

fn set_uv(p: &mut RawPoint, side: Side, axis: usize, value: f64) {
    match side {
        Side::A => p.uv_a[axis] = value,
        Side::B => p.uv_b[axis] = value,
    }
}

/// Shortest signed form of the step `d` on an axis that wraps after
/// `period`.
fn wrap(d: f64, period: Option<f64>) -> f64 {
    match period {
        Some(period) if d.abs() > 0.5 * period => d - period.copysign(d),
        _ => d,
    }
}

/// Add `p` to a piece. A point on top of the last one replaces it when
/// `replace` is set and is dropped otherwise.
fn push_distinct(piece: &mut Vec<RawPoint>, p: RawPoint, replace: bool) {
    match piece.last_mut() {
        Some(last) if (last.point - p.point).norm() <= ZERO_TOLERANCE => {
            if replace {
                *last = p;
            }
        }
        _ => piece.push(p),
    }
}

/// Largest gaps bridged between neighbouring points of one curve, and
/// the parameter rectangles with their closed directions.
struct Limits {
    dist3: f64,
    uv_a: Vec2,
    uv_b: Vec2,
    rect_a: Rect,
    rect_b: Rect,
    period_a: [Option<f64>; 2],
    period_b: [Option<f64>; 2],
}

impl Limits {
    fn new(ctx: &Context<'_>) -> Self {
        let diag = ctx.a.bbox().diagonal_length().min(ctx.b.bbox().diagonal_length());
        Self {
            dist3: 0.1 * diag,
            uv_a: Vec2::new(ctx.rect_a.u.length(), ctx.rect_a.v.length()) * 0.05,
            uv_b: Vec2::new(ctx.rect_b.u.length(), ctx.rect_b.v.length()) * 0.05,
            rect_a: ctx.rect_a,
            rect_b: ctx.rect_b,
            period_a: ctx.periods(Side::A),
            period_b: ctx.periods(Side::B),
        }
    }

    fn periods(&self, side: Side) -> &[Option<f64>; 2] {
        match side {
            Side::A => &self.period_a,
            Side::B => &self.period_b,
        }
    }

    fn range(&self, side: Side, axis: usize) -> Interval {
        let rect = match side {
            Side::A => &self.rect_a,
            Side::B => &self.rect_b,
        };
        if axis == 0 {
            rect.u
        } else {
            rect.v
        }
    }

    /// `to - from` on one surface, taking the short way around a seam.
    fn delta(&self, side: Side, from: &Point2, to: &Point2) -> Vec2 {
        let per = self.periods(side);
        let d = to - from;
        Vec2::new(wrap(d.x, per[0]), wrap(d.y, per[1]))
    }

    fn within(&self, side: Side, p: &Point2, q: &Point2, lim: &Vec2) -> bool {
        let d = self.delta(side, p, q);
        d.x.abs() <= lim.x && d.y.abs() <= lim.y
    }

    fn near(&self, p: &RawPoint, q: &RawPoint) -> bool {
        (p.point - q.point).norm() <= self.dist3
            && self.within(Side::A, &p.uv_a, &q.uv_a, &self.uv_a)
            && self.within(Side::B, &p.uv_b, &q.uv_b, &self.uv_b)
    }

    /// Side, axis and seam value on the side of `p` where the step from
    /// `p` to `q` crosses the seam of a closed direction.
    fn jump(&self, p: &RawPoint, q: &RawPoint) -> Option<(Side, usize, f64)> {
        for side in [Side::A, Side::B] {
            let (pu, qu) = (uv_of(side, p), uv_of(side, q));
            for (axis, period) in self.periods(side).iter().enumerate() {
                let Some(period) = period else {
                    continue;
                };
                let d = qu[axis] - pu[axis];
                if d.abs() > 0.5 * period {
                    let range = self.range(side, axis);
                    let seam = if d > 0.0 { range.min } else { range.max };
                    return Some((side, axis, seam));
                }
            }
        }
        None
    }

    /// The seam crossing between `p` and `q`, once on each side of the
    /// seam.
    fn crossing(
        &self,
        ctx: &Context<'_>,
        p: &RawPoint,
        q: &RawPoint,
        (side, axis, seam): (Side, usize, f64),
    ) -> (RawPoint, RawPoint) {
        let range = self.range(side, axis);
        let other = if seam == range.min { range.max } else { range.min };
        let step_a = self.delta(Side::A, &p.uv_a, &q.uv_a);
        let step_b = self.delta(Side::B, &p.uv_b, &q.uv_b);
        let step = match side {
            Side::A => step_a[axis],
            Side::B => step_b[axis],
        };
        let s = if step.abs() > 0.0 {
            ((seam - uv_of(side, p)[axis]) / step).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let mut m = RawPoint {
            point: p.point + (q.point - p.point) * s,
            uv_a: p.uv_a + step_a * s,
            uv_b: p.uv_b + step_b * s,
        };
        set_uv(&mut m, side, axis, seam);
        if s > 0.0 && s < 1.0 {
            if let Some(root) = ctx.newton(m.uv_a, m.uv_b) {
                m = root.into();
            }
        }
        let mut end = m;
        set_uv(&mut end, side, axis, seam);
        let mut start = m;
        set_uv(&mut start, side, axis, other);
        (end, start)
    }

    /// Cut a chain where it crosses a seam, so each piece has continuous
    /// parameters on both surfaces. A closed chain with cuts is reopened
    /// at its first cut; the flag tells whether a piece is still closed.
    fn cut(&self, ctx: &Context<'_>, mut seq: Vec<RawPoint>, closed: bool) -> Vec<(Vec<RawPoint>, bool)> {
        if closed {
            if let Some(&first) = seq.first() {
                seq.push(first);
            }
        }
        let mut pieces: Vec<Vec<RawPoint>> = vec![Vec::new()];
        for k in 0..seq.len() {
            if k > 0 {
                if let Some(jump) = self.jump(&seq[k - 1], &seq[k]) {
                    let (end, start) = self.crossing(ctx, &seq[k - 1], &seq[k], jump);
                    if let Some(piece) = pieces.last_mut() {
                        push_distinct(piece, end, true);
                    }
                    pieces.push(vec![start]);
                }
            }
            if let Some(piece) = pieces.last_mut() {
                push_distinct(piece, seq[k], false);
            }
        }
        if pieces.len() == 1 {
            if closed {
                seq.pop();
            }
            return vec![(seq, closed)];
        }
        if closed {
            let first = pieces.remove(0);
            if let Some(last) = pieces.last_mut() {
                last.extend(first.into_iter().skip(1));
            }
        }
        pieces.into_iter().map(|p| (p, false)).collect()
    }
}

/// Two points close enough to be neighbours on a curve.
#[derive(Debug, Clone, Copy)]
struct PointPair {
    i: usize,
    j: usize,
    dist3: f64,
    dist2: f64,
}

/// All pairs within `limits`, nearest first. `points` must be sorted by
/// `x`.
fn point_pairs(points: &[RawPoint], limits: &Limits) -> Vec<PointPair> {
    let mut pairs = Vec::new();
    for (i, p) in points.iter().enumerate() {
        for (j, q) in points.iter().enumerate().skip(i + 1) {
            if q.point.x - p.point.x > limits.dist3 {
                break;
            }
            if limits.near(p, q) {
                pairs.push(PointPair {
                    i,
                    j,
                    dist3: (p.point - q.point).norm(),
                    dist2: limits.delta(Side::A, &p.uv_a, &q.uv_a).norm()
                        + limits.delta(Side::B, &p.uv_b, &q.uv_b).norm(),
                });
            }
        }
    }
    pairs.sort_by(|x, y| x.dist3.total_cmp(&y.dist3).then(x.dist2.total_cmp(&y.dist2)));
    pairs
}

/// Polylines over point indices. A point belongs to at most one line
/// unless a seam bridge copies it onto a second one.
struct Chains {
    lines: Vec<Vec<usize>>,
    owner: Vec<Option<usize>>,
}

impl Chains {
    fn new(n: usize) -> Self {
        Self {
            lines: Vec::new(),
            owner: vec![None; n],
        }
    }

    /// Line and end (`true` for the back) that `p` terminates.
    fn end_of(&self, p: usize) -> Option<(usize, bool)> {
        let l = self.owner[p]?;
        let line = &self.lines[l];
        if line.last() == Some(&p) {
            Some((l, true))
        } else if line.first() == Some(&p) {
            Some((l, false))
        } else {
            None
        }
    }

    fn link(&mut self, i: usize, j: usize) -> bool {
        match (self.owner[i], self.owner[j]) {
            (None, None) => {
                self.owner[i] = Some(self.lines.len());
                self.owner[j] = Some(self.lines.len());
                self.lines.push(vec![i, j]);
                true
            }
            (Some(_), None) => self.extend(i, j),
            (None, Some(_)) => self.extend(j, i),
            (Some(li), Some(lj)) if li != lj => match (self.end_of(i), self.end_of(j)) {
                (Some(ei), Some(ej)) => {
                    self.join(ei, ej);
                    true
                }
                _ => false,
            },
            _ => false,
        }
    }

    /// Attach the free point `p` next to `end`, if `end` terminates its
    /// line.
    fn extend(&mut self, end: usize, p: usize) -> bool {
        let Some((l, back)) = self.end_of(end) else {
            return false;
        };
        if back {
            self.lines[l].push(p);
        } else {
            self.lines[l].insert(0, p);
        }
        self.owner[p] = Some(l);
        true
    }

    /// Join two lines at the given ends into the first one.
    fn join(&mut self, (l1, back1): (usize, bool), (l2, back2): (usize, bool)) {
        let mut head = std::mem::take(&mut self.lines[l1]);
        let mut tail = std::mem::take(&mut self.lines[l2]);
        if !back1 {
            head.reverse();
        }
        if back2 {
            tail.reverse();
        }
        for &p in &tail {
            if self.owner[p] == Some(l2) {
                self.owner[p] = Some(l1);
            }
        }
        head.extend(tail);
        self.lines[l1] = head;
    }

    /// Bridge each line end to the nearest point of another line that
    /// does not touch it yet. An end meeting an end joins the lines;
    /// an end meeting an interior point gains that point.
    fn seam(&mut self, points: &[RawPoint], limits: &Limits) {
        for l in 0..self.lines.len() {
            for back in [false, true] {
                let line = &self.lines[l];
                if line.len() < 2 {
                    break;
                }
                let e = if back { line[line.len() - 1] } else { line[0] };
                let nearest = self
                    .lines
                    .iter()
                    .enumerate()
                    .filter(|(m, other)| *m != l && other.len() >= 2 && !other.iter().any(|k| line.contains(k)))
                    .flat_map(|(m, other)| other.iter().map(move |&k| (m, k)))
                    .filter(|&(_, k)| limits.near(&points[e], &points[k]))
                    .min_by(|x, y| {
                        let d = |k: usize| (points[e].point - points[k].point).norm();
                        d(x.1).total_cmp(&d(y.1))
                    });
                let Some((m, k)) = nearest else {
                    continue;
                };
                let other = &self.lines[m];
                if other.first() == Some(&k) || other.last() == Some(&k) {
                    let back_k = other.last() == Some(&k);
                    self.join((l, back), (m, back_k));
                } else if back {
                    self.lines[l].push(k);
                } else {
                    self.lines[l].insert(0, k);
                }
            }
        }
    }
}

fn flat(p: Point2) -> Point3 {
    Point3::new(p.x, p.y, 0.0)
}

/// Fit the three curves through a chain and classify them.
fn curve_event(ctx: &Context<'_>, chain: &[RawPoint], closed: bool) -> Option<SurfaceSurfaceEvent> {
    let closing = chain.first().filter(|_| closed);
    let mut used: Vec<&RawPoint> = Vec::with_capacity(chain.len() + 1);
    let mut params = Vec::with_capacity(chain.len() + 1);
    let mut s = 0.0;
    for p in chain.iter().chain(closing) {
        if let Some(last) = used.last() {
            let d = (p.point - last.point).norm();
            if d <= ZERO_TOLERANCE {
                continue;
            }
            s += d;
        }
        used.push(p);
        params.push(s);
    }
    if used.len() < 2 {
        return None;
    }
    for t in &mut params {
        *t /= s;
    }

    let poly = |f: &dyn Fn(&RawPoint) -> Point3| {
        let pts: Vec<Point3> = used.iter().map(|&p| f(p)).collect();
        fit_curve(NurbsCurve::polyline_with_params(&pts, &params), ctx.fitting_tol)
    };
    let mut curve_3d = poly(&|p: &RawPoint| p.point);
    let mut curve_a = poly(&|p: &RawPoint| flat(p.uv_a));
    let mut curve_b = poly(&|p: &RawPoint| flat(p.uv_b));

    let n = used.len();
    let samples = CLASSIFY_SAMPLES.min(n);
    let tangent = (0..samples)
        .map(|k| used[if samples > 1 { k * (n - 1) / (samples - 1) } else { 0 }])
        .all(|p| ctx.normals_parallel(&p.uv_a, &p.uv_b));
    let kind = if tangent {
        SsxKind::Tangent
    } else {
        SsxKind::Transverse
    };

    if tangent {
        let start = used[0];
        let na = ctx.a.surface().normal_at(start.uv_a.x, start.uv_a.y);
        let nb = ctx.b.surface().normal_at(start.uv_b.x, start.uv_b.y);
        if let (Some(na), Some(nb)) = (na, nb) {
            let side = nb.cross(&na);
            let dir = curve_3d.tangent_at(curve_3d.domain().min);
            if side.norm() > ZERO_TOLERANCE && side.dot(&dir) < 0.0 {
                curve_3d.reverse();
                curve_a.reverse();
                curve_b.reverse();
            }
        }
    }
    Some(SurfaceSurfaceEvent {
        kind,
        locus: SsxLocus::Curve {
            curve_3d,
            curve_a,
            curve_b,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Tolerances;
    use crate::subdivision::Subsurface;
    use vcad_kernel_nurbs::NurbsSurface;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn planes() -> (NurbsSurface, NurbsSurface) {
        let a = NurbsSurface::bilinear(p(-1.0, -1.0, 0.0), p(1.0, -1.0, 0.0), p(-1.0, 1.0, 0.0), p(1.0, 1.0, 0.0));
        let b = NurbsSurface::bilinear(p(0.0, -1.0, -1.0), p(0.0, 1.0, -1.0), p(0.0, -1.0, 1.0), p(0.0, 1.0, 1.0));
        (a, b)
    }

    /// A point on the line `x = z = 0` of the two planes above.
    fn on_line(y: f64) -> RawPoint {
        RawPoint {
            point: p(0.0, y, 0.0),
            uv_a: Point2::new(0.5, 0.5 * (y + 1.0)),
            uv_b: Point2::new(0.5 * (y + 1.0), 0.5),
        }
    }

    fn with_surfaces<R>(a: &NurbsSurface, b: &NurbsSurface, f: impl FnOnce(&Context<'_>) -> R) -> R {
        let ra = Subsurface::new(a, None, None).unwrap();
        let rb = Subsurface::new(b, None, None).unwrap();
        let ctx = Context::new(&ra, &rb, &Tolerances::default().resolved());
        f(&ctx)
    }

    fn with_context<R>(f: impl FnOnce(&Context<'_>) -> R) -> R {
        let (a, b) = planes();
        with_surfaces(&a, &b, f)
    }

    #[test]
    fn test_shuffled_points_make_one_line() {
        with_context(|ctx| {
            let mut raw: Vec<RawPoint> = (0..26)
                .map(|k| on_line((k * 7 % 26) as f64 * 0.08 - 1.0))
                .collect();
            raw.push(on_line(0.6));
            let events = build(ctx, raw, &[], &[]);
            assert_eq!(events.len(), 1, "{:?}", events);
            assert_eq!(events[0].kind, SsxKind::Transverse);
            let SsxLocus::Curve { curve_3d, curve_a, .. } = &events[0].locus else {
                panic!("expected a curve");
            };
            // straight chains are fitted to single segments
            assert_eq!(curve_3d.control_points.len(), 2);
            let (y0, y1) = (curve_3d.point_at_start().y, curve_3d.point_at_end().y);
            assert!((y0.min(y1) + 1.0).abs() < 1e-9 && (y0.max(y1) - 1.0).abs() < 1e-9);
            let mid = curve_a.point_at(curve_a.domain().mid());
            assert!((mid.x - 0.5).abs() < 1e-9 && (mid.y - 0.5).abs() < 1e-9);
        });
    }

    #[test]
    fn test_far_points_stay_isolated() {
        with_context(|ctx| {
            let raw = vec![on_line(-0.9), on_line(0.9)];
            let events = build(ctx, raw, &[], &[]);
            assert_eq!(events.len(), 2);
            assert!(events.iter().all(|e| e.kind == SsxKind::TransversePoint));
        });
    }

    #[test]
    fn test_points_on_contact_are_dropped() {
        with_context(|ctx| {
            let contact = NurbsCurve::line(p(0.0, -1.0, 0.0), p(0.0, 1.0, 0.0));
            let raw = (0..10).map(|k| on_line(-0.9 + 0.2 * k as f64)).collect();
            assert!(build(ctx, raw, &[], &[contact]).is_empty());
        });
    }

    #[test]
    fn test_tangent_curve_runs_along_nb_cross_na() {
        let (a, _) = planes();
        let (s, c) = 0.5f64.to_radians().sin_cos();
        let b = NurbsSurface::bilinear(p(-1.0, -c, -s), p(1.0, -c, -s), p(-1.0, c, s), p(1.0, c, s));
        with_surfaces(&a, &b, |ctx| {
            let raw = (0..26)
                .map(|k| {
                    let x = k as f64 * 0.08 - 1.0;
                    let uv = Point2::new(0.5 * (x + 1.0), 0.5);
                    RawPoint {
                        point: p(x, 0.0, 0.0),
                        uv_a: uv,
                        uv_b: uv,
                    }
                })
                .collect();
            let events = build(ctx, raw, &[], &[]);
            assert_eq!(events.len(), 1, "{:?}", events);
            assert_eq!(events[0].kind, SsxKind::Tangent);
            // nb x na points down the x axis
            let curve = events[0].curve_3d().unwrap();
            assert!(curve.point_at_start().x > curve.point_at_end().x);
        });
    }

    #[test]
    fn test_chains_join_at_ends() {
        let mut chains = Chains::new(6);
        assert!(chains.link(0, 1));
        assert!(chains.link(3, 4));
        assert!(chains.link(1, 2));
        assert!(chains.link(4, 2));
        // 1 is interior now
        assert!(!chains.link(1, 5));
        let lines: Vec<&Vec<usize>> = chains.lines.iter().filter(|l| !l.is_empty()).collect();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0], &vec![3, 4, 2, 1, 0]);
        assert!(chains.owner[5].is_none());
    }
}
