//! Coincident regions of two surfaces, traced from iso-curves.

use tracing::{debug, warn};

use super::{Context, RawPoint, Side};
use crate::curve_curve::{curve_curve, parameter_tolerance};
use crate::curve_surface::curve_surface;
use crate::events::{SsxKind, SsxLocus, SurfaceSurfaceEvent};
use crate::fit::fit_curve;
use crate::point::point_on_surface;
use crate::query::{CurveQuery, SurfaceQuery, Tolerances};
use vcad_kernel_math::{Interval, Point2, Point3, Vec2, ZERO_TOLERANCE};
use vcad_kernel_nurbs::{link_curves, Direction, NurbsCurve};

/// Step to either side of an iso-curve, as a fraction of the range of
/// its fixed parameter.
const SIDE_OFFSET: f64 = 0.01;

/// Samples per span when a loop is turned into a polygon.
const POLYGON_SAMPLES: usize = 8;

/// Everything the overlap phase hands on.
pub(super) struct PhaseOne {
    /// Overlap loops and boundary contact curves.
    pub events: Vec<SurfaceSurfaceEvent>,
    /// Coincident regions in the parameter space of A.
    pub regions: Vec<OverlapRegion>,
    /// Model-space contact curves.
    pub contacts: Vec<NurbsCurve>,
    /// Isolated iso-curve crossings, reused as intersection points.
    pub seeds: Vec<RawPoint>,
}

/// Trace the coincident regions of the two surfaces.
pub(super) fn find(ctx: &Context<'_>) -> PhaseOne {
    let mut segments = Vec::new();
    let mut contacts: Vec<(SsxKind, OverlapSegment)> = Vec::new();
    let mut seeds = Vec::new();
    let tols = segment_tolerances(ctx);

    for src in [Side::A, Side::B] {
        for dir in [Direction::U, Direction::V] {
            let root = ctx.root(src);
            let other = ctx.root(src.other());
            let fixed = fixed_range(ctx, src, dir);
            let along = fixed_range(ctx, src, dir.other());
            let closed = root.surface().is_closed(dir);
            for (i, value) in boundary_values(root.surface().span_vector(dir), &fixed, closed)
                .into_iter()
                .enumerate()
            {
                let Some(iso) = root.surface().iso_curve(dir, value) else {
                    continue;
                };
                // a pole
                if iso.bounding_box().diagonal_length() < ZERO_TOLERANCE {
                    continue;
                }
                let query = SurfaceQuery::new(other.surface()).with_tree(other);
                let hits = match curve_surface(CurveQuery::new(&iso).with_domain(along), query, &tols) {
                    Ok(hits) => hits,
                    Err(err) => {
                        warn!(%err, value, "iso-curve skipped");
                        continue;
                    }
                };
                for hit in hits {
                    let [t0, t1] = hit.event.a_params;
                    if hit.event.is_point() {
                        let (uv_a, uv_b) =
                            ctx.order(src, iso_uv(dir, value, t0), hit.event.b_params[0]);
                        seeds.push(RawPoint {
                            point: nalgebra::center(&hit.event.a[0], &hit.event.b[0]),
                            uv_a,
                            uv_b,
                        });
                        continue;
                    }
                    let Some(curve_other) = hit.curve_2d(ctx.fitting_tol) else {
                        continue;
                    };
                    let piece = iso
                        .sub_curve(&Interval::new(t0, t1))
                        .unwrap_or_else(|| iso.clone());
                    let seg = OverlapSegment::new(src, dir, value, piece, curve_other);
                    match seg.sides(ctx) {
                        (true, true) => {}
                        (false, false) => {
                            let on_edge = value == fixed.min || value == fixed.max;
                            let kind = seg.contact_kind(ctx, on_edge);
                            if !contacts.iter().any(|(_, c)| c.same_curve(&seg, ctx.tol)) {
                                contacts.push((kind, seg));
                            }
                        }
                        _ => {
                            if closed && i == 0 {
                                segments.push(seg.moved_to(fixed.max));
                            }
                            segments.push(seg);
                        }
                    }
                }
            }
        }
    }
    debug!(
        segments = segments.len(),
        contacts = contacts.len(),
        "overlap segments found"
    );

    let segments = split_at_crossings(ctx, segments);
    let segments = drop_contained(ctx, segments);
    let loops = link_loops(ctx, segments);

    let mut events = Vec::new();
    let mut outer: Vec<Vec<Point2>> = Vec::new();
    let mut inner: Vec<Vec<Point2>> = Vec::new();
    for lp in loops {
        let Some(oriented) = orient(ctx, lp) else {
            warn!("cannot determine the correct direction of overlap event");
            continue;
        };
        match oriented.hole {
            false => outer.push(oriented.polygon),
            true => inner.push(oriented.polygon),
        }
        events.push(oriented.event);
    }
    let regions = assemble_regions(outer, inner);

    let mut curves = Vec::with_capacity(contacts.len());
    for (kind, seg) in contacts {
        curves.push(seg.curve_3d.clone());
        events.push(SurfaceSurfaceEvent {
            kind,
            locus: SsxLocus::Curve {
                curve_3d: seg.curve_3d,
                curve_a: seg.curve_a,
                curve_b: seg.curve_b,
            },
        });
    }
    PhaseOne {
        events,
        regions,
        contacts: curves,
        seeds,
    }
}

fn fixed_range(ctx: &Context<'_>, src: Side, dir: Direction) -> Interval {
    let root = ctx.root(src);
    match dir {
        Direction::U => root.u(),
        Direction::V => root.v(),
    }
}

/// Span boundaries inside `fixed` plus its ends. The last value is left
/// out of a closed direction; it repeats the first.
fn boundary_values(spans: Vec<f64>, fixed: &Interval, closed: bool) -> Vec<f64> {
    let mut values = vec![fixed.min];
    values.extend(spans.into_iter().filter(|k| fixed.includes_interior(*k)));
    values.push(fixed.max);
    values.dedup();
    if closed {
        values.pop();
    }
    values
}

/// Parameters on the source surface of a point on the iso-curve where
/// `dir` is fixed at `value`.
fn iso_uv(dir: Direction, value: f64, t: f64) -> Point2 {
    match dir {
        Direction::U => Point2::new(value, t),
        Direction::V => Point2::new(t, value),
    }
}

fn flat(p: Point2) -> Point3 {
    Point3::new(p.x, p.y, 0.0)
}

/// True if `uv` on `src` lies on the other surface with parallel normals.
fn is_coincident(ctx: &Context<'_>, src: Side, uv: Point2) -> bool {
    let root = ctx.root(src);
    if !root.u().includes(uv.x) || !root.v().includes(uv.y) {
        return false;
    }
    let p = root.surface().point_at(uv.x, uv.y);
    match point_on_surface(&p, ctx.root(src.other()), ctx.overlap_tol) {
        Some((uv_other, _)) => {
            let (uv_a, uv_b) = ctx.order(src, uv, uv_other);
            ctx.normals_parallel(&uv_a, &uv_b)
        }
        None => false,
    }
}

// =============================================================================
// Segments
// =============================================================================

/// A piece of iso-curve lying on the other surface, with its pre-images
/// in both parameter spaces. All three curves share one parameter.
#[derive(Debug, Clone)]
struct OverlapSegment {
    curve_3d: NurbsCurve,
    curve_a: NurbsCurve,
    curve_b: NurbsCurve,
    src: Side,
    dir: Direction,
    value: f64,
}

/// One end of a segment in all three spaces.
struct End {
    point: Point3,
    uv_a: Point2,
    uv_b: Point2,
}

impl OverlapSegment {
    fn new(src: Side, dir: Direction, value: f64, curve_3d: NurbsCurve, curve_other: NurbsCurve) -> Self {
        let dom = curve_3d.domain();
        let curve_src = iso_line(dir, value, &dom);
        let (curve_a, curve_b) = match src {
            Side::A => (curve_src, curve_other),
            Side::B => (curve_other, curve_src),
        };
        Self {
            curve_3d,
            curve_a,
            curve_b,
            src,
            dir,
            value,
        }
    }

    /// The same piece on the other side of a closed seam.
    fn moved_to(&self, value: f64) -> Self {
        let line = iso_line(self.dir, value, &self.curve_3d.domain());
        let mut seg = self.clone();
        seg.value = value;
        match self.src {
            Side::A => seg.curve_a = line,
            Side::B => seg.curve_b = line,
        }
        seg
    }

    fn domain(&self) -> Interval {
        self.curve_3d.domain()
    }

    fn end(&self, start: bool) -> End {
        let t = if start { self.domain().min } else { self.domain().max };
        let a = self.curve_a.point_at(t);
        let b = self.curve_b.point_at(t);
        End {
            point: self.curve_3d.point_at(t),
            uv_a: Point2::new(a.x, a.y),
            uv_b: Point2::new(b.x, b.y),
        }
    }

    /// Coincidence just beside the middle of the segment, below and
    /// above the fixed parameter.
    fn sides(&self, ctx: &Context<'_>) -> (bool, bool) {
        let delta = SIDE_OFFSET * fixed_range(ctx, self.src, self.dir).length();
        let t = self.domain().mid();
        let side = |value: f64| is_coincident(ctx, self.src, iso_uv(self.dir, value, t));
        (side(self.value - delta), side(self.value + delta))
    }

    fn bounds_region(&self, ctx: &Context<'_>) -> bool {
        let (lo, hi) = self.sides(ctx);
        lo != hi
    }

    fn contact_kind(&self, ctx: &Context<'_>, on_edge: bool) -> SsxKind {
        let t = self.domain().mid();
        let a = self.curve_a.point_at(t);
        let b = self.curve_b.point_at(t);
        let parallel = ctx.normals_parallel(&Point2::new(a.x, a.y), &Point2::new(b.x, b.y));
        match (parallel, on_edge) {
            (true, true) => SsxKind::Overlap,
            (true, false) => SsxKind::Tangent,
            (false, _) => SsxKind::Transverse,
        }
    }

    /// True if both segments run between the same model-space points
    /// through the same middle, in either direction.
    fn same_curve(&self, other: &Self, tol: f64) -> bool {
        let ends = |s: &Self| (s.curve_3d.point_at_start(), s.curve_3d.point_at_end());
        let mid = |s: &Self| s.curve_3d.point_at(s.domain().mid());
        let (p0, p1) = ends(self);
        let (q0, q1) = ends(other);
        let same_ends = ((p0 - q0).norm() <= tol && (p1 - q1).norm() <= tol)
            || ((p0 - q1).norm() <= tol && (p1 - q0).norm() <= tol);
        same_ends && (mid(self) - mid(other)).norm() <= tol
    }

    fn split(&self, t: f64) -> Option<(Self, Self)> {
        let (l3, r3) = self.curve_3d.split(t)?;
        let (la, ra) = self.curve_a.split(t)?;
        let (lb, rb) = self.curve_b.split(t)?;
        let with = |curve_3d, curve_a, curve_b| Self {
            curve_3d,
            curve_a,
            curve_b,
            ..self.clone()
        };
        Some((with(l3, la, lb), with(r3, ra, rb)))
    }

    fn reverse(&mut self) {
        self.curve_3d.reverse();
        self.curve_a.reverse();
        self.curve_b.reverse();
    }

    /// `self` followed by `next`.
    fn join(self, next: Self) -> Self {
        Self {
            curve_3d: link_curves(self.curve_3d, next.curve_3d),
            curve_a: link_curves(self.curve_a, next.curve_a),
            curve_b: link_curves(self.curve_b, next.curve_b),
            ..self
        }
    }

    fn is_closed(&self, ctx: &Context<'_>) -> bool {
        ends_match(ctx, &self.end(true), &self.end(false))
    }
}

/// The pre-image of an iso-curve piece on its own surface.
fn iso_line(dir: Direction, value: f64, dom: &Interval) -> NurbsCurve {
    let mut line = NurbsCurve::line(
        flat(iso_uv(dir, value, dom.min)),
        flat(iso_uv(dir, value, dom.max)),
    );
    line.set_domain(dom.min, dom.max);
    line
}

fn ends_match(ctx: &Context<'_>, x: &End, y: &End) -> bool {
    (x.point - y.point).norm() <= ctx.overlap_tol
        && ctx.uv_close(Side::A, &x.uv_a, &y.uv_a, 2.0)
        && ctx.uv_close(Side::B, &x.uv_b, &y.uv_b, 2.0)
}

fn segment_tolerances(ctx: &Context<'_>) -> Tolerances {
    Tolerances {
        intersection: ctx.tol,
        overlap: ctx.overlap_tol,
        fitting: ctx.fitting_tol,
    }
}

/// Split every segment where another one crosses it, keeping only the
/// pieces that still bound a region.
fn split_at_crossings(ctx: &Context<'_>, segments: Vec<OverlapSegment>) -> Vec<OverlapSegment> {
    let tols = segment_tolerances(ctx);
    let mut out = Vec::with_capacity(segments.len());
    for (i, seg) in segments.iter().enumerate() {
        let dom = seg.domain();
        let t_tol = parameter_tolerance(ctx.tol, &dom, &seg.curve_3d.bounding_box());
        let mut cuts: Vec<f64> = Vec::new();
        for (j, other) in segments.iter().enumerate() {
            if i == j {
                continue;
            }
            let Ok(found) = curve_curve(
                CurveQuery::new(&seg.curve_3d),
                CurveQuery::new(&other.curve_3d),
                &tols,
            ) else {
                continue;
            };
            for e in found {
                let params: &[f64] = if e.is_point() { &e.a_params[..1] } else { &e.a_params };
                cuts.extend(
                    params
                        .iter()
                        .copied()
                        .filter(|&t| t - dom.min > t_tol && dom.max - t > t_tol),
                );
            }
        }
        if cuts.is_empty() {
            out.push(seg.clone());
            continue;
        }
        cuts.sort_by(f64::total_cmp);
        cuts.dedup_by(|b, a| *b - *a <= t_tol);

        let mut rest = seg.clone();
        let mut pieces = Vec::with_capacity(cuts.len() + 1);
        for t in cuts {
            match rest.split(t) {
                Some((left, right)) => {
                    pieces.push(left);
                    rest = right;
                }
                None => break,
            }
        }
        pieces.push(rest);
        out.extend(pieces.into_iter().filter(|p| p.bounds_region(ctx)));
    }
    out
}

/// Remove segments that lie along another segment over their whole
/// length in all three spaces.
fn drop_contained(ctx: &Context<'_>, segments: Vec<OverlapSegment>) -> Vec<OverlapSegment> {
    let tols = segment_tolerances(ctx);
    let n = segments.len();
    let mut keep = vec![true; n];
    for i in 0..n {
        for j in 0..n {
            if i == j || !keep[j] {
                continue;
            }
            if contained_in(ctx, &tols, &segments[i], &segments[j]) {
                keep[i] = false;
                break;
            }
        }
    }
    segments
        .into_iter()
        .zip(keep)
        .filter_map(|(s, k)| k.then_some(s))
        .collect()
}

fn contained_in(ctx: &Context<'_>, tols: &Tolerances, seg: &OverlapSegment, host: &OverlapSegment) -> bool {
    let dom = seg.domain();
    let t_tol = parameter_tolerance(ctx.tol, &dom, &seg.curve_3d.bounding_box());
    let Ok(found) = curve_curve(
        CurveQuery::new(&seg.curve_3d),
        CurveQuery::new(&host.curve_3d),
        tols,
    ) else {
        return false;
    };
    found.iter().any(|e| {
        if !e.is_overlap() || e.a_params[0] > dom.min + t_tol || e.a_params[1] < dom.max - t_tol {
            return false;
        }
        (0..2).all(|k| {
            let (ta, tb) = (e.a_params[k], e.b_params[k]);
            let pa = |c: &NurbsCurve, t: f64| {
                let p = c.point_at(t);
                Point2::new(p.x, p.y)
            };
            ctx.uv_close(Side::A, &pa(&seg.curve_a, ta), &pa(&host.curve_a, tb), 2.0)
                && ctx.uv_close(Side::B, &pa(&seg.curve_b, ta), &pa(&host.curve_b, tb), 2.0)
        })
    })
}

/// Link segments end to end into closed loops. Segments with an
/// unmatched end are dropped first.
fn link_loops(ctx: &Context<'_>, mut segments: Vec<OverlapSegment>) -> Vec<OverlapSegment> {
    loop {
        let linked: Vec<bool> = segments
            .iter()
            .enumerate()
            .map(|(i, seg)| {
                seg.is_closed(ctx)
                    || [true, false].iter().all(|&at_start| {
                        let end = seg.end(at_start);
                        segments.iter().enumerate().any(|(j, other)| {
                            j != i
                                && (ends_match(ctx, &end, &other.end(true))
                                    || ends_match(ctx, &end, &other.end(false)))
                        })
                    })
            })
            .collect();
        if linked.iter().all(|&l| l) {
            break;
        }
        segments = segments
            .into_iter()
            .zip(linked)
            .filter_map(|(s, l)| l.then_some(s))
            .collect();
    }

    let mut loops = Vec::new();
    while let Some(mut cur) = segments.pop() {
        loop {
            if cur.is_closed(ctx) {
                loops.push(cur);
                break;
            }
            let (head, tail) = (cur.end(true), cur.end(false));
            let found = segments.iter().enumerate().find_map(|(k, s)| {
                if ends_match(ctx, &tail, &s.end(true)) {
                    Some((k, true, false))
                } else if ends_match(ctx, &tail, &s.end(false)) {
                    Some((k, true, true))
                } else if ends_match(ctx, &head, &s.end(false)) {
                    Some((k, false, false))
                } else if ends_match(ctx, &head, &s.end(true)) {
                    Some((k, false, true))
                } else {
                    None
                }
            });
            let Some((k, append, reverse)) = found else {
                debug!("open overlap chain dropped");
                break;
            };
            let mut next = segments.swap_remove(k);
            if reverse {
                next.reverse();
            }
            cur = if append { cur.join(next) } else { next.join(cur) };
        }
    }
    loops
}

// =============================================================================
// Loops and regions
// =============================================================================

struct OrientedLoop {
    event: SurfaceSurfaceEvent,
    polygon: Vec<Point2>,
    hole: bool,
}

/// Orient a closed loop so the coincident region lies to the left of its
/// pre-image on A. A loop whose inside is not coincident is a hole.
fn orient(ctx: &Context<'_>, mut lp: OverlapSegment) -> Option<OrientedLoop> {
    let fit = |c: NurbsCurve| {
        let mut c = fit_curve(c, ctx.fitting_tol);
        c.set_domain(0.0, 1.0);
        c
    };
    lp.curve_3d = fit(lp.curve_3d);
    lp.curve_a = fit(lp.curve_a);
    lp.curve_b = fit(lp.curve_b);

    let polygon: Vec<Point2> = lp
        .curve_a
        .sample_spans(POLYGON_SAMPLES)
        .into_iter()
        .map(|(_, p)| Point2::new(p.x, p.y))
        .collect();
    let (lo, hi) = polygon.iter().fold(
        (Vec2::repeat(f64::INFINITY), Vec2::repeat(f64::NEG_INFINITY)),
        |(lo, hi), p| (lo.inf(&p.coords), hi.sup(&p.coords)),
    );
    let extent = (hi - lo).min();
    if extent.is_nan() || extent <= 0.0 {
        return None;
    }
    let delta = (SIDE_OFFSET * ctx.rect_a.u.length().min(ctx.rect_a.v.length())).min(0.25 * extent);

    // middle of the first span, away from any corner
    let spans = lp.curve_a.span_vector();
    let t = match spans.as_slice() {
        [t0, t1, ..] => 0.5 * (t0 + t1),
        _ => lp.curve_a.domain().mid(),
    };
    let (p, d) = lp.curve_a.ev1der(t);
    let tangent = Vec2::new(d.x, d.y);
    if tangent.norm() == 0.0 {
        return None;
    }
    let left = Vec2::new(-tangent.y, tangent.x).normalize() * delta;
    let mid = Point2::new(p.x, p.y);
    let inside_left = match (in_polygon(&polygon, &(mid + left)), in_polygon(&polygon, &(mid - left))) {
        (true, false) => true,
        (false, true) => false,
        _ => return None,
    };
    let inside = if inside_left { mid + left } else { mid - left };
    let hole = !is_coincident(ctx, Side::A, inside);
    if hole == inside_left {
        lp.reverse();
    }
    Some(OrientedLoop {
        event: SurfaceSurfaceEvent {
            kind: SsxKind::Overlap,
            locus: SsxLocus::Curve {
                curve_3d: lp.curve_3d,
                curve_a: lp.curve_a,
                curve_b: lp.curve_b,
            },
        },
        polygon,
        hole,
    })
}

/// A coincident region in the parameter space of A: an outer loop minus
/// its holes.
#[derive(Debug, Clone)]
pub(super) struct OverlapRegion {
    outer: Vec<Point2>,
    holes: Vec<Vec<Point2>>,
}

impl OverlapRegion {
    /// True if `p` lies inside the outer loop and outside every hole.
    pub fn contains_uv(&self, p: &Point2) -> bool {
        in_polygon(&self.outer, p) && !self.holes.iter().any(|h| in_polygon(h, p))
    }

    /// True if the whole box `u × v` lies inside the region.
    pub fn contains_box(&self, u: &Interval, v: &Interval) -> bool {
        let samples = [
            Point2::new(u.min, v.min),
            Point2::new(u.max, v.min),
            Point2::new(u.max, v.max),
            Point2::new(u.min, v.max),
            Point2::new(u.mid(), v.mid()),
        ];
        samples.iter().all(|p| self.contains_uv(p))
            && !std::iter::once(&self.outer)
                .chain(&self.holes)
                .any(|poly| poly.windows(2).any(|w| segment_hits_box(&w[0], &w[1], u, v)))
    }
}

/// Give each hole to the smallest outer loop around it.
fn assemble_regions(outer: Vec<Vec<Point2>>, inner: Vec<Vec<Point2>>) -> Vec<OverlapRegion> {
    let mut regions: Vec<OverlapRegion> = outer
        .into_iter()
        .map(|outer| OverlapRegion {
            outer,
            holes: Vec::new(),
        })
        .collect();
    for hole in inner {
        let Some(first) = hole.first() else {
            continue;
        };
        let host = regions
            .iter_mut()
            .filter(|r| in_polygon(&r.outer, first))
            .min_by(|x, y| area(&x.outer).total_cmp(&area(&y.outer)));
        match host {
            Some(r) => r.holes.push(hole),
            None => debug!("hole without an enclosing overlap loop"),
        }
    }
    regions
}

fn area(poly: &[Point2]) -> f64 {
    let n = poly.len();
    let twice: f64 = (0..n)
        .map(|i| {
            let (p, q) = (poly[i], poly[(i + 1) % n]);
            p.x * q.y - q.x * p.y
        })
        .sum();
    0.5 * twice.abs()
}

/// Even-odd test against a closed polygon; a crossing at a tangent
/// vertex counts.
fn in_polygon(poly: &[Point2], p: &Point2) -> bool {
    let n = poly.len();
    let mut inside = false;
    for i in 0..n {
        let (a, b) = (poly[i], poly[(i + n - 1) % n]);
        if (a.y > p.y) != (b.y > p.y) {
            let x = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x {
                inside = !inside;
            }
        }
    }
    inside
}

/// Liang–Barsky clip of segment `pq` against the box `u × v`.
fn segment_hits_box(p: &Point2, q: &Point2, u: &Interval, v: &Interval) -> bool {
    let d = q - p;
    let (mut t0, mut t1) = (0.0f64, 1.0f64);
    for (pk, qk) in [
        (-d.x, p.x - u.min),
        (d.x, u.max - p.x),
        (-d.y, p.y - v.min),
        (d.y, v.max - p.y),
    ] {
        if pk == 0.0 {
            if qk < 0.0 {
                return false;
            }
            continue;
        }
        let r = qk / pk;
        if pk < 0.0 {
            if r > t1 {
                return false;
            }
            t0 = t0.max(r);
        } else {
            if r < t0 {
                return false;
            }
            t1 = t1.min(r);
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subdivision::Subsurface;
    use vcad_kernel_nurbs::NurbsSurface;

    fn p(x: f64, y: f64, z: f64) -> Point3 {
        Point3::new(x, y, z)
    }

    fn square(x0: f64, y0: f64, size: f64) -> NurbsSurface {
        NurbsSurface::bilinear(
            p(x0, y0, 0.0),
            p(x0 + size, y0, 0.0),
            p(x0, y0 + size, 0.0),
            p(x0 + size, y0 + size, 0.0),
        )
    }

    fn with_context<R>(a: &NurbsSurface, b: &NurbsSurface, f: impl FnOnce(&Context<'_>) -> R) -> R {
        let ra = Subsurface::new(a, None, None).unwrap();
        let rb = Subsurface::new(b, None, None).unwrap();
        let ctx = Context::new(&ra, &rb, &Tolerances::default().resolved());
        f(&ctx)
    }

    fn unit_square() -> Vec<Point2> {
        vec![
            Point2::new(0.0, 0.0),
            Point2::new(1.0, 0.0),
            Point2::new(1.0, 1.0),
            Point2::new(0.0, 1.0),
            Point2::new(0.0, 0.0),
        ]
    }

    #[test]
    fn test_boundary_values() {
        let fixed = Interval::new(0.0, 1.0);
        assert_eq!(boundary_values(vec![0.0, 0.5, 1.0], &fixed, false), vec![0.0, 0.5, 1.0]);
        assert_eq!(boundary_values(vec![0.0, 0.5, 1.0], &fixed, true), vec![0.0, 0.5]);
        let part = Interval::new(0.25, 1.0);
        assert_eq!(boundary_values(vec![0.0, 0.5, 1.0], &part, false), vec![0.25, 0.5, 1.0]);
    }

    #[test]
    fn test_polygon_containment() {
        let sq = unit_square();
        assert!(in_polygon(&sq, &Point2::new(0.5, 0.5)));
        assert!(!in_polygon(&sq, &Point2::new(1.5, 0.5)));
        assert!((area(&sq) - 1.0).abs() < 1e-12);

        let inner = vec![
            Point2::new(0.25, 0.25),
            Point2::new(0.75, 0.25),
            Point2::new(0.75, 0.75),
            Point2::new(0.25, 0.75),
            Point2::new(0.25, 0.25),
        ];
        let regions = assemble_regions(vec![sq], vec![inner]);
        assert_eq!(regions.len(), 1);
        let r = &regions[0];
        assert!(r.contains_uv(&Point2::new(0.1, 0.1)));
        assert!(!r.contains_uv(&Point2::new(0.5, 0.5)));
        assert!(r.contains_box(&Interval::new(0.05, 0.2), &Interval::new(0.05, 0.2)));
        assert!(!r.contains_box(&Interval::new(0.1, 0.3), &Interval::new(0.1, 0.3)));
        assert!(!r.contains_box(&Interval::new(0.9, 1.1), &Interval::new(0.4, 0.5)));
    }

    #[test]
    fn test_segment_box_clip() {
        let (u, v) = (Interval::new(0.0, 1.0), Interval::new(0.0, 1.0));
        assert!(segment_hits_box(&Point2::new(-1.0, 0.5), &Point2::new(2.0, 0.5), &u, &v));
        assert!(!segment_hits_box(&Point2::new(-1.0, 1.5), &Point2::new(2.0, 1.5), &u, &v));
        assert!(!segment_hits_box(&Point2::new(1.5, -1.0), &Point2::new(3.0, 0.5), &u, &v));
    }

    #[test]
    fn test_shared_edge_is_contact() {
        let a = square(0.0, 0.0, 1.0);
        let b = square(1.0, 0.0, 1.0);
        with_context(&a, &b, |ctx| {
            let found = find(ctx);
            assert_eq!(found.events.len(), 1);
            assert_eq!(found.events[0].kind, SsxKind::Overlap);
            assert!(found.regions.is_empty());
            let curve = found.events[0].curve_3d().unwrap();
            for t in [0.0, 0.5, 1.0] {
                let q = curve.point_at(curve.domain().parameter_at(t));
                assert!((q.x - 1.0).abs() < 0.001, "{}", q);
            }
        });
    }

    #[test]
    fn test_loop_around_gap_is_a_hole() {
        let a = square(0.0, 0.0, 4.0);
        let b = NurbsSurface::bilinear(p(2.0, 0.0, 0.0), p(4.0, 0.0, 0.0), p(2.0, 4.0, 0.0), p(4.0, 4.0, 0.0));
        let uv = [(0.1, 0.25), (0.4, 0.25), (0.4, 0.75), (0.1, 0.75), (0.1, 0.25)];
        let params = [0.0, 0.1875, 0.5, 0.6875, 1.0];
        let line = |f: &dyn Fn(f64, f64) -> Point3| {
            let pts: Vec<Point3> = uv.iter().map(|&(u, v)| f(u, v)).collect();
            NurbsCurve::polyline_with_params(&pts, &params)
        };
        let lp = OverlapSegment {
            curve_3d: line(&|u, v| p(4.0 * u, 4.0 * v, 0.0)),
            curve_a: line(&|u, v| p(u, v, 0.0)),
            curve_b: line(&|u, v| p(2.0 * u - 1.0, v, 0.0)),
            src: Side::A,
            dir: Direction::U,
            value: 0.1,
        };
        with_context(&a, &b, |ctx| {
            let oriented = orient(ctx, lp).unwrap();
            assert!(oriented.hole);
            let SsxLocus::Curve { curve_a, .. } = &oriented.event.locus else {
                panic!("expected a loop");
            };
            // a hole runs clockwise so the coincident side stays on its left
            let pts: Vec<Point3> = curve_a.sample_spans(8).into_iter().map(|(_, q)| q).collect();
            let n = pts.len();
            let signed: f64 = (0..n)
                .map(|i| {
                    let (q, r) = (pts[i], pts[(i + 1) % n]);
                    q.x * r.y - r.x * q.y
                })
                .sum();
            assert!(signed < 0.0, "{}", signed);
        });
    }

    #[test]
    fn test_overlapping_squares_make_one_loop() {
        let a = square(0.0, 0.0, 2.0);
        let b = square(1.0, 1.0, 2.0);
        with_context(&a, &b, |ctx| {
            let found = find(ctx);
            assert_eq!(found.events.len(), 1, "{:?}", found.events);
            assert_eq!(found.regions.len(), 1);
            let region = &found.regions[0];
            assert!(region.contains_uv(&Point2::new(0.75, 0.75)));
            assert!(!region.contains_uv(&Point2::new(0.25, 0.75)));

            let SsxLocus::Curve { curve_3d, curve_a, .. } = &found.events[0].locus else {
                panic!("expected a loop");
            };
            assert!((curve_3d.point_at_start() - curve_3d.point_at_end()).norm() < 0.001);
            // region on the left of the loop in A's parameters
            let (q, d) = curve_a.ev1der(0.3);
            let left = Point2::new(q.x - 0.01 * d.y / d.norm(), q.y + 0.01 * d.x / d.norm());
            assert!(region.contains_uv(&left));
        });
    }
}
