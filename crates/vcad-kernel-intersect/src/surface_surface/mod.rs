//! Surface/surface intersection.
//!
//! The search runs in four phases:
//!
//! 1. Coincident regions are traced from the iso-curves along the span
//!    boundaries of both surfaces ([`overlap`]). An iso-curve piece that
//!    lies on the other surface bounds a region when exactly one of its
//!    sides is coincident too. The pieces are split where they cross,
//!    linked into closed loops and oriented so the region lies on the
//!    left in the parameter space of surface A.
//! 2. Both trees are descended in lockstep; nodes of A inside a known
//!    region are skipped.
//! 3. Every leaf pair is approximated by two triangles per side and the
//!    triangle crossings seed a Newton solve on both surfaces
//!    ([`triangle`]).
//! 4. The refined points are chained into polylines, fitted and
//!    classified by their normals ([`polyline`]).

mod overlap;
mod polyline;
mod triangle;

use tracing::{debug, warn};

use crate::error::IntersectError;
use crate::events::SurfaceSurfaceEvent;
use crate::newton::{self, Rect, SurfaceSurfaceRoot};
use crate::query::{SurfaceQuery, Tolerances};
use crate::subdivision::{candidate_pairs, Subsurface};
use vcad_kernel_math::{Interval, Point2, Point3, Tolerance, Vec2};
use vcad_kernel_nurbs::Direction;

/// Intersect two surfaces and append the events to `events`.
///
/// Returns the number of events appended.
pub fn intersect_surface_surface(
    a: SurfaceQuery<'_>,
    b: SurfaceQuery<'_>,
    tolerances: &Tolerances,
    events: &mut Vec<SurfaceSurfaceEvent>,
) -> usize {
    match surface_surface(a, b, &tolerances.resolved()) {
        Ok(found) => {
            let n = found.len();
            events.extend(found);
            n
        }
        Err(err) => {
            warn!(%err, "surface/surface intersection skipped");
            0
        }
    }
}

fn surface_surface(
    a: SurfaceQuery<'_>,
    b: SurfaceQuery<'_>,
    tols: &Tolerances,
) -> Result<Vec<SurfaceSurfaceEvent>, IntersectError> {
    let tree_a = a.root()?;
    let tree_b = b.root()?;
    let root_a: &Subsurface = &tree_a;
    let root_b: &Subsurface = &tree_b;
    if !root_a.bbox().intersects(root_b.bbox(), tols.intersection) {
        return Ok(Vec::new());
    }
    let ctx = Context::new(root_a, root_b, tols);

    let phase_one = overlap::find(&ctx);
    let mut events = phase_one.events;
    if root_a.is_planar() && root_b.is_planar() && !events.is_empty() {
        return Ok(events);
    }
    let regions = phase_one.regions;

    let pairs = candidate_pairs(root_a, root_b, ctx.tol, true, |node| {
        regions.iter().any(|r| r.contains_box(&node.u(), &node.v()))
    });
    let mut raw = phase_one.seeds;
    let seeded = raw.len();
    raw.extend(pairs.iter().filter_map(|(na, nb)| triangle::leaf_point(&ctx, na, nb)));
    debug!(
        pairs = pairs.len(),
        seeded,
        points = raw.len(),
        "surface/surface raw points"
    );

    events.extend(polyline::build(&ctx, raw, &regions, &phase_one.contacts));
    Ok(events)
}

// =============================================================================
// Shared state
// =============================================================================

/// One of the two operands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Side {
    A,
    B,
}

impl Side {
    pub fn other(self) -> Self {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// A refined intersection point with its parameters on both surfaces.
#[derive(Debug, Clone, Copy)]
pub(super) struct RawPoint {
    pub point: Point3,
    pub uv_a: Point2,
    pub uv_b: Point2,
}

impl From<SurfaceSurfaceRoot> for RawPoint {
    fn from(r: SurfaceSurfaceRoot) -> Self {
        Self {
            point: r.point,
            uv_a: r.uv_a,
            uv_b: r.uv_b,
        }
    }
}

pub(super) struct Context<'a> {
    pub a: &'a Subsurface,
    pub b: &'a Subsurface,
    pub rect_a: Rect,
    pub rect_b: Rect,
    pub tol: f64,
    pub overlap_tol: f64,
    pub fitting_tol: f64,
    /// Parameter distances that correspond to `tol` on each surface.
    pub uv_tol_a: Vec2,
    pub uv_tol_b: Vec2,
}

impl<'a> Context<'a> {
    fn new(a: &'a Subsurface, b: &'a Subsurface, tols: &Tolerances) -> Self {
        let tol = tols.intersection;
        let uv_tol = |s: &Subsurface| {
            let diag = s.bbox().diagonal_length();
            let scale = if diag > 0.0 { tol / diag } else { tol };
            Vec2::new(s.u().length() * scale, s.v().length() * scale)
        };
        Self {
            a,
            b,
            rect_a: Rect { u: a.u(), v: a.v() },
            rect_b: Rect { u: b.u(), v: b.v() },
            tol,
            overlap_tol: tols.overlap,
            fitting_tol: tols.fitting,
            uv_tol_a: uv_tol(a),
            uv_tol_b: uv_tol(b),
        }
    }

    pub fn root(&self, side: Side) -> &'a Subsurface {
        match side {
            Side::A => self.a,
            Side::B => self.b,
        }
    }

    pub fn uv_tol(&self, side: Side) -> Vec2 {
        match side {
            Side::A => self.uv_tol_a,
            Side::B => self.uv_tol_b,
        }
    }

    pub fn newton(&self, uv_a: Point2, uv_b: Point2) -> Option<SurfaceSurfaceRoot> {
        newton::surface_surface(
            self.a.surface(),
            &self.rect_a,
            self.b.surface(),
            &self.rect_b,
            uv_a,
            uv_b,
            self.tol,
        )
    }

    /// True if both surfaces have parallel normals at the given
    /// parameters. A missing normal counts as not parallel.
    pub fn normals_parallel(&self, uv_a: &Point2, uv_b: &Point2) -> bool {
        let na = self.a.surface().normal_at(uv_a.x, uv_a.y);
        let nb = self.b.surface().normal_at(uv_b.x, uv_b.y);
        match (na, nb) {
            (Some(na), Some(nb)) => Tolerance::DEFAULT.parallel(&na, &nb),
            _ => false,
        }
    }

    /// True if `p` and `q` differ by at most `factor` times the
    /// parameter tolerance of `side` on each axis.
    pub fn uv_close(&self, side: Side, p: &Point2, q: &Point2, factor: f64) -> bool {
        let t = self.uv_tol(side) * factor;
        (p.x - q.x).abs() <= t.x && (p.y - q.y).abs() <= t.y
    }

    /// Order a pair of parameters given on `src` and the other surface
    /// as `(uv_a, uv_b)`.
    pub fn order(&self, src: Side, uv_src: Point2, uv_other: Point2) -> (Point2, Point2) {
        match src {
            Side::A => (uv_src, uv_other),
            Side::B => (uv_other, uv_src),
        }
    }

    /// Period of each parameter direction of `side` that closes on
    /// itself over the whole searched range.
    pub fn periods(&self, side: Side) -> [Option<f64>; 2] {
        let root = self.root(side);
        let period = |dir: Direction, range: Interval| {
            root.surface().is_closed(dir).then(|| range.length())
        };
        [period(Direction::U, root.u()), period(Direction::V, root.v())]
    }
}
