//! Intersection results.
//!
//! Every entry point appends events to a caller-owned `Vec` and returns
//! how many it added. Events are plain values and never borrow the
//! geometry or trees they were computed from.

use vcad_kernel_math::{Point2, Point3};
use vcad_kernel_nurbs::NurbsCurve;

// =============================================================================
// Point events
// =============================================================================

/// Parameters of a point event on its second operand.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointParams {
    /// The second operand is a point.
    None,
    /// Curve parameter.
    Curve(f64),
    /// Surface parameters `(u, v)`.
    Surface(Point2),
}

/// A point coinciding with a point, curve or surface.
#[derive(Debug, Clone, PartialEq)]
pub struct PointEvent {
    /// The query point.
    pub a: Point3,
    /// The closest point found on the second operand.
    pub b: Point3,
    /// Midpoint of `a` and `b`.
    pub point: Point3,
    /// Half the distance between `a` and `b`.
    pub radius: f64,
    /// Where `b` lies on the second operand.
    pub params: PointParams,
}

impl PointEvent {
    pub(crate) fn new(a: Point3, b: Point3, params: PointParams) -> Self {
        Self {
            a,
            b,
            point: nalgebra::center(&a, &b),
            radius: 0.5 * (a - b).norm(),
            params,
        }
    }
}

// =============================================================================
// Curve events
// =============================================================================

/// Kind of a curve/curve or curve/surface event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XKind {
    /// Isolated intersection point.
    Point,
    /// A parameter range where the operands coincide.
    Overlap,
}

/// Intersection of two curves.
///
/// For a point event both entries of each pair are equal. For an overlap
/// `a_params` is increasing and entry `i` of every array describes the
/// same end of the overlap.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveCurveEvent {
    /// Point or overlap.
    pub kind: XKind,
    /// Witness points on curve A.
    pub a: [Point3; 2],
    /// Witness points on curve B.
    pub b: [Point3; 2],
    /// Parameters on curve A.
    pub a_params: [f64; 2],
    /// Parameters on curve B.
    pub b_params: [f64; 2],
}

impl CurveCurveEvent {
    pub(crate) fn point(a: Point3, b: Point3, ta: f64, tb: f64) -> Self {
        Self {
            kind: XKind::Point,
            a: [a, a],
            b: [b, b],
            a_params: [ta, ta],
            b_params: [tb, tb],
        }
    }

    pub(crate) fn overlap(a: [Point3; 2], b: [Point3; 2], ta: [f64; 2], tb: [f64; 2]) -> Self {
        let mut e = Self {
            kind: XKind::Overlap,
            a,
            b,
            a_params: ta,
            b_params: tb,
        };
        if e.a_params[0] > e.a_params[1] {
            e.a.swap(0, 1);
            e.b.swap(0, 1);
            e.a_params.swap(0, 1);
            e.b_params.swap(0, 1);
        }
        e
    }

    /// True for an isolated point.
    pub fn is_point(&self) -> bool {
        self.kind == XKind::Point
    }

    /// True for an overlap range.
    pub fn is_overlap(&self) -> bool {
        self.kind == XKind::Overlap
    }

    /// The same event seen from curve B.
    pub fn swapped(&self) -> Self {
        let mut e = Self {
            kind: self.kind,
            a: self.b,
            b: self.a,
            a_params: self.b_params,
            b_params: self.a_params,
        };
        if e.a_params[0] > e.a_params[1] {
            e.a.swap(0, 1);
            e.b.swap(0, 1);
            e.a_params.swap(0, 1);
            e.b_params.swap(0, 1);
        }
        e
    }
}

/// Intersection of a curve with a surface.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveSurfaceEvent {
    /// Point or overlap.
    pub kind: XKind,
    /// Witness points on the curve.
    pub a: [Point3; 2],
    /// Witness points on the surface.
    pub b: [Point3; 2],
    /// Curve parameters, increasing for an overlap.
    pub a_params: [f64; 2],
    /// Surface parameters `(u, v)` at each end.
    pub b_params: [Point2; 2],
}

impl CurveSurfaceEvent {
    pub(crate) fn point(a: Point3, b: Point3, t: f64, uv: Point2) -> Self {
        Self {
            kind: XKind::Point,
            a: [a, a],
            b: [b, b],
            a_params: [t, t],
            b_params: [uv, uv],
        }
    }

    /// True for an isolated point.
    pub fn is_point(&self) -> bool {
        self.kind == XKind::Point
    }

    /// True for an overlap range.
    pub fn is_overlap(&self) -> bool {
        self.kind == XKind::Overlap
    }
}

// =============================================================================
// Surface events
// =============================================================================

/// Classification of a surface/surface event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SsxKind {
    /// Crossing curve; normals differ along it.
    Transverse,
    /// Touching curve; normals parallel along it.
    Tangent,
    /// Boundary of a region where the surfaces coincide.
    Overlap,
    /// Isolated crossing point.
    TransversePoint,
    /// Isolated touching point.
    TangentPoint,
}

/// Geometry of a surface/surface event.
#[derive(Debug, Clone)]
pub enum SsxLocus {
    /// An intersection curve with its pre-images in both parameter
    /// spaces (`z = 0`).
    Curve {
        /// The curve in model space.
        curve_3d: NurbsCurve,
        /// Pre-image on surface A.
        curve_a: NurbsCurve,
        /// Pre-image on surface B.
        curve_b: NurbsCurve,
    },
    /// An isolated point.
    Point {
        /// The point in model space.
        point: Point3,
        /// Parameters on surface A.
        uv_a: Point2,
        /// Parameters on surface B.
        uv_b: Point2,
    },
}

/// Intersection of two surfaces.
#[derive(Debug, Clone)]
pub struct SurfaceSurfaceEvent {
    /// Classification.
    pub kind: SsxKind,
    /// Curve or point.
    pub locus: SsxLocus,
}

impl SurfaceSurfaceEvent {
    /// True for the isolated point kinds.
    pub fn is_point(&self) -> bool {
        matches!(self.kind, SsxKind::TransversePoint | SsxKind::TangentPoint)
    }

    /// True for an overlap boundary.
    pub fn is_overlap(&self) -> bool {
        self.kind == SsxKind::Overlap
    }

    /// The model-space curve, if this is a curve event.
    pub fn curve_3d(&self) -> Option<&NurbsCurve> {
        match &self.locus {
            SsxLocus::Curve { curve_3d, .. } => Some(curve_3d),
            SsxLocus::Point { .. } => None,
        }
    }
}
