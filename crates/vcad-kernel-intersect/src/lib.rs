#![warn(missing_docs)]

//! Intersection of NURBS geometry for the vcad kernel.
//!
//! Every pairing of points, curves and surfaces is covered:
//!
//! - **PPI / PCI / PSI**: a point against a point, curve or surface
//! - **CCI**: curve/curve, isolated points and coincident ranges
//! - **CSI**: curve/surface, isolated points and ranges lying on the
//!   surface
//! - **SSI**: surface/surface, intersection curves with their pre-images
//!   on both surfaces, isolated points and the boundaries of coincident
//!   regions
//!
//! The searches share one pattern: both operands are bounding-box
//! subdivided in lockstep ([`subdivision`]), candidate leaf pairs are
//! solved in closed form when flat, seeds are refined with Newton and the
//! refined points are merged into events. Operands may carry a prebuilt
//! tree so repeated queries against one curve or surface share the work.
//!
//! Entry points append to a caller-owned `Vec` and return the number of
//! events added. Failures to build a tree are logged and reported as zero
//! events.

mod curve_curve;
mod curve_surface;
mod domain;
mod error;
mod events;
mod fit;
mod newton;
mod point;
mod query;
pub mod subdivision;
mod surface_surface;

pub use curve_curve::intersect_curve_curve;
pub use curve_surface::intersect_curve_surface;
pub use domain::clamp_domain;
pub use error::IntersectError;
pub use events::{
    CurveCurveEvent, CurveSurfaceEvent, PointEvent, PointParams, SsxKind, SsxLocus,
    SurfaceSurfaceEvent, XKind,
};
pub use fit::fit_curve;
pub use point::{intersect_point_curve, intersect_point_point, intersect_point_surface};
pub use query::{CurveQuery, SurfaceQuery, Tolerances};
pub use subdivision::{Subcurve, Subdivision, Subsurface};
pub use surface_surface::intersect_surface_surface;

/// Depth limit of the lockstep tree descent.
pub const MAX_SUBDIVISION_DEPTH: usize = 8;

/// Iteration limit of every Newton refinement.
pub const MAX_NEWTON_ITERATIONS: usize = 100;

/// Interior samples that must agree before two curves count as
/// coincident over a range.
///
/// Sampling can miss an overlap whose two ends refine to one point.
pub const CCI_OVERLAP_TEST_POINTS: usize = 16;

/// Interior samples that must lie on the surface before a curve range
/// counts as lying on it.
pub const CSI_OVERLAP_TEST_POINTS: usize = 2;
