//! Bounding-box subdivision trees over curves and surfaces.
//!
//! A node owns the piece of geometry over its parameter interval and
//! caches its bounding box. Children are created on the first call to
//! `split` and kept for the lifetime of the node, so a tree built once
//! can serve many queries against the same operand.
//!
//! Trees memoise through [`OnceCell`] and are therefore not `Sync`:
//! share a tree between threads only by building one per thread.

use std::cell::OnceCell;

use crate::domain::clamp_domain;
use crate::error::IntersectError;
use crate::MAX_SUBDIVISION_DEPTH;
use vcad_kernel_math::{BoundingBox, Interval, Point3, ZERO_TOLERANCE};
use vcad_kernel_nurbs::{Direction, NurbsCurve, NurbsSurface};

// =============================================================================
// Curve tree
// =============================================================================

/// A node of a binary curve subdivision tree.
#[derive(Debug)]
pub struct Subcurve {
    curve: NurbsCurve,
    t: Interval,
    bbox: BoundingBox,
    is_linear: bool,
    children: OnceCell<Option<Box<[Subcurve; 2]>>>,
}

impl Subcurve {
    /// Build a root over `domain` (or the whole curve).
    pub fn new(curve: &NurbsCurve, domain: Option<&Interval>) -> Result<Self, IntersectError> {
        let native = curve.domain();
        let t = clamp_domain(domain, native);
        let piece = if t == native {
            curve.clone()
        } else {
            curve.sub_curve(&t).ok_or(IntersectError::SubCurve(t))?
        };
        Ok(Self::from_piece(piece, t))
    }

    fn from_piece(curve: NurbsCurve, t: Interval) -> Self {
        Self {
            bbox: curve.bounding_box(),
            is_linear: curve.is_linear(ZERO_TOLERANCE),
            curve,
            t,
            children: OnceCell::new(),
        }
    }

    /// The owned piece of geometry.
    pub fn curve(&self) -> &NurbsCurve {
        &self.curve
    }

    /// Parameter interval of this node.
    pub fn domain(&self) -> Interval {
        self.t
    }

    /// Bounding box of the piece.
    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// True if the piece is a straight segment.
    pub fn is_linear(&self) -> bool {
        self.is_linear
    }

    /// Children over the two halves of the interval, or `None` for a leaf.
    pub fn split(&self) -> Option<&[Subcurve; 2]> {
        self.children
            .get_or_init(|| {
                let mid = self.t.mid();
                let (lo, hi) = self.curve.split(mid)?;
                Some(Box::new([
                    Self::from_piece(lo, Interval::new(self.t.min, mid)),
                    Self::from_piece(hi, Interval::new(mid, self.t.max)),
                ]))
            })
            .as_deref()
    }

    /// True if `p` lies within `tol` of the bounding box.
    pub fn is_point_in(&self, p: &Point3, tol: f64) -> bool {
        self.bbox.contains_point(p, tol)
    }

    /// Overlap of the two bounding boxes grown by `tol`.
    pub fn intersect<S: Subdivision>(&self, other: &S, tol: f64) -> Option<BoundingBox> {
        self.bbox.intersection(other.bbox(), tol)
    }
}

// =============================================================================
// Surface tree
// =============================================================================

/// A node of a quad surface subdivision tree.
#[derive(Debug)]
pub struct Subsurface {
    surface: NurbsSurface,
    u: Interval,
    v: Interval,
    bbox: BoundingBox,
    is_planar: bool,
    children: OnceCell<Option<Box<[Subsurface; 4]>>>,
}

impl Subsurface {
    /// Build a root over `u × v` (each defaulting to the surface domain).
    pub fn new(
        surface: &NurbsSurface,
        u: Option<&Interval>,
        v: Option<&Interval>,
    ) -> Result<Self, IntersectError> {
        let native_u = surface.domain(Direction::U);
        let native_v = surface.domain(Direction::V);
        let u = clamp_domain(u, native_u);
        let v = clamp_domain(v, native_v);
        let piece = if u == native_u && v == native_v {
            surface.clone()
        } else {
            surface
                .sub_surface(&u, &v)
                .ok_or(IntersectError::SubSurface { u, v })?
        };
        Ok(Self::from_piece(piece, u, v))
    }

    fn from_piece(surface: NurbsSurface, u: Interval, v: Interval) -> Self {
        Self {
            bbox: surface.bounding_box(),
            is_planar: surface.is_planar(ZERO_TOLERANCE),
            surface,
            u,
            v,
            children: OnceCell::new(),
        }
    }

    /// The owned piece of geometry.
    pub fn surface(&self) -> &NurbsSurface {
        &self.surface
    }

    /// Parameter interval in `u`.
    pub fn u(&self) -> Interval {
        self.u
    }

    /// Parameter interval in `v`.
    pub fn v(&self) -> Interval {
        self.v
    }

    /// Bounding box of the piece.
    pub fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    /// True if the piece is flat.
    pub fn is_planar(&self) -> bool {
        self.is_planar
    }

    /// Children over the four quadrants, or `None` for a leaf.
    ///
    /// Order: `(u_lo, v_lo)`, `(u_lo, v_hi)`, `(u_hi, v_lo)`, `(u_hi, v_hi)`.
    pub fn split(&self) -> Option<&[Subsurface; 4]> {
        self.children
            .get_or_init(|| {
                let um = self.u.mid();
                let vm = self.v.mid();
                let (left, right) = self.surface.split(Direction::U, um)?;
                let (s00, s01) = left.split(Direction::V, vm)?;
                let (s10, s11) = right.split(Direction::V, vm)?;
                let u0 = Interval::new(self.u.min, um);
                let u1 = Interval::new(um, self.u.max);
                let v0 = Interval::new(self.v.min, vm);
                let v1 = Interval::new(vm, self.v.max);
                Some(Box::new([
                    Self::from_piece(s00, u0, v0),
                    Self::from_piece(s01, u0, v1),
                    Self::from_piece(s10, u1, v0),
                    Self::from_piece(s11, u1, v1),
                ]))
            })
            .as_deref()
    }

    /// True if `p` lies within `tol` of the bounding box.
    pub fn is_point_in(&self, p: &Point3, tol: f64) -> bool {
        self.bbox.contains_point(p, tol)
    }

    /// Overlap of the two bounding boxes grown by `tol`.
    pub fn intersect<S: Subdivision>(&self, other: &S, tol: f64) -> Option<BoundingBox> {
        self.bbox.intersection(other.bbox(), tol)
    }
}

// =============================================================================
// Lockstep descent
// =============================================================================

/// What the lockstep descent needs from a tree node.
pub trait Subdivision: Sized {
    /// Cached bounding box.
    fn bbox(&self) -> &BoundingBox;
    /// True if the node is already linear or planar.
    fn is_flat(&self) -> bool;
    /// Children, creating them on first use.
    fn children(&self) -> Option<&[Self]>;
}

impl Subdivision for Subcurve {
    fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    fn is_flat(&self) -> bool {
        self.is_linear
    }

    fn children(&self) -> Option<&[Self]> {
        self.split().map(|c| c.as_slice())
    }
}

impl Subdivision for Subsurface {
    fn bbox(&self) -> &BoundingBox {
        &self.bbox
    }

    fn is_flat(&self) -> bool {
        self.is_planar
    }

    fn children(&self) -> Option<&[Self]> {
        self.split().map(|c| c.as_slice())
    }
}

/// Descend two trees together and return the leaf pairs whose boxes
/// still overlap within `tol`.
///
/// Each level splits both sides of every pair (flat sides only when
/// `split_flat` is set) and keeps child pairs whose boxes intersect.
/// A pair neither of whose sides splits is carried to the result as is.
/// Children of `a` for which `skip_a` returns true are dropped.
pub(crate) fn candidate_pairs<'a, A, B>(
    a: &'a A,
    b: &'a B,
    tol: f64,
    split_flat: bool,
    mut skip_a: impl FnMut(&A) -> bool,
) -> Vec<(&'a A, &'a B)>
where
    A: Subdivision,
    B: Subdivision,
{
    if !a.bbox().intersects(b.bbox(), tol) {
        return Vec::new();
    }
    let mut pairs = vec![(a, b)];
    for _ in 0..MAX_SUBDIVISION_DEPTH {
        let mut next = Vec::with_capacity(pairs.len() * 4);
        let mut progressed = false;
        for (x, y) in pairs {
            let xs = if split_flat || !x.is_flat() {
                x.children()
            } else {
                None
            };
            let ys = if split_flat || !y.is_flat() {
                y.children()
            } else {
                None
            };
            if xs.is_none() && ys.is_none() {
                next.push((x, y));
                continue;
            }
            progressed = true;
            let xs = xs.unwrap_or(std::slice::from_ref(x));
            let ys = ys.unwrap_or(std::slice::from_ref(y));
            for cx in xs {
                if skip_a(cx) {
                    continue;
                }
                for cy in ys {
                    if cx.bbox().intersects(cy.bbox(), tol) {
                        next.push((cx, cy));
                    }
                }
            }
        }
        pairs = next;
        if !progressed {
            break;
        }
    }
    pairs
}
