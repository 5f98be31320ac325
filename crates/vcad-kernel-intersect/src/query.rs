//! Operands and tolerances of an intersection query.

use std::ops::Deref;

use crate::error::IntersectError;
use crate::subdivision::{Subcurve, Subsurface};
use vcad_kernel_math::{Interval, Tolerance};
use vcad_kernel_nurbs::{NurbsCurve, NurbsSurface};

/// A curve operand: the curve, an optional parameter range and an
/// optional prebuilt subdivision tree.
///
/// A supplied tree is used as is (its domain wins over `domain`) and is
/// never modified beyond the lazy creation of children.
#[derive(Debug, Clone, Copy)]
pub struct CurveQuery<'a> {
    /// The curve.
    pub curve: &'a NurbsCurve,
    /// Parameter range to search, clamped to the curve domain.
    pub domain: Option<Interval>,
    /// A tree built earlier over the same curve.
    pub tree: Option<&'a Subcurve>,
}

impl<'a> CurveQuery<'a> {
    /// Query the whole curve.
    pub fn new(curve: &'a NurbsCurve) -> Self {
        Self {
            curve,
            domain: None,
            tree: None,
        }
    }

    /// Restrict the search to `domain`.
    pub fn with_domain(mut self, domain: Interval) -> Self {
        self.domain = Some(domain);
        self
    }

    /// Reuse a prebuilt tree.
    pub fn with_tree(mut self, tree: &'a Subcurve) -> Self {
        self.tree = Some(tree);
        self
    }

    pub(crate) fn root(&self) -> Result<Tree<'a, Subcurve>, IntersectError> {
        match self.tree {
            Some(tree) => Ok(Tree::Borrowed(tree)),
            None => Subcurve::new(self.curve, self.domain.as_ref()).map(Tree::Owned),
        }
    }
}

impl<'a> From<&'a NurbsCurve> for CurveQuery<'a> {
    fn from(curve: &'a NurbsCurve) -> Self {
        Self::new(curve)
    }
}

/// A surface operand: the surface, optional parameter ranges and an
/// optional prebuilt subdivision tree.
#[derive(Debug, Clone, Copy)]
pub struct SurfaceQuery<'a> {
    /// The surface.
    pub surface: &'a NurbsSurface,
    /// Range of `u` to search.
    pub u_domain: Option<Interval>,
    /// Range of `v` to search.
    pub v_domain: Option<Interval>,
    /// A tree built earlier over the same surface.
    pub tree: Option<&'a Subsurface>,
}

impl<'a> SurfaceQuery<'a> {
    /// Query the whole surface.
    pub fn new(surface: &'a NurbsSurface) -> Self {
        Self {
            surface,
            u_domain: None,
            v_domain: None,
            tree: None,
        }
    }

    /// Restrict the search to `u × v`.
    pub fn with_domain(mut self, u: Interval, v: Interval) -> Self {
        self.u_domain = Some(u);
        self.v_domain = Some(v);
        self
    }

    /// Reuse a prebuilt tree.
    pub fn with_tree(mut self, tree: &'a Subsurface) -> Self {
        self.tree = Some(tree);
        self
    }

    pub(crate) fn root(&self) -> Result<Tree<'a, Subsurface>, IntersectError> {
        match self.tree {
            Some(tree) => Ok(Tree::Borrowed(tree)),
            None => Subsurface::new(
                self.surface,
                self.u_domain.as_ref(),
                self.v_domain.as_ref(),
            )
            .map(Tree::Owned),
        }
    }
}

impl<'a> From<&'a NurbsSurface> for SurfaceQuery<'a> {
    fn from(surface: &'a NurbsSurface) -> Self {
        Self::new(surface)
    }
}

/// A tree root that is either the caller's or built for one call.
pub(crate) enum Tree<'a, T> {
    Borrowed(&'a T),
    Owned(T),
}

impl<T> Deref for Tree<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        match self {
            Tree::Borrowed(t) => t,
            Tree::Owned(t) => t,
        }
    }
}

/// Tolerances of a curve or surface query.
///
/// Non-positive values select the defaults; see [`Tolerances::resolved`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Tolerances {
    /// Distance at which two points count as intersecting.
    pub intersection: f64,
    /// Distance used to confirm that a range coincides.
    pub overlap: f64,
    /// Deviation allowed when simplifying result curves.
    pub fitting: f64,
}

impl Tolerances {
    /// Tolerances with the given intersection distance and defaults for
    /// the rest.
    pub fn new(intersection: f64) -> Self {
        Self {
            intersection,
            ..Self::default()
        }
    }

    /// Fill in defaults: the intersection tolerance falls back to
    /// [`Tolerance::DEFAULT`], an overlap tolerance below it becomes twice
    /// the intersection tolerance and the fitting tolerance falls back to
    /// the intersection tolerance.
    pub fn resolved(&self) -> Self {
        let intersection = Tolerance::resolve(self.intersection);
        let overlap = if self.overlap < intersection {
            2.0 * intersection
        } else {
            self.overlap
        };
        let fitting = if self.fitting > 0.0 {
            self.fitting
        } else {
            intersection
        };
        Self {
            intersection,
            overlap,
            fitting,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vcad_kernel_math::Point3;

    #[test]
    fn test_resolved_defaults() {
        let t = Tolerances::default().resolved();
        assert_eq!(t.intersection, 0.001);
        assert_eq!(t.overlap, 0.002);
        assert_eq!(t.fitting, 0.001);
    }

    #[test]
    fn test_resolved_keeps_valid_values() {
        let t = Tolerances {
            intersection: 0.01,
            overlap: 0.05,
            fitting: 0.1,
        }
        .resolved();
        assert_eq!(t, Tolerances { intersection: 0.01, overlap: 0.05, fitting: 0.1 });
        let t = Tolerances { intersection: 0.01, overlap: 0.005, fitting: -1.0 }.resolved();
        assert_eq!(t.overlap, 0.02);
        assert_eq!(t.fitting, 0.01);
    }

    #[test]
    fn test_supplied_tree_is_borrowed() {
        let line = NurbsCurve::line(Point3::origin(), Point3::new(1.0, 0.0, 0.0));
        let tree = Subcurve::new(&line, Some(&Interval::new(0.0, 0.5))).unwrap();
        let q = CurveQuery::new(&line).with_tree(&tree);
        let root = q.root().unwrap();
        assert!(matches!(root, Tree::Borrowed(_)));
        assert_eq!(root.domain(), Interval::new(0.0, 0.5));
        let q = CurveQuery::from(&line).with_domain(Interval::new(0.25, 1.0));
        assert_eq!(q.root().unwrap().domain(), Interval::new(0.25, 1.0));
    }
}
