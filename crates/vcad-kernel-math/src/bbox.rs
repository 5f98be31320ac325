//! Axis-aligned bounding boxes.
//!
//! Used as a broadphase filter: only pieces of geometry whose boxes
//! overlap need an exact intersection test.

use crate::{Point3, Vec3};

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl BoundingBox {
    /// Create a box from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) box suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Smallest box containing every point of `points`.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Point3>) -> Self {
        let mut b = Self::empty();
        for p in points {
            b.include_point(p);
        }
        b
    }

    /// False for an empty box.
    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    /// Expand this box to include a point.
    pub fn include_point(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Smallest box containing both.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let mut b = *self;
        b.include_point(&other.min);
        b.include_point(&other.max);
        b
    }

    /// Grow the box by a tolerance in all directions.
    pub fn expand(&mut self, tol: f64) {
        self.min.x -= tol;
        self.min.y -= tol;
        self.min.z -= tol;
        self.max.x += tol;
        self.max.y += tol;
        self.max.z += tol;
    }

    /// A copy grown by `tol`.
    pub fn expanded(&self, tol: f64) -> BoundingBox {
        let mut b = *self;
        b.expand(tol);
        b
    }

    /// Test if the boxes overlap after growing `self` by `tol`
    /// (touching counts as overlap).
    pub fn intersects(&self, other: &BoundingBox, tol: f64) -> bool {
        self.intersection(other, tol).is_some()
    }

    /// Overlap of the two boxes after growing `self` by `tol`.
    pub fn intersection(&self, other: &BoundingBox, tol: f64) -> Option<BoundingBox> {
        let a = self.expanded(tol);
        let min = Point3::new(
            a.min.x.max(other.min.x),
            a.min.y.max(other.min.y),
            a.min.z.max(other.min.z),
        );
        let max = Point3::new(
            a.max.x.min(other.max.x),
            a.max.y.min(other.max.y),
            a.max.z.min(other.max.z),
        );
        let b = BoundingBox::new(min, max);
        b.is_valid().then_some(b)
    }

    /// True if `p` lies within `tol` of the box.
    pub fn contains_point(&self, p: &Point3, tol: f64) -> bool {
        p.x >= self.min.x - tol
            && p.x <= self.max.x + tol
            && p.y >= self.min.y - tol
            && p.y <= self.max.y + tol
            && p.z >= self.min.z - tol
            && p.z <= self.max.z + tol
    }

    /// Vector from min to max corner.
    pub fn diagonal(&self) -> Vec3 {
        self.max - self.min
    }

    /// Length of the diagonal; 0 for an empty box.
    pub fn diagonal_length(&self) -> f64 {
        if self.is_valid() {
            self.diagonal().norm()
        } else {
            0.0
        }
    }

    /// Box center.
    pub fn center(&self) -> Point3 {
        nalgebra::center(&self.min, &self.max)
    }

    /// Box volume; 0 for an empty box.
    pub fn volume(&self) -> f64 {
        if self.is_valid() {
            let d = self.diagonal();
            d.x * d.y * d.z
        } else {
            0.0
        }
    }
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}
