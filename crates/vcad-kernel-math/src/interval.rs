//! One-dimensional parameter intervals.

/// A closed parameter interval `[min, max]`.
///
/// Most operations assume the interval is increasing; call
/// [`Interval::make_increasing`] on input of unknown orientation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    /// Lower end.
    pub min: f64,
    /// Upper end.
    pub max: f64,
}

impl Interval {
    /// Create an interval from its two ends, in the given order.
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// True if `min < max`.
    pub fn is_increasing(&self) -> bool {
        self.min < self.max
    }

    /// True if `min > max`.
    pub fn is_decreasing(&self) -> bool {
        self.min > self.max
    }

    /// Swap the ends if the interval is decreasing.
    pub fn make_increasing(&mut self) {
        if self.is_decreasing() {
            std::mem::swap(&mut self.min, &mut self.max);
        }
    }

    /// `max - min`.
    pub fn length(&self) -> f64 {
        self.max - self.min
    }

    /// Midpoint.
    pub fn mid(&self) -> f64 {
        0.5 * (self.min + self.max)
    }

    /// Map a normalized parameter `s ∈ [0, 1]` into the interval.
    pub fn parameter_at(&self, s: f64) -> f64 {
        self.min + s * (self.max - self.min)
    }

    /// Map a parameter in the interval to `[0, 1]`.
    ///
    /// Returns 0 for a degenerate interval.
    pub fn normalized_parameter_at(&self, t: f64) -> f64 {
        let len = self.length();
        if len == 0.0 {
            0.0
        } else {
            (t - self.min) / len
        }
    }

    /// True if `t` lies within the closed interval.
    pub fn includes(&self, t: f64) -> bool {
        self.min <= t && t <= self.max
    }

    /// True if `t` lies strictly inside the interval.
    pub fn includes_interior(&self, t: f64) -> bool {
        self.min < t && t < self.max
    }

    /// Intersection of two increasing intervals.
    ///
    /// A single shared endpoint yields a degenerate interval.
    pub fn intersection(&self, other: &Interval) -> Option<Interval> {
        let min = self.min.max(other.min);
        let max = self.max.min(other.max);
        if min <= max {
            Some(Interval::new(min, max))
        } else {
            None
        }
    }

    /// Smallest interval containing both.
    pub fn union(&self, other: &Interval) -> Interval {
        Interval::new(self.min.min(other.min), self.max.max(other.max))
    }

    /// Clamp `t` into the interval.
    pub fn clamp(&self, t: f64) -> f64 {
        t.clamp(self.min, self.max)
    }

    /// Grow both ends by `d`.
    pub fn grow(&self, d: f64) -> Interval {
        Interval::new(self.min - d, self.max + d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_make_increasing() {
        let mut i = Interval::new(3.0, 1.0);
        assert!(i.is_decreasing());
        i.make_increasing();
        assert_eq!(i, Interval::new(1.0, 3.0));
        assert!((i.length() - 2.0).abs() < 1e-12);
        assert!((i.mid() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_parameter_mapping() {
        let i = Interval::new(2.0, 6.0);
        assert!((i.parameter_at(0.25) - 3.0).abs() < 1e-12);
        assert!((i.normalized_parameter_at(5.0) - 0.75).abs() < 1e-12);
        assert_eq!(Interval::new(1.0, 1.0).normalized_parameter_at(1.0), 0.0);
    }

    #[test]
    fn test_intersection() {
        let a = Interval::new(0.0, 2.0);
        let b = Interval::new(1.0, 3.0);
        assert_eq!(a.intersection(&b), Some(Interval::new(1.0, 2.0)));
        let c = Interval::new(2.0, 4.0);
        assert_eq!(a.intersection(&c), Some(Interval::new(2.0, 2.0)));
        let d = Interval::new(2.5, 4.0);
        assert!(a.intersection(&d).is_none());
        assert_eq!(a.union(&d), Interval::new(0.0, 4.0));
    }

    #[test]
    fn test_includes_and_clamp() {
        let i = Interval::new(0.0, 1.0);
        assert!(i.includes(0.0));
        assert!(!i.includes_interior(0.0));
        assert!(i.includes_interior(0.5));
        assert_eq!(i.clamp(1.5), 1.0);
        assert_eq!(i.grow(0.5), Interval::new(-0.5, 1.5));
    }
}
