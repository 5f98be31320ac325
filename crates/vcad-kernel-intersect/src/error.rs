//! Errors raised while preparing an intersection query.

use thiserror::Error;
use vcad_kernel_math::Interval;

/// Failure to build the geometry an intersection query works on.
///
/// These never escape the public entry points: each one logs the error
/// and reports zero events.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum IntersectError {
    /// The curve could not be restricted to the requested interval.
    #[error("cannot extract sub-curve over [{}, {}]", .0.min, .0.max)]
    SubCurve(Interval),
    /// The surface could not be restricted to the requested rectangle.
    #[error("cannot extract sub-surface over [{}, {}] x [{}, {}]", .u.min, .u.max, .v.min, .v.max)]
    SubSurface {
        /// Requested u interval.
        u: Interval,
        /// Requested v interval.
        v: Interval,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let e = IntersectError::SubCurve(Interval::new(0.25, 0.5));
        assert_eq!(e.to_string(), "cannot extract sub-curve over [0.25, 0.5]");
        let e = IntersectError::SubSurface {
            u: Interval::new(0.0, 1.0),
            v: Interval::new(2.0, 3.0),
        };
        assert!(e.to_string().contains("[0, 1] x [2, 3]"));
    }
}
