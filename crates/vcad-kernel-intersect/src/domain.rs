//! Effective parameter domains for intersection queries.

use tracing::warn;
use vcad_kernel_math::Interval;

/// Restrict `native` to the caller's `requested` interval.
///
/// A missing request yields `native`. A decreasing request, or one
/// disjoint from `native`, is logged and also yields `native`, so the
/// result is not necessarily a subset of the request.
pub fn clamp_domain(requested: Option<&Interval>, native: Interval) -> Interval {
    let Some(req) = requested else {
        return native;
    };
    if req.is_decreasing() {
        warn!(?req, ?native, "decreasing domain, using the native domain");
        return native;
    }
    match native.intersection(req) {
        Some(dom) => dom,
        None => {
            warn!(?req, ?native, "domain misses the geometry, using the native domain");
            native
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_request() {
        let native = Interval::new(0.0, 2.0);
        assert_eq!(clamp_domain(None, native), native);
    }

    #[test]
    fn test_clip_to_native() {
        let native = Interval::new(0.0, 2.0);
        let dom = clamp_domain(Some(&Interval::new(-1.0, 1.0)), native);
        assert_eq!(dom, Interval::new(0.0, 1.0));
    }

    #[test]
    fn test_fallbacks() {
        let native = Interval::new(0.0, 2.0);
        assert_eq!(clamp_domain(Some(&Interval::new(1.5, 0.5)), native), native);
        assert_eq!(clamp_domain(Some(&Interval::new(3.0, 4.0)), native), native);
    }
}
