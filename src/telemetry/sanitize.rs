//! Numeric sanitization for everything that leaves the process as JSON.
//!
//! Wire types carry every float as `Option<f64>`: NaN and infinities become
//! `None` and serialize as `null`.

/// Keep finite values, map NaN/Infinity to `None`.
pub fn finite(value: f64) -> Option<f64> {
    if value.is_finite() {
        Some(value)
    } else {
        None
    }
}

/// Conversion into a JSON-safe wire form.
///
/// Sanitizing an already sanitized value returns an identical value.
pub trait Sanitize {
    type Output;

    fn sanitize(&self) -> Self::Output;
}

impl Sanitize for Option<f64> {
    type Output = Option<f64>;

    fn sanitize(&self) -> Option<f64> {
        self.and_then(finite)
    }
}

impl Sanitize for f64 {
    type Output = Option<f64>;

    fn sanitize(&self) -> Option<f64> {
        finite(*self)
    }
}
