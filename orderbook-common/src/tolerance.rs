//! Float comparison with an absolute-difference tolerance.
//!
//! Prices and amounts pass through floating-point conversions that accumulate
//! representation error, so every equality comparison on them uses
//! [`is_same`] instead of `==`.

/// Tolerance used for comparing float numbers.
pub const EQUALITY_TOLERANCE: f64 = 1e-8;

/// Compare two float numbers with [`EQUALITY_TOLERANCE`].
pub fn is_same(first: f64, second: f64) -> bool {
    (first - second).abs() < EQUALITY_TOLERANCE
}

/// Compare two optional float numbers. Two absent values compare equal; an
/// absent value never equals a present one.
pub fn is_same_opt(first: Option<f64>, second: Option<f64>) -> bool {
    match (first, second) {
        (None, None) => true,
        (Some(a), Some(b)) => is_same(a, b),
        _ => false,
    }
}
