//! Numeric value generators.

use rand::Rng;

/// Upper bound of an unbounded random integer.
const UNBOUNDED_INT_MAX: i64 = i32::MAX as i64;

/// Generate a random integer in `[min, max)`, or in `[0, i32::MAX)` when unbounded.
pub fn random_int<R: Rng>(rng: &mut R, range: Option<(i64, i64)>) -> i64 {
    match range {
        Some((min, max)) if max > min => rng.gen_range(min..max),
        _ => rng.gen_range(0..UNBOUNDED_INT_MAX),
    }
}

/// Generate a random double by scaling a unit draw onto `[min, max]`.
///
/// Without a range the unit draw in `[0, 1)` is returned as-is.
pub fn random_double<R: Rng>(rng: &mut R, range: Option<(f64, f64)>) -> f64 {
    let unit: f64 = rng.gen();
    match range {
        Some((min, max)) => min + unit * (max - min),
        None => unit,
    }
}
