//! Random string generator.

use rand::distributions::Alphanumeric;
use rand::Rng;

/// Generate a string of `length` characters drawn independently from `a-z A-Z 0-9`.
pub fn random_alphanumeric<R: Rng>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| char::from(rng.sample(Alphanumeric)))
        .collect()
}
