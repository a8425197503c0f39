//! Input-keyed randomness for the simulator
//!
//! Every "random" choice the simulator makes draws from a generator seeded by
//! the SHA-256 of the input, so the same input always yields the same output.

use compass_core::compute_content_hash;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generator seeded from the content hash of `input`.
pub fn seeded_rng(input: &[u8]) -> StdRng {
    StdRng::from_seed(compute_content_hash(input))
}

/// Uniform draw in `[low, high]`, rounded to three decimals.
pub fn confidence(rng: &mut StdRng, low: f64, high: f64) -> f64 {
    round3(rng.random_range(low..=high))
}

pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
