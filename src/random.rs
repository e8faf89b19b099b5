//! Seeded random number generation.
//!
//! Every run owns one orchestrator RNG. Concurrent tasks never share it:
//! the orchestrator draws one seed per task before dispatch and each task
//! builds its own generator from that seed, so a fixed seed reproduces a
//! run regardless of how the worker pool schedules tasks.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Creates a deterministic RNG from a seed.
pub fn create_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Creates an RNG from an optional seed, falling back to OS entropy.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => create_rng(seed),
        None => create_rng(rand::random()),
    }
}

/// Draws `count` task seeds from the orchestrator RNG.
pub fn task_seeds<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<u64> {
    (0..count).map(|_| rng.random()).collect()
}
