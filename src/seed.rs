//! Seed resolution.

use rand::Rng;

/// Largest seed the sampler accepts (`i32::MAX`).
pub const MAX_SEED: u32 = i32::MAX.unsigned_abs();

/// Use the supplied seed, or draw a fresh one uniformly from `[0, MAX_SEED]`.
#[must_use]
pub fn resolve_seed(seed: u32, randomize: bool) -> u32 {
    resolve_seed_with(&mut rand::thread_rng(), seed, randomize)
}

/// [`resolve_seed`] with an explicit random source.
pub fn resolve_seed_with<R: Rng + ?Sized>(rng: &mut R, seed: u32, randomize: bool) -> u32 {
    if randomize {
        rng.gen_range(0..=MAX_SEED)
    } else {
        seed
    }
}

/// Validate a user-supplied seed.
///
/// # Errors
///
/// Returns an error if the seed exceeds [`MAX_SEED`].
pub fn validate_seed(seed: u32) -> Result<(), String> {
    if seed <= MAX_SEED {
        Ok(())
    } else {
        Err(format!("Unsupported seed {seed}. Valid: 0..={MAX_SEED}"))
    }
}
