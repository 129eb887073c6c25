//! Uniform random number sources for grain parameter randomization.

use rand::{rngs::SmallRng, Rng, SeedableRng};

// -------------------------------------------------------------------------------------------------

/// A source of uniformly distributed random values.
///
/// Implementations are called from the real-time audio thread, so they must not block or
/// allocate.
pub trait RandomSource: Send {
    /// Draws a uniformly distributed value in range `[min, max)`.
    ///
    /// `min` may be larger than `max`: the range then is simply inverted. When `min` equals
    /// `max`, exactly `min` is returned.
    fn uniform(&mut self, min: f64, max: f64) -> f64;
}

// -------------------------------------------------------------------------------------------------

/// Default [`RandomSource`] impl, based on a fast, non-cryptographic [`SmallRng`].
#[derive(Debug, Clone)]
pub struct SmallRngSource {
    rng: SmallRng,
}

impl SmallRngSource {
    /// Create a new random source, seeded from the operating system's entropy source.
    pub fn from_os_rng() -> Self {
        Self {
            rng: SmallRng::from_os_rng(),
        }
    }

    /// Create a new deterministic random source with the given seed.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Default for SmallRngSource {
    fn default() -> Self {
        Self::from_os_rng()
    }
}

impl RandomSource for SmallRngSource {
    #[inline]
    fn uniform(&mut self, min: f64, max: f64) -> f64 {
        min + (max - min) * self.rng.random::<f64>()
    }
}

// -------------------------------------------------------------------------------------------------
