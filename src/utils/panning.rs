//! Stereo panning laws.

use std::f64::consts::{FRAC_1_SQRT_2, FRAC_PI_2};

// -------------------------------------------------------------------------------------------------

/// Constant power (equal power crossfade) panning factors for the given pan position.
///
/// `position` is expected to be in range -1.0 (left) to 1.0 (right). Returns the left and right
/// gain factors. `left² + right²` is constant for all positions and a centered position yields
/// equal left and right gains of √2/2.
#[inline]
pub fn constant_power_factors(position: f64) -> (f64, f64) {
    let theta = position * FRAC_PI_2 * 0.5;
    let (sin, cos) = theta.sin_cos();
    (FRAC_1_SQRT_2 * (cos - sin), FRAC_1_SQRT_2 * (cos + sin))
}

// -------------------------------------------------------------------------------------------------
