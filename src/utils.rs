//! Common, shared DSP and real-time helpers.

pub mod buffer;
pub mod panning;
pub mod random;

// -------------------------------------------------------------------------------------------------

/// Runs the given function with allocations disallowed, when the `assert-allocs` feature is
/// enabled. Else simply runs the given function.
#[inline]
pub(crate) fn assert_no_alloc<T, F: FnOnce() -> T>(func: F) -> T {
    #[cfg(feature = "assert-allocs")]
    return assert_no_alloc::assert_no_alloc::<T, F>(func);

    #[cfg(not(feature = "assert-allocs"))]
    return func();
}

/// Temporarily allows allocations within an [`assert_no_alloc`] scope.
#[inline]
pub(crate) fn permit_alloc<T, F: FnOnce() -> T>(func: F) -> T {
    #[cfg(feature = "assert-allocs")]
    return assert_no_alloc::permit_alloc::<T, F>(func);

    #[cfg(not(feature = "assert-allocs"))]
    return func();
}

// -------------------------------------------------------------------------------------------------

/// Number of sample frames per millisecond for the given sample rate.
#[inline]
pub fn samples_per_ms(sample_rate: u32) -> f64 {
    sample_rate as f64 / 1000.0
}

// -------------------------------------------------------------------------------------------------
