use crate::Error;

// -------------------------------------------------------------------------------------------------

/// Allocate a zero initialized sample buffer with the given length.
///
/// Returns an [`Error::AllocationError`] instead of aborting when the memory can't be reserved.
pub fn alloc_buffer(len: usize) -> Result<Box<[f32]>, Error> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).map_err(|err| {
        log::error!("Failed to allocate a sample buffer with {len} frames: {err}");
        Error::from(err)
    })?;
    buffer.resize(len, 0.0);
    Ok(buffer.into_boxed_slice())
}

// -------------------------------------------------------------------------------------------------

/// Fill the given buffer with zeros.
#[inline]
pub fn clear_buffer(buffer: &mut [f32]) {
    buffer.fill(0.0);
}

// -------------------------------------------------------------------------------------------------

/// Copy the given planar stereo buffers into an interleaved one.
/// Copies as many frames as fit into all buffers.
pub fn stereo_to_interleaved(left: &[f32], right: &[f32], interleaved: &mut [f32]) {
    for ((frame, l), r) in interleaved.chunks_exact_mut(2).zip(left).zip(right) {
        frame[0] = *l;
        frame[1] = *r;
    }
}

// -------------------------------------------------------------------------------------------------
