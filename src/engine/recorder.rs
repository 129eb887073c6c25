use assume::assume;

use crate::{utils::buffer::alloc_buffer, Error};

// -------------------------------------------------------------------------------------------------

/// Records a live input signal into a fixed-capacity circular buffer.
///
/// The write cursor advances by one frame per written sample while recording is enabled and
/// wraps at the buffer's capacity, so the buffer always holds the most recent
/// `capacity` recorded samples.
pub struct RingBufferRecorder {
    buffer: Box<[f32]>,
    write_position: usize,
    recording: bool,
}

impl RingBufferRecorder {
    /// Create a new, zeroed recorder with the given capacity in sample frames.
    pub fn new(capacity: usize) -> Result<Self, Error> {
        Ok(Self {
            buffer: Self::alloc(capacity)?,
            write_position: 0,
            recording: false,
        })
    }

    /// Reallocate and zero the buffer with a new capacity and reset the write cursor.
    ///
    /// Not real-time safe: only call this when preparing the engine for a new sample rate.
    pub fn resize(&mut self, capacity: usize) -> Result<(), Error> {
        self.buffer = Self::alloc(capacity)?;
        self.write_position = 0;
        Ok(())
    }

    fn alloc(capacity: usize) -> Result<Box<[f32]>, Error> {
        if capacity == 0 {
            return Err(Error::ParameterError(
                "Ring buffer capacity must be > 0".to_string(),
            ));
        }
        alloc_buffer(capacity)
    }

    /// Buffer capacity in sample frames.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Current write cursor position, in range `[0, capacity)`.
    #[inline]
    pub fn write_position(&self) -> usize {
        self.write_position
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn set_recording(&mut self, recording: bool) {
        self.recording = recording;
    }

    /// Write a single sample at the write cursor and advance the cursor.
    /// Does nothing when recording is disabled.
    #[inline]
    pub fn write(&mut self, sample: f32) {
        if self.recording {
            assume!(unsafe: self.write_position < self.buffer.len());
            self.buffer[self.write_position] = sample;
            self.write_position += 1;
            if self.write_position == self.buffer.len() {
                self.write_position = 0;
            }
        }
    }

    /// Read the sample at the given (truncated) position. Positions outside of the buffer's
    /// range get wrapped.
    #[inline]
    pub fn read(&self, position: f64) -> f32 {
        let index = self.wrapped_index(position);
        assume!(unsafe: index < self.buffer.len());
        self.buffer[index]
    }

    /// Read a linearly interpolated sample at the given fractional position. The frame after
    /// the last buffer frame is the first buffer frame.
    #[inline]
    pub fn read_interpolated(&self, position: f64) -> f32 {
        let index = self.wrapped_index(position);
        let fraction = (position - position.floor()) as f32;
        let next_index = if index + 1 < self.buffer.len() {
            index + 1
        } else {
            0
        };
        assume!(unsafe: index < self.buffer.len());
        assume!(unsafe: next_index < self.buffer.len());
        let current = self.buffer[index];
        let next = self.buffer[next_index];
        current + fraction * (next - current)
    }

    #[inline]
    fn wrapped_index(&self, position: f64) -> usize {
        let len = self.buffer.len();
        let index = position.floor().rem_euclid(len as f64) as usize;
        // guard against rounding up to len in rem_euclid
        if index < len {
            index
        } else {
            0
        }
    }
}

// -------------------------------------------------------------------------------------------------
