use crate::{
    engine::{config::BehaviorFlags, grain::GrainGeometry, recorder::RingBufferRecorder},
    utils::panning::constant_power_factors,
    window::WindowData,
};

// -------------------------------------------------------------------------------------------------

/// Synthesizes a grain's full stereo output in a single pass: window lookup, pitched ring buffer
/// reads, panning and gain.
///
/// The window envelope always completes exactly once over the grain's nominal duration, while the
/// ring buffer gets read faster or slower, according to the grain's pitch.
pub(crate) struct GrainRenderer<'a> {
    window: &'a WindowData,
    recorder: &'a RingBufferRecorder,
    window_interpolation: bool,
    sample_interpolation: bool,
}

impl<'a> GrainRenderer<'a> {
    pub fn new(
        window: &'a WindowData,
        recorder: &'a RingBufferRecorder,
        flags: BehaviorFlags,
    ) -> Self {
        Self {
            window,
            recorder,
            window_interpolation: flags.window_interpolation,
            sample_interpolation: flags.sample_interpolation,
        }
    }

    /// The recorder grains get read from.
    pub fn recorder(&self) -> &'a RingBufferRecorder {
        self.recorder
    }

    /// Render the given grain into the given stereo buffers.
    ///
    /// Returns the number of written, audible frames. All frames after those are silent.
    pub fn render(&self, grain: &GrainGeometry, left: &mut [f32], right: &mut [f32]) -> usize {
        let frame_count = grain
            .audible_frame_count()
            .min(left.len())
            .min(right.len());
        if frame_count == 0 || grain.duration <= 0.0 || self.window.is_empty() {
            return 0;
        }

        let (pan_left, pan_right) = constant_power_factors(grain.pan);
        let left_gain = (pan_left * grain.gain) as f32;
        let right_gain = (pan_right * grain.gain) as f32;

        let window_frames = self.window.frame_count() as f64;
        for (i, (left, right)) in left
            .iter_mut()
            .zip(right.iter_mut())
            .take(frame_count)
            .enumerate()
        {
            let phase = i as f64 / grain.duration;
            let window = self.window_value(phase * window_frames);
            let sample = self.ring_value(grain.start + phase * grain.play);
            let sample = sample * window;
            *left = sample * left_gain;
            *right = sample * right_gain;
        }
        frame_count
    }

    #[inline]
    fn window_value(&self, position: f64) -> f32 {
        let frame_count = self.window.frame_count();
        let index = position as usize;
        if index >= frame_count {
            return 0.0;
        }
        let current = self.window.frame(index);
        if self.window_interpolation && index + 1 < frame_count {
            let fraction = (position - index as f64) as f32;
            let next = self.window.frame(index + 1);
            current + fraction * (next - current)
        } else {
            current
        }
    }

    #[inline]
    fn ring_value(&self, position: f64) -> f32 {
        if self.sample_interpolation {
            self.recorder.read_interpolated(position)
        } else {
            self.recorder.read(position)
        }
    }
}

// -------------------------------------------------------------------------------------------------
