//! Grain arena, grain limits and the grain scheduler.

use crate::{
    engine::{
        controls::{clamp_range, ResolvedControls},
        recorder::RingBufferRecorder,
        renderer::GrainRenderer,
    },
    utils::{buffer::alloc_buffer, random::RandomSource},
    Error, LiveCloud,
};

// -------------------------------------------------------------------------------------------------

/// Randomized parameters and ring buffer read geometry of a single grain.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GrainGeometry {
    /// Ring buffer read start position in frames, in range `[0, ring capacity)`.
    pub start: f64,
    /// Nominal grain duration in frames. The window envelope spans exactly this duration.
    pub duration: f64,
    /// Number of ring buffer frames consumed over the nominal duration: `duration * pitch`,
    /// limited to the ring buffer's capacity.
    pub play: f64,
    pub pitch: f64,
    pub pan: f64,
    pub gain: f64,
}

impl GrainGeometry {
    /// Draw randomized grain parameters from the given resolved control ranges and compute the
    /// grain's read geometry relative to the recorder's current write position.
    pub fn randomized(
        controls: &ResolvedControls,
        recorder: &RingBufferRecorder,
        random: &mut dyn RandomSource,
    ) -> Self {
        let bounds = controls.bounds();
        // re-clamp, in case min and max got passed in inverted order
        let delay = clamp_range(controls.delay(), bounds.delay);
        let duration = random_in(random, controls.length(), bounds.length);
        let pitch = random_in(random, controls.pitch(), bounds.pitch);
        let pan = random_in(random, controls.pan(), bounds.pan);
        let gain = random_in(random, controls.gain(), bounds.gain);

        let capacity = recorder.capacity() as f64;
        let play = (duration * pitch).min(capacity);
        // read backwards from the write cursor, wrapping into older history
        let start = (recorder.write_position() as f64 - play - delay).rem_euclid(capacity);

        Self {
            start,
            duration,
            play,
            pitch,
            pan,
            gain,
        }
    }

    /// Number of rendered output frames.
    pub fn frame_count(&self) -> usize {
        if self.play >= 1.0 {
            self.play as usize
        } else {
            0
        }
    }

    /// Number of rendered output frames in which the window envelope is still running.
    /// All frames after this are silent.
    pub fn audible_frame_count(&self) -> usize {
        (self.duration.max(0.0).ceil() as usize).min(self.frame_count())
    }
}

/// Draw a random value in range `[min, max)` and clamp it into the given absolute bounds.
#[inline]
fn random_in(random: &mut dyn RandomSource, (min, max): (f64, f64), bounds: (f64, f64)) -> f64 {
    clamp_range(random.uniform(min, max), bounds)
}

// -------------------------------------------------------------------------------------------------

/// A single grain slot in a [`GrainPool`]: holds the grain's fully pre-rendered stereo audio
/// and its playback cursor.
pub(crate) struct Grain {
    active: bool,
    frame_count: usize,
    audible_frame_count: usize,
    cursor: usize,
    left: Box<[f32]>,
    right: Box<[f32]>,
}

impl Grain {
    fn new(max_audible_frames: usize) -> Result<Self, Error> {
        Ok(Self {
            active: false,
            frame_count: 0,
            audible_frame_count: 0,
            cursor: 0,
            left: alloc_buffer(max_audible_frames)?,
            right: alloc_buffer(max_audible_frames)?,
        })
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    fn activate(&mut self, geometry: GrainGeometry, renderer: &GrainRenderer) {
        self.frame_count = geometry.frame_count();
        self.audible_frame_count = renderer.render(&geometry, &mut self.left, &mut self.right);
        self.cursor = 0;
        self.active = true;
    }

    pub(super) fn deactivate(&mut self) {
        self.active = false;
        self.cursor = 0;
    }

    /// Fetch the frame at the cursor and move the cursor. Returns `None` when the grain already
    /// finished or when the frame is silent.
    #[inline]
    pub(super) fn next_frame(&mut self) -> Option<(f32, f32)> {
        if self.cursor >= self.frame_count {
            return None;
        }
        let frame = if self.cursor < self.audible_frame_count {
            Some((self.left[self.cursor], self.right[self.cursor]))
        } else {
            None
        };
        self.cursor += 1;
        frame
    }

    #[inline]
    pub(super) fn is_finished(&self) -> bool {
        self.cursor >= self.frame_count
    }
}

// -------------------------------------------------------------------------------------------------

/// Grain concurrency limits.
///
/// A new limit only becomes effective when no grains are playing, so in-flight grains never
/// get truncated by a shrinking limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrainLimits {
    capacity: usize,
    effective: usize,
    requested: Option<usize>,
}

impl GrainLimits {
    pub fn new(capacity: usize, limit: usize) -> Result<Self, Error> {
        let mut limits = Self {
            capacity,
            effective: capacity,
            requested: None,
        };
        limits.validate(limit)?;
        limits.effective = limit;
        Ok(limits)
    }

    /// Number of allocated grain slots: the upper bound of all limits.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The currently applied grain limit.
    pub fn effective(&self) -> usize {
        self.effective
    }

    /// A pending, not yet applied limit.
    pub fn requested(&self) -> Option<usize> {
        self.requested
    }

    pub fn is_pending(&self) -> bool {
        self.requested.is_some()
    }

    /// Request a new limit. Applied immediately when no grains are active, else staged.
    pub fn request(&mut self, limit: usize, active_count: usize) -> Result<(), Error> {
        self.validate(limit)?;
        if active_count == 0 {
            self.effective = limit;
            self.requested = None;
        } else {
            self.requested = Some(limit);
        }
        Ok(())
    }

    /// Apply a pending limit. Call when the active grain count reached zero.
    pub fn apply_pending(&mut self) {
        if let Some(limit) = self.requested.take() {
            self.effective = limit;
        }
    }

    fn validate(&self, limit: usize) -> Result<(), Error> {
        validate_grain_limit(limit, self.capacity)
    }
}

/// Check a grain limit against [`LiveCloud::GRAIN_LIMIT`], with the given grain capacity as
/// upper bound.
pub(crate) fn validate_grain_limit(limit: usize, capacity: usize) -> Result<(), Error> {
    let capacity = i32::try_from(capacity).unwrap_or(i32::MAX);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    LiveCloud::GRAIN_LIMIT
        .with_range_end(capacity)
        .validate_value(limit)
        .map(|_| ())
}

// -------------------------------------------------------------------------------------------------

/// Fixed-capacity arena of grain slots, indexed by slot id. Schedules new grains on triggers.
///
/// All grain buffers are allocated upfront, so scheduling and mixing never allocate.
pub(crate) struct GrainPool {
    pub(super) grains: Vec<Grain>,
    /// Slot ids of currently active grains, in activation order.
    pub(super) active_slots: Vec<usize>,
    pub(super) limits: GrainLimits,
}

impl GrainPool {
    /// Create a new pool with `capacity` slots which can each hold up to `max_audible_frames`
    /// rendered frames.
    pub fn new(capacity: usize, limit: usize, max_audible_frames: usize) -> Result<Self, Error> {
        let limits = GrainLimits::new(capacity, limit)?;
        let mut grains = Vec::new();
        grains.try_reserve_exact(capacity)?;
        for _ in 0..capacity {
            grains.push(Grain::new(max_audible_frames)?);
        }
        let mut active_slots = Vec::new();
        active_slots.try_reserve_exact(capacity)?;
        Ok(Self {
            grains,
            active_slots,
            limits,
        })
    }

    /// Number of currently playing grains.
    #[inline]
    pub fn active_count(&self) -> usize {
        self.active_slots.len()
    }

    pub fn limits(&self) -> &GrainLimits {
        &self.limits
    }

    /// Request a new grain limit, see [`GrainLimits::request`].
    pub fn request_limit(&mut self, limit: usize) -> Result<(), Error> {
        let active_count = self.active_count();
        self.limits.request(limit, active_count)
    }

    /// Handle a fired trigger: allocate a free slot, randomize the grain's parameters, and
    /// pre-render it. Returns the new grain's slot id, or `None` when the trigger got dropped
    /// because all slots within the limit are busy or a limit change is pending.
    pub fn trigger(
        &mut self,
        controls: &ResolvedControls,
        renderer: &GrainRenderer,
        random: &mut dyn RandomSource,
    ) -> Option<usize> {
        if self.active_count() >= self.limits.effective() || self.limits.is_pending() {
            return None;
        }
        let slot = self.grains[..self.limits.effective()]
            .iter()
            .position(|grain| !grain.is_active())?;
        let geometry = GrainGeometry::randomized(controls, renderer.recorder(), random);
        self.grains[slot].activate(geometry, renderer);
        self.active_slots.push(slot);
        Some(slot)
    }

    /// Force-retire all grains, e.g. after the window table got replaced.
    pub fn invalidate_all(&mut self) {
        for slot in self.active_slots.drain(..) {
            self.grains[slot].deactivate();
        }
        self.limits.apply_pending();
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::{
            controls::{ControlChannel, ControlResolver, ControlSignals},
            BehaviorFlags,
        },
        window::WindowTable,
    };
    use strum::EnumCount;

    /// Random source which always returns the range's center.
    struct CenterRandom;

    impl RandomSource for CenterRandom {
        fn uniform(&mut self, min: f64, max: f64) -> f64 {
            (min + max) / 2.0
        }
    }

    const DISCONNECTED: ControlSignals<'static> = [None; ControlChannel::COUNT];

    fn recorder(capacity: usize, fill: f32) -> Result<RingBufferRecorder, Error> {
        let mut recorder = RingBufferRecorder::new(capacity)?;
        recorder.set_recording(true);
        for _ in 0..capacity {
            recorder.write(fill);
        }
        Ok(recorder)
    }

    #[test]
    fn limits_are_staged() -> Result<(), Box<Error>> {
        let mut limits = GrainLimits::new(512, 16)?;
        assert!(limits.request(0, 0).is_err());
        assert!(limits.request(513, 0).is_err());
        assert_eq!(limits.effective(), 16);

        // applied immediately when idle
        limits.request(8, 0)?;
        assert_eq!(limits.effective(), 8);
        assert!(!limits.is_pending());

        // staged while grains are playing
        for limit in [1, 100, 512, 3] {
            limits.request(limit, 2)?;
            assert_eq!(limits.effective(), 8);
        }
        assert_eq!(limits.requested(), Some(3));
        limits.apply_pending();
        assert_eq!(limits.effective(), 3);
        assert!(!limits.is_pending());

        assert!(GrainLimits::new(4, 5).is_err());
        Ok(())
    }

    #[test]
    fn geometry_wraps_read_start() -> Result<(), Box<Error>> {
        let sample_rate = 1000; // one frame per ms
        let mut resolver = ControlResolver::new(sample_rate);
        resolver.set_scalar(ControlChannel::LengthMin, 10.0)?;
        resolver.set_scalar(ControlChannel::LengthMax, 10.0)?;
        resolver.set_scalar(ControlChannel::PitchMin, 2.0)?;
        resolver.set_scalar(ControlChannel::PitchMax, 2.0)?;
        resolver.set_scalar(ControlChannel::Delay, 5.0)?;
        let controls = resolver.resolve_all(&DISCONNECTED, 0);

        let mut recorder = RingBufferRecorder::new(2000)?;
        recorder.set_recording(true);
        for _ in 0..30 {
            recorder.write(0.0);
        }
        let geometry = GrainGeometry::randomized(&controls, &recorder, &mut CenterRandom);
        assert_eq!(geometry.duration, 10.0);
        assert_eq!(geometry.play, 20.0);
        assert_eq!(geometry.start, 30.0 - 20.0 - 5.0);
        assert_eq!(geometry.frame_count(), 20);
        assert_eq!(geometry.audible_frame_count(), 10);

        // wraps into older history
        let recorder = RingBufferRecorder::new(2000)?;
        let geometry = GrainGeometry::randomized(&controls, &recorder, &mut CenterRandom);
        assert_eq!(geometry.start, 2000.0 - 20.0 - 5.0);
        Ok(())
    }

    #[test]
    fn play_length_is_limited_to_ring_capacity() -> Result<(), Box<Error>> {
        let sample_rate = 1000;
        let mut resolver = ControlResolver::new(sample_rate);
        resolver.set_scalar(ControlChannel::LengthMin, 500.0)?;
        resolver.set_scalar(ControlChannel::LengthMax, 500.0)?;
        resolver.set_scalar(ControlChannel::PitchMin, 10.0)?;
        resolver.set_scalar(ControlChannel::PitchMax, 10.0)?;
        let controls = resolver.resolve_all(&DISCONNECTED, 0);
        let recorder = RingBufferRecorder::new(2000)?;
        let geometry = GrainGeometry::randomized(&controls, &recorder, &mut CenterRandom);
        assert_eq!(geometry.play, 2000.0);
        assert!(geometry.start >= 0.0 && geometry.start < 2000.0);
        Ok(())
    }

    #[test]
    fn inverted_ranges_stay_in_bounds() -> Result<(), Box<Error>> {
        let mut resolver = ControlResolver::new(1000);
        resolver.set_scalar(ControlChannel::PitchMin, 10.0)?;
        resolver.set_scalar(ControlChannel::PitchMax, 0.001)?;
        resolver.set_scalar(ControlChannel::GainMin, 2.0)?;
        resolver.set_scalar(ControlChannel::GainMax, 0.0)?;
        let controls = resolver.resolve_all(&DISCONNECTED, 0);
        let recorder = RingBufferRecorder::new(2000)?;
        let mut random = crate::utils::random::SmallRngSource::seeded(7);
        for _ in 0..100 {
            let geometry = GrainGeometry::randomized(&controls, &recorder, &mut random);
            assert!((0.001..=10.0).contains(&geometry.pitch));
            assert!((0.0..=2.0).contains(&geometry.gain));
            assert!(geometry.play >= 0.0 && geometry.play <= 2000.0);
        }
        Ok(())
    }

    #[test]
    fn triggers_respect_limit() -> Result<(), Box<Error>> {
        let resolver = ControlResolver::new(1000);
        let controls = resolver.resolve_all(&DISCONNECTED, 0);
        let recorder = recorder(2000, 0.5)?;
        let window = WindowTable::hann("hann", 64);
        let window_data = window.try_lock().unwrap();
        let renderer = GrainRenderer::new(&window_data, &recorder, BehaviorFlags::default());

        let mut pool = GrainPool::new(8, 3, 500)?;
        assert_eq!(pool.trigger(&controls, &renderer, &mut CenterRandom), Some(0));
        assert_eq!(pool.trigger(&controls, &renderer, &mut CenterRandom), Some(1));
        assert_eq!(pool.trigger(&controls, &renderer, &mut CenterRandom), Some(2));
        assert_eq!(pool.active_count(), 3);

        // full: triggers are dropped
        for _ in 0..10 {
            assert_eq!(pool.trigger(&controls, &renderer, &mut CenterRandom), None);
            assert_eq!(pool.active_count(), 3);
        }

        // a pending limit change blocks new grains until all grains finished
        pool.request_limit(8)?;
        assert_eq!(pool.limits().effective(), 3);
        pool.grains[1].deactivate();
        pool.active_slots.retain(|&slot| slot != 1);
        assert_eq!(pool.trigger(&controls, &renderer, &mut CenterRandom), None);

        pool.invalidate_all();
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.limits().effective(), 8);
        assert!(pool.grains.iter().all(|grain| !grain.is_active()));
        Ok(())
    }

    #[test]
    fn degenerate_grains() -> Result<(), Box<Error>> {
        let geometry = GrainGeometry {
            play: 0.5,
            duration: 1.0,
            ..Default::default()
        };
        assert_eq!(geometry.audible_frame_count(), 0);
        let mut grain = Grain::new(4)?;
        grain.frame_count = geometry.frame_count();
        grain.active = true;
        assert_eq!(grain.frame_count, 0);
        assert_eq!(grain.next_frame(), None);
        assert!(grain.is_finished());
        Ok(())
    }
}
