use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crossbeam_queue::ArrayQueue;
use four_cc::FourCC;
use strum::EnumCount;

use crate::{
    parameter::{BooleanParameter, FloatParameter, IntegerParameter},
    utils::{
        assert_no_alloc,
        buffer::clear_buffer,
        permit_alloc,
        random::{RandomSource, SmallRngSource},
    },
    window::{WindowTable, WindowTableRegistry},
    Error, Parameter,
};

// -------------------------------------------------------------------------------------------------

mod config;
mod controls;
mod grain;
mod handle;
mod mixer;
mod recorder;
mod renderer;
mod trigger;

pub use config::{BehaviorFlags, LiveCloudConfig};
pub use controls::{
    ControlBounds, ControlChannel, ControlResolver, ControlSignals, ResolvedControls,
};
pub use grain::{GrainGeometry, GrainLimits};
pub use handle::LiveCloudHandle;
pub use recorder::RingBufferRecorder;
pub use trigger::{TriggerDetector, TriggerMode};

use grain::GrainPool;
use handle::{LiveCloudMessage, LiveCloudMessageQueue};
use renderer::GrainRenderer;

// -------------------------------------------------------------------------------------------------

/// Duration of the recorded live input history.
pub const RECORD_BUFFER_MS: f64 = 2000.0;
/// Maximum grain delay: half of the recorded history.
pub const MAX_DELAY_MS: f64 = RECORD_BUFFER_MS / 2.0;

pub const MIN_GRAIN_LENGTH_MS: f64 = 1.0;
pub const MAX_GRAIN_LENGTH_MS: f64 = 500.0;

pub const MIN_PITCH: f64 = 0.001;
pub const MAX_PITCH: f64 = 10.0;

pub const MIN_PAN: f64 = -1.0;
pub const MAX_PAN: f64 = 1.0;

pub const MIN_GAIN: f64 = 0.0;
pub const MAX_GAIN: f64 = 2.0;

/// Upper bound for the number of concurrently playing grains.
pub const MAX_GRAINS: usize = 512;

// -------------------------------------------------------------------------------------------------

/// Audio rate inputs of a single processed block.
///
/// The block length is defined by the output buffers passed to [`LiveCloud::process`]. Input
/// slices which are shorter than the block are treated as silence in missing frames.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockInputs<'a> {
    /// Trigger signal: grains get spawned on ramp resets or zero crossings.
    pub trigger: &'a [f32],
    /// Live input signal which gets recorded.
    pub input: &'a [f32],
    /// Control signals. `Some` channels are connected for this block and override the channel's
    /// scalar value.
    pub controls: ControlSignals<'a>,
}

impl<'a> BlockInputs<'a> {
    pub fn new(trigger: &'a [f32], input: &'a [f32]) -> Self {
        Self {
            trigger,
            input,
            controls: [None; ControlChannel::COUNT],
        }
    }

    /// Connect a control signal for this block.
    pub fn with_control(mut self, channel: ControlChannel, signal: &'a [f32]) -> Self {
        self.controls[channel as usize] = Some(signal);
        self
    }
}

// -------------------------------------------------------------------------------------------------

/// A granular synthesis engine which records a live input and plays back randomized, windowed,
/// pitched and panned grains of the recorded history as a stereo cloud.
///
/// Grains are spawned by a trigger signal. Each grain gets fully pre-rendered when it's spawned,
/// then mixed with all other playing grains until it ends. `process` runs on the real-time audio
/// thread: it never blocks and never allocates. Control changes are sent via
/// [`LiveCloudHandle`]s from other threads.
pub struct LiveCloud {
    sample_rate: u32,
    recorder: RingBufferRecorder,
    trigger: TriggerDetector,
    controls: ControlResolver,
    grains: GrainPool,
    flags: BehaviorFlags,
    random: Box<dyn RandomSource>,
    registry: WindowTableRegistry,
    window: Option<Arc<WindowTable>>,
    window_generation: u64,
    message_queue: LiveCloudMessageQueue,
    active_grains: Arc<AtomicUsize>,
}

impl LiveCloud {
    pub const DELAY: FloatParameter = FloatParameter::new(
        FourCC(*b"dely"),
        "Delay",
        0.0..=MAX_DELAY_MS as f32,
        0.0,
    )
    .with_unit("ms");
    pub const LENGTH_MIN: FloatParameter = FloatParameter::new(
        FourCC(*b"lnmn"),
        "Length Min",
        MIN_GRAIN_LENGTH_MS as f32..=MAX_GRAIN_LENGTH_MS as f32,
        150.0,
    )
    .with_unit("ms");
    pub const LENGTH_MAX: FloatParameter = FloatParameter::new(
        FourCC(*b"lnmx"),
        "Length Max",
        MIN_GRAIN_LENGTH_MS as f32..=MAX_GRAIN_LENGTH_MS as f32,
        150.0,
    )
    .with_unit("ms");
    pub const PITCH_MIN: FloatParameter = FloatParameter::new(
        FourCC(*b"ptmn"),
        "Pitch Min",
        MIN_PITCH as f32..=MAX_PITCH as f32,
        1.0,
    );
    pub const PITCH_MAX: FloatParameter = FloatParameter::new(
        FourCC(*b"ptmx"),
        "Pitch Max",
        MIN_PITCH as f32..=MAX_PITCH as f32,
        1.0,
    );
    pub const PAN_MIN: FloatParameter =
        FloatParameter::new(FourCC(*b"pnmn"), "Pan Min", -1.0..=1.0, 0.0);
    pub const PAN_MAX: FloatParameter =
        FloatParameter::new(FourCC(*b"pnmx"), "Pan Max", -1.0..=1.0, 0.0);
    pub const GAIN_MIN: FloatParameter =
        FloatParameter::new(FourCC(*b"gnmn"), "Gain Min", 0.0..=2.0, 1.0);
    pub const GAIN_MAX: FloatParameter =
        FloatParameter::new(FourCC(*b"gnmx"), "Gain Max", 0.0..=2.0, 1.0);

    pub const GRAIN_LIMIT: IntegerParameter = IntegerParameter::new(
        FourCC(*b"glim"),
        "Grain Limit",
        1..=MAX_GRAINS as i32,
        16,
    );
    pub const RECORD: BooleanParameter = BooleanParameter::new(FourCC(*b"rcrd"), "Record", false);

    pub const WINDOW_INTERPOLATION: BooleanParameter =
        BooleanParameter::new(FourCC(*b"wint"), "Window Interpolation", false);
    pub const SAMPLE_INTERPOLATION: BooleanParameter =
        BooleanParameter::new(FourCC(*b"sint"), "Sample Interpolation", true);
    pub const ZERO_CROSSING: BooleanParameter =
        BooleanParameter::new(FourCC(*b"zcrs"), "Zero Crossing Trigger", false);

    const MESSAGE_QUEUE_SIZE: usize = 128;

    /// Create a new engine with the given config. Window names get resolved from the given
    /// registry.
    ///
    /// All buffers are allocated here. Fails when the config is invalid or allocation failed.
    pub fn new(config: LiveCloudConfig, registry: WindowTableRegistry) -> Result<Self, Error> {
        config.validate()?;

        let recorder = {
            let mut recorder = RingBufferRecorder::new(Self::record_capacity(config.sample_rate))?;
            recorder.set_recording(config.record);
            recorder
        };
        let grains = GrainPool::new(
            config.grain_capacity,
            config.grain_limit,
            Self::max_grain_frames(config.sample_rate),
        )
        .inspect_err(|err| log::error!("Failed to allocate grain buffers: {err}"))?;
        let random: Box<dyn RandomSource> = match config.random_seed {
            Some(seed) => Box::new(SmallRngSource::seeded(seed)),
            None => Box::new(SmallRngSource::from_os_rng()),
        };

        let window = if config.window_name.is_empty() {
            None
        } else if let Some(table) = registry.get(&config.window_name) {
            if table.channel_count() > 1 {
                log::warn!(
                    "Window table '{}' has {} channels: only the first one is used",
                    config.window_name,
                    table.channel_count()
                );
            }
            Some(table)
        } else {
            log::warn!(
                "Window table '{}' does not exist: output is silent until a window is set",
                config.window_name
            );
            None
        };
        let window_generation = window.as_ref().map_or(0, |table| table.generation());

        log::debug!(
            "Created live cloud engine: {} Hz, {} grain slots, grain limit {}",
            config.sample_rate,
            config.grain_capacity,
            config.grain_limit
        );

        Ok(Self {
            sample_rate: config.sample_rate,
            recorder,
            trigger: TriggerDetector::new(config.flags.trigger_mode()),
            controls: ControlResolver::new(config.sample_rate),
            grains,
            flags: config.flags,
            random,
            registry,
            window,
            window_generation,
            message_queue: Arc::new(ArrayQueue::new(Self::MESSAGE_QUEUE_SIZE)),
            active_grains: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Replace the engine's random source, e.g. with a deterministic one.
    pub fn with_random_source(mut self, random: Box<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    /// Descriptors of all of the engine's control parameters.
    pub fn parameters() -> Vec<&'static dyn Parameter> {
        vec![
            &Self::DELAY,
            &Self::LENGTH_MIN,
            &Self::LENGTH_MAX,
            &Self::PITCH_MIN,
            &Self::PITCH_MAX,
            &Self::PAN_MIN,
            &Self::PAN_MAX,
            &Self::GAIN_MIN,
            &Self::GAIN_MAX,
            &Self::GRAIN_LIMIT,
            &Self::RECORD,
            &Self::WINDOW_INTERPOLATION,
            &Self::SAMPLE_INTERPOLATION,
            &Self::ZERO_CROSSING,
        ]
    }

    /// Create a new handle to control this engine from other threads.
    pub fn handle(&self) -> LiveCloudHandle {
        LiveCloudHandle::new(
            Arc::clone(&self.message_queue),
            self.registry.clone(),
            Arc::clone(&self.active_grains),
            self.grains.limits().capacity(),
        )
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of currently playing grains.
    pub fn active_grains(&self) -> usize {
        self.grains.active_count()
    }

    /// The currently applied grain limit. Pending limit changes are not yet included.
    pub fn effective_grain_limit(&self) -> usize {
        self.grains.limits().effective()
    }

    pub fn flags(&self) -> BehaviorFlags {
        self.flags
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn recorder(&self) -> &RingBufferRecorder {
        &self.recorder
    }

    pub fn controls(&self) -> &ControlResolver {
        &self.controls
    }

    /// Name of the currently used window table, if any.
    pub fn window_name(&self) -> Option<&str> {
        self.window.as_deref().map(WindowTable::name)
    }

    /// Prepare the engine for playback with the given sample rate.
    ///
    /// Not real-time safe. On sample rate changes, the recorded history gets discarded and all
    /// playing grains get stopped. A pending grain limit change gets applied.
    ///
    /// All new buffers are allocated before any state changes, so the engine keeps running with
    /// its previous sample rate when this fails.
    pub fn prepare(&mut self, sample_rate: u32) -> Result<(), Error> {
        if sample_rate == 0 {
            return Err(Error::ParameterError("Sample rate must be > 0".to_string()));
        }
        if sample_rate == self.sample_rate {
            return Ok(());
        }
        let recorder = {
            let mut recorder = RingBufferRecorder::new(Self::record_capacity(sample_rate))?;
            recorder.set_recording(self.recorder.is_recording());
            recorder
        };
        let limits = self.grains.limits();
        let grains = GrainPool::new(
            limits.capacity(),
            limits.requested().unwrap_or(limits.effective()),
            Self::max_grain_frames(sample_rate),
        )
        .inspect_err(|err| log::error!("Failed to allocate grain buffers: {err}"))?;

        self.recorder = recorder;
        self.grains = grains;
        self.controls.set_sample_rate(sample_rate);
        self.trigger.reset();
        self.active_grains.store(0, Ordering::Relaxed);
        log::debug!(
            "Changed live cloud sample rate from {} to {} Hz",
            self.sample_rate,
            sample_rate
        );
        self.sample_rate = sample_rate;
        Ok(())
    }

    /// Process a single block: record the input, spawn grains on triggers and write the mixed
    /// grains into the given stereo output buffers.
    ///
    /// Returns the number of grains playing at the end of the block.
    pub fn process(&mut self, inputs: &BlockInputs, left: &mut [f32], right: &mut [f32]) -> usize {
        let active_grains = assert_no_alloc(|| {
            self.process_messages();
            self.process_block(inputs, left, right)
        });
        self.active_grains.store(active_grains, Ordering::Relaxed);
        active_grains
    }

    fn process_block(
        &mut self,
        inputs: &BlockInputs,
        left: &mut [f32],
        right: &mut [f32],
    ) -> usize {
        let frame_count = left.len().min(right.len());
        let (left, right) = (&mut left[..frame_count], &mut right[..frame_count]);

        let Some(window_data) = self.window.as_ref().and_then(|table| table.try_lock()) else {
            // table unset or currently being replaced: retry with the next block
            self.grains.invalidate_all();
            clear_buffer(left);
            clear_buffer(right);
            return 0;
        };
        if window_data.is_empty() {
            self.grains.invalidate_all();
            clear_buffer(left);
            clear_buffer(right);
            return 0;
        }
        let generation = self.window.as_ref().map_or(0, |table| table.generation());
        if generation != self.window_generation {
            // grains were rendered with stale window content
            self.grains.invalidate_all();
            self.window_generation = generation;
        }

        for (frame, (left, right)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
            let input = inputs.input.get(frame).copied().unwrap_or(0.0);
            self.recorder.write(input);
            let trigger = inputs.trigger.get(frame).copied().unwrap_or(0.0);
            if self.trigger.evaluate(trigger) {
                let controls = self.controls.resolve_all(&inputs.controls, frame);
                let renderer = GrainRenderer::new(&window_data, &self.recorder, self.flags);
                self.grains.trigger(&controls, &renderer, &mut *self.random);
            }
            (*left, *right) = self.grains.advance();
        }
        self.grains.active_count()
    }

    fn process_messages(&mut self) {
        while let Some(message) = self.message_queue.pop() {
            match message {
                LiveCloudMessage::SetWindow(table) => {
                    self.window_generation = table.generation();
                    let previous = self.window.replace(table);
                    self.grains.invalidate_all();
                    // may release the last reference to a removed table
                    permit_alloc(|| drop(previous));
                }
                LiveCloudMessage::SetGrainLimit(limit) => {
                    if let Err(err) = self.grains.request_limit(limit) {
                        permit_alloc(|| log::warn!("Failed to change grain limit: {err}"));
                    }
                }
                LiveCloudMessage::SetRecording(record) => {
                    self.recorder.set_recording(record);
                }
                LiveCloudMessage::SetWindowInterpolation(enabled) => {
                    self.flags.window_interpolation = enabled;
                }
                LiveCloudMessage::SetSampleInterpolation(enabled) => {
                    self.flags.sample_interpolation = enabled;
                }
                LiveCloudMessage::SetTriggerMode(mode) => {
                    self.flags.zero_crossing = mode == TriggerMode::ZeroCrossing;
                    self.trigger.set_mode(mode);
                }
                LiveCloudMessage::SetControl(channel, value) => {
                    if let Err(err) = self.controls.set_scalar(channel, value) {
                        permit_alloc(|| log::warn!("Failed to set '{channel}' control: {err}"));
                    }
                }
            }
        }
    }

    fn record_capacity(sample_rate: u32) -> usize {
        Self::ms_to_frames(RECORD_BUFFER_MS, sample_rate)
    }

    fn max_grain_frames(sample_rate: u32) -> usize {
        Self::ms_to_frames(MAX_GRAIN_LENGTH_MS, sample_rate)
    }

    fn ms_to_frames(ms: f64, sample_rate: u32) -> usize {
        (ms * sample_rate as f64 / 1000.0).ceil() as usize
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> Result<WindowTableRegistry, Error> {
        let registry = WindowTableRegistry::new();
        registry.insert(WindowTable::hann("hann", 512))?;
        registry.insert(WindowTable::new("stereo", vec![1.0; 64], 2)?)?;
        Ok(registry)
    }

    fn config(sample_rate: u32) -> LiveCloudConfig {
        LiveCloudConfig {
            sample_rate,
            window_name: "hann".to_string(),
            record: true,
            random_seed: Some(0x5eed),
            ..Default::default()
        }
    }

    /// Process a block with the given trigger and a constant input signal.
    fn process(cloud: &mut LiveCloud, trigger: &[f32], input: f32) -> (Vec<f32>, Vec<f32>) {
        let input = vec![input; trigger.len()];
        let mut left = vec![0.0; trigger.len()];
        let mut right = vec![0.0; trigger.len()];
        cloud.process(&BlockInputs::new(trigger, &input), &mut left, &mut right);
        (left, right)
    }

    #[test]
    fn parameters() {
        let parameters = LiveCloud::parameters();
        assert_eq!(parameters.len(), ControlChannel::COUNT + 5);
        let mut ids = parameters.iter().map(|p| p.id()).collect::<Vec<_>>();
        ids.sort_by_key(|id| id.0);
        ids.dedup();
        assert_eq!(ids.len(), parameters.len());
    }

    #[test]
    fn invalid_configs() {
        let registry = WindowTableRegistry::new();
        let config = LiveCloudConfig {
            grain_limit: 0,
            ..Default::default()
        };
        assert!(LiveCloud::new(config, registry.clone()).is_err());
        let config = LiveCloudConfig {
            sample_rate: 0,
            ..Default::default()
        };
        assert!(LiveCloud::new(config, registry).is_err());
    }

    #[test]
    fn ramp_reset_spawns_one_grain() -> Result<(), Box<Error>> {
        let mut cloud = LiveCloud::new(config(44100), registry()?)?;
        let ramp = (0..100).map(|i| i as f32 / 99.0).collect::<Vec<_>>();
        process(&mut cloud, &ramp, 0.5);
        assert_eq!(cloud.active_grains(), 0);
        process(&mut cloud, &[0.0], 0.5);
        assert_eq!(cloud.active_grains(), 1);
        assert_eq!(cloud.handle().active_grains(), 1);
        Ok(())
    }

    #[test]
    fn grain_lengths() -> Result<(), Box<Error>> {
        for (pitch, expected_len) in [(1.0, 2400), (2.0, 4800)] {
            let mut cloud = LiveCloud::new(config(48000), registry()?)?;
            let handle = cloud.handle();
            for channel in [ControlChannel::LengthMin, ControlChannel::LengthMax] {
                handle.set_control(channel, 50.0)?;
            }
            for channel in [ControlChannel::PitchMin, ControlChannel::PitchMax] {
                handle.set_control(channel, pitch)?;
            }
            // record some history
            process(&mut cloud, &vec![0.0; 10000], 0.5);

            // spawn a grain in the second frame
            let (left, _) = process(&mut cloud, &[1.0, 0.0], 0.5);
            assert_eq!(cloud.active_grains(), 1);
            assert_eq!(left[1], 0.0); // window starts at zero

            // the window envelope runs over the nominal duration
            let (left, right) = process(&mut cloud, &vec![0.0; 2398], 0.5);
            assert!(left.iter().chain(right.iter()).all(|s| *s >= 0.0));
            assert!(left[100..2300].iter().all(|s| *s > 0.0));
            assert_eq!(cloud.active_grains(), 1);

            // the rest, except for the last frame of the envelope, is silent
            let (left, right) = process(&mut cloud, &vec![0.0; expected_len - 2400], 0.5);
            assert!(left.iter().skip(1).all(|s| *s == 0.0));
            assert!(right.iter().skip(1).all(|s| *s == 0.0));
            assert_eq!(cloud.active_grains(), 1);

            process(&mut cloud, &[0.0], 0.5);
            assert_eq!(cloud.active_grains(), 0);
        }
        Ok(())
    }

    #[test]
    fn grain_limit() -> Result<(), Box<Error>> {
        let mut cloud = LiveCloud::new(config(44100), registry()?)?;
        let handle = cloud.handle();
        handle.set_zero_crossing(true)?;
        handle.set_grain_limit(2)?;
        assert!(handle.set_grain_limit(0).is_err());
        assert!(handle.set_grain_limit(513).is_err());

        let trigger = [-1.0, 1.0, -1.0, 1.0, -1.0, 1.0, -1.0, 1.0];
        process(&mut cloud, &trigger, 0.5);
        assert!(cloud.flags().zero_crossing);
        assert_eq!(cloud.effective_grain_limit(), 2);
        assert_eq!(cloud.active_grains(), 2);

        // staged while grains are playing
        handle.set_grain_limit(4)?;
        process(&mut cloud, &trigger, 0.5);
        assert_eq!(cloud.effective_grain_limit(), 2);
        assert_eq!(cloud.active_grains(), 2);
        Ok(())
    }

    #[test]
    fn window_replacement_stops_grains() -> Result<(), Box<Error>> {
        let registry = registry()?;
        let mut cloud = LiveCloud::new(config(44100), registry.clone())?;
        process(&mut cloud, &vec![0.0; 4410], 0.5);
        process(&mut cloud, &[1.0, 0.0, 0.0, 0.0], 0.5);
        assert_eq!(cloud.active_grains(), 1);

        registry.insert(WindowTable::triangle("hann", 256))?;
        let (left, right) = process(&mut cloud, &[0.0; 64], 0.5);
        assert_eq!(cloud.active_grains(), 0);
        assert!(left.iter().chain(right.iter()).all(|s| *s == 0.0));

        // new triggers use the new content
        process(&mut cloud, &[1.0, 0.0], 0.5);
        assert_eq!(cloud.active_grains(), 1);
        Ok(())
    }

    #[test]
    fn locked_window_is_silent() -> Result<(), Box<Error>> {
        let registry = registry()?;
        let mut cloud = LiveCloud::new(config(44100), registry.clone())?;
        process(&mut cloud, &vec![0.0; 4410], 0.5);
        process(&mut cloud, &[1.0, 0.0], 0.5);
        assert_eq!(cloud.active_grains(), 1);

        let table = registry.get("hann").unwrap();
        let write_position = cloud.recorder().write_position();
        {
            let _writer = table.write_lock();
            let (left, right) = process(&mut cloud, &[1.0, 0.0, 0.0, 0.0], 0.5);
            assert_eq!(cloud.active_grains(), 0);
            assert!(left.iter().chain(right.iter()).all(|s| *s == 0.0));
            // neither recorded nor triggered
            assert_eq!(cloud.recorder().write_position(), write_position);
        }

        // the next block retries once the writer is gone
        process(&mut cloud, &[1.0, 0.0], 0.5);
        assert_eq!(cloud.active_grains(), 1);
        let (left, right) = process(&mut cloud, &[0.0; 512], 0.5);
        assert!(left.iter().chain(right.iter()).any(|s| *s != 0.0));
        Ok(())
    }

    #[test]
    fn missing_window_is_silent() -> Result<(), Box<Error>> {
        let registry = registry()?;
        let config = LiveCloudConfig {
            window_name: "missing".to_string(),
            ..config(44100)
        };
        let mut cloud = LiveCloud::new(config, registry.clone())?;
        assert_eq!(cloud.window_name(), None);
        let (left, right) = process(&mut cloud, &[1.0, 0.0, 1.0, 0.0], 0.5);
        assert_eq!(cloud.active_grains(), 0);
        assert!(left.iter().chain(right.iter()).all(|s| *s == 0.0));

        let handle = cloud.handle();
        assert!(handle.set_window("").is_err());
        assert!(handle.set_window("missing").is_err());
        handle.set_window("stereo")?;
        process(&mut cloud, &[1.0, 0.0], 0.5);
        assert_eq!(cloud.window_name(), Some("stereo"));
        assert_eq!(cloud.active_grains(), 1);

        // removed tables get cleared and silence the engine
        registry.remove("stereo");
        let (left, _) = process(&mut cloud, &[1.0, 0.0], 0.5);
        assert_eq!(cloud.active_grains(), 0);
        assert!(left.iter().all(|s| *s == 0.0));
        Ok(())
    }

    #[test]
    fn control_commands() -> Result<(), Box<Error>> {
        let config = LiveCloudConfig {
            record: false,
            ..config(44100)
        };
        let mut cloud = LiveCloud::new(config, registry()?)?;
        let handle = cloud.handle();
        assert!(handle.set_control(ControlChannel::GainMax, 3.0).is_err());
        handle.set_control(ControlChannel::GainMax, 1.5)?;
        handle.set_recording(true)?;
        handle.set_window_interpolation(true)?;
        handle.set_sample_interpolation(false)?;
        process(&mut cloud, &[0.0; 16], 0.5);
        assert!(cloud.is_recording());
        assert_eq!(cloud.recorder().write_position(), 16);
        assert_eq!(cloud.controls().scalar(ControlChannel::GainMax), 1.5);
        assert_eq!(
            cloud.flags(),
            BehaviorFlags {
                window_interpolation: true,
                sample_interpolation: false,
                zero_crossing: false,
            }
        );
        Ok(())
    }

    #[test]
    fn connected_controls_override_scalars() -> Result<(), Box<Error>> {
        let mut cloud = LiveCloud::new(config(48000), registry()?)?;
        let trigger = [1.0, 0.0];
        let input = [0.0, 0.0];
        let length = [10.0, 10.0];
        let inputs = BlockInputs::new(&trigger, &input)
            .with_control(ControlChannel::LengthMin, &length)
            .with_control(ControlChannel::LengthMax, &length);
        let (mut left, mut right) = (vec![0.0; 2], vec![0.0; 2]);
        cloud.process(&inputs, &mut left, &mut right);
        assert_eq!(cloud.active_grains(), 1);
        // 10 ms at 48 kHz, minus the frame played in the trigger block
        process(&mut cloud, &[0.0; 478], 0.0);
        assert_eq!(cloud.active_grains(), 1);
        process(&mut cloud, &[0.0], 0.0);
        assert_eq!(cloud.active_grains(), 0);
        Ok(())
    }

    #[test]
    fn sample_rate_changes() -> Result<(), Box<Error>> {
        let mut cloud = LiveCloud::new(config(44100), registry()?)?;
        assert_eq!(cloud.recorder().capacity(), 88200);
        process(&mut cloud, &[1.0, 0.0], 0.5);
        assert_eq!(cloud.active_grains(), 1);
        cloud.prepare(96000)?;
        assert_eq!(cloud.sample_rate(), 96000);
        assert_eq!(cloud.recorder().capacity(), 192000);
        assert_eq!(cloud.recorder().write_position(), 0);
        assert_eq!(cloud.active_grains(), 0);
        assert!(cloud.is_recording());

        // failed prepares keep the current setup
        assert!(cloud.prepare(0).is_err());
        assert_eq!(cloud.sample_rate(), 96000);
        assert_eq!(cloud.recorder().capacity(), 192000);
        Ok(())
    }

    #[test]
    fn sample_rate_change_applies_pending_limit() -> Result<(), Box<Error>> {
        let mut cloud = LiveCloud::new(config(48000), registry()?)?;
        let handle = cloud.handle();
        process(&mut cloud, &[1.0, 0.0], 0.5);
        handle.set_grain_limit(3)?;
        process(&mut cloud, &[0.5], 0.5);
        assert_eq!(cloud.active_grains(), 1);
        assert_eq!(cloud.effective_grain_limit(), 16);

        cloud.prepare(44100)?;
        assert_eq!(cloud.active_grains(), 0);
        assert_eq!(cloud.effective_grain_limit(), 3);
        Ok(())
    }
}
