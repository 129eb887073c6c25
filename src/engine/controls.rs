use strum::{EnumCount, IntoEnumIterator};

use crate::{
    engine::{
        LiveCloud, MAX_DELAY_MS, MAX_GAIN, MAX_GRAIN_LENGTH_MS, MAX_PAN, MAX_PITCH,
        MIN_GRAIN_LENGTH_MS, MIN_GAIN, MIN_PAN, MIN_PITCH,
    },
    parameter::FloatParameter,
    utils::samples_per_ms,
    Error,
};

// -------------------------------------------------------------------------------------------------

/// The engine's nine control channels.
///
/// Each channel either follows a live, per-sample control signal (when the host reports the
/// channel's signal as connected) or a stored scalar value.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    strum::EnumString,
    strum::Display,
    strum::VariantNames,
    strum::EnumCount,
    strum::EnumIter,
)]
#[repr(u8)]
pub enum ControlChannel {
    /// Distance of the grain's end from the record cursor, in ms.
    Delay = 0,
    /// Lower bound of the randomized grain length, in ms.
    LengthMin = 1,
    /// Upper bound of the randomized grain length, in ms.
    LengthMax = 2,
    /// Lower bound of the randomized grain pitch (playback speed).
    PitchMin = 3,
    /// Upper bound of the randomized grain pitch (playback speed).
    PitchMax = 4,
    /// Lower bound of the randomized stereo position (-1 = left, 1 = right).
    PanMin = 5,
    /// Upper bound of the randomized stereo position (-1 = left, 1 = right).
    PanMax = 6,
    /// Lower bound of the randomized grain gain.
    GainMin = 7,
    /// Upper bound of the randomized grain gain.
    GainMax = 8,
}

impl ControlChannel {
    /// The channel's scalar value descriptor (range, default and unit of the stored scalar).
    pub fn parameter(&self) -> &'static FloatParameter {
        match self {
            Self::Delay => &LiveCloud::DELAY,
            Self::LengthMin => &LiveCloud::LENGTH_MIN,
            Self::LengthMax => &LiveCloud::LENGTH_MAX,
            Self::PitchMin => &LiveCloud::PITCH_MIN,
            Self::PitchMax => &LiveCloud::PITCH_MAX,
            Self::PanMin => &LiveCloud::PAN_MIN,
            Self::PanMax => &LiveCloud::PAN_MAX,
            Self::GainMin => &LiveCloud::GAIN_MIN,
            Self::GainMax => &LiveCloud::GAIN_MAX,
        }
    }

    /// Returns the given scalar value when it's inside the channel parameter's range, else an
    /// error which describes the legal range.
    pub fn validate_scalar(&self, value: f64) -> Result<f64, Error> {
        self.parameter().validate_value(value)
    }

    /// True for channels which are specified in ms and resolved in sample frames.
    pub fn is_time_based(&self) -> bool {
        matches!(self, Self::Delay | Self::LengthMin | Self::LengthMax)
    }
}

// -------------------------------------------------------------------------------------------------

/// Absolute legal ranges of all resolved control values. Time based ranges are in sample frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlBounds {
    pub delay: (f64, f64),
    pub length: (f64, f64),
    pub pitch: (f64, f64),
    pub pan: (f64, f64),
    pub gain: (f64, f64),
}

impl ControlBounds {
    pub fn new(sample_rate: u32) -> Self {
        let samples_per_ms = samples_per_ms(sample_rate);
        Self {
            delay: (0.0, MAX_DELAY_MS * samples_per_ms),
            length: (
                MIN_GRAIN_LENGTH_MS * samples_per_ms,
                MAX_GRAIN_LENGTH_MS * samples_per_ms,
            ),
            pitch: (MIN_PITCH, MAX_PITCH),
            pan: (MIN_PAN, MAX_PAN),
            gain: (MIN_GAIN, MAX_GAIN),
        }
    }

    /// Bounds of the given channel.
    pub fn range(&self, channel: ControlChannel) -> (f64, f64) {
        match channel {
            ControlChannel::Delay => self.delay,
            ControlChannel::LengthMin | ControlChannel::LengthMax => self.length,
            ControlChannel::PitchMin | ControlChannel::PitchMax => self.pitch,
            ControlChannel::PanMin | ControlChannel::PanMax => self.pan,
            ControlChannel::GainMin | ControlChannel::GainMax => self.gain,
        }
    }

    /// Clamp a value into the given channel's bounds. NaN values fall back to the lower bound.
    #[inline]
    pub fn clamp(&self, channel: ControlChannel, value: f64) -> f64 {
        clamp_range(value, self.range(channel))
    }
}

/// Clamp a value into the given `(min, max)` range. NaN values fall back to `min`.
#[inline]
pub(crate) fn clamp_range(value: f64, (min, max): (f64, f64)) -> f64 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

// -------------------------------------------------------------------------------------------------

/// All control values, resolved and clamped for a single sample frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedControls {
    values: [f64; ControlChannel::COUNT],
    bounds: ControlBounds,
}

impl ResolvedControls {
    /// The resolved value of the given channel. Time based channels are in sample frames.
    #[inline]
    pub fn get(&self, channel: ControlChannel) -> f64 {
        self.values[channel as usize]
    }

    /// The bounds the values were clamped with.
    #[inline]
    pub fn bounds(&self) -> &ControlBounds {
        &self.bounds
    }

    /// Delay in sample frames.
    #[inline]
    pub fn delay(&self) -> f64 {
        self.get(ControlChannel::Delay)
    }

    /// Grain length range in sample frames.
    #[inline]
    pub fn length(&self) -> (f64, f64) {
        (
            self.get(ControlChannel::LengthMin),
            self.get(ControlChannel::LengthMax),
        )
    }

    #[inline]
    pub fn pitch(&self) -> (f64, f64) {
        (
            self.get(ControlChannel::PitchMin),
            self.get(ControlChannel::PitchMax),
        )
    }

    #[inline]
    pub fn pan(&self) -> (f64, f64) {
        (
            self.get(ControlChannel::PanMin),
            self.get(ControlChannel::PanMax),
        )
    }

    #[inline]
    pub fn gain(&self) -> (f64, f64) {
        (
            self.get(ControlChannel::GainMin),
            self.get(ControlChannel::GainMax),
        )
    }
}

// -------------------------------------------------------------------------------------------------

/// Per-block connection state and per-sample signal values of all control channels.
///
/// `Some` signal slices are treated as connected for the whole block, `None` as disconnected.
pub type ControlSignals<'a> = [Option<&'a [f32]>; ControlChannel::COUNT];

// -------------------------------------------------------------------------------------------------

/// Resolves the nine control channels per sample from either a connected signal or the stored
/// scalar, converts time based values from ms to sample frames and clamps all values into their
/// legal ranges.
#[derive(Debug, Clone)]
pub struct ControlResolver {
    scalars: [f64; ControlChannel::COUNT],
    samples_per_ms: f64,
    bounds: ControlBounds,
}

impl ControlResolver {
    /// Create a new resolver with all scalars set to their parameter defaults.
    pub fn new(sample_rate: u32) -> Self {
        let mut scalars = [0.0; ControlChannel::COUNT];
        for channel in ControlChannel::iter() {
            scalars[channel as usize] = channel.parameter().default_value() as f64;
        }
        Self {
            scalars,
            samples_per_ms: samples_per_ms(sample_rate),
            bounds: ControlBounds::new(sample_rate),
        }
    }

    /// Re-derive sample rate dependent conversions and bounds.
    pub fn set_sample_rate(&mut self, sample_rate: u32) {
        self.samples_per_ms = samples_per_ms(sample_rate);
        self.bounds = ControlBounds::new(sample_rate);
    }

    /// Current absolute bounds of all channels.
    pub fn bounds(&self) -> &ControlBounds {
        &self.bounds
    }

    /// The stored scalar value of the given channel, in the channel parameter's unit.
    pub fn scalar(&self, channel: ControlChannel) -> f64 {
        self.scalars[channel as usize]
    }

    /// Set a new scalar value for the given channel.
    ///
    /// Values outside of the channel parameter's range are rejected and the previous value is
    /// kept.
    pub fn set_scalar(&mut self, channel: ControlChannel, value: f64) -> Result<(), Error> {
        self.scalars[channel as usize] = channel.validate_scalar(value)?;
        Ok(())
    }

    /// Resolve a single channel at the given frame of the current block.
    #[inline]
    pub fn resolve(&self, channel: ControlChannel, signals: &ControlSignals, frame: usize) -> f64 {
        let value = match signals[channel as usize] {
            // missing frames in short signal slices are treated as silence
            Some(signal) => signal.get(frame).copied().unwrap_or(0.0) as f64,
            None => self.scalars[channel as usize],
        };
        let value = if channel.is_time_based() {
            value * self.samples_per_ms
        } else {
            value
        };
        self.bounds.clamp(channel, value)
    }

    /// Resolve all channels at the given frame of the current block.
    #[inline]
    pub fn resolve_all(&self, signals: &ControlSignals, frame: usize) -> ResolvedControls {
        let mut values = [0.0; ControlChannel::COUNT];
        for channel in ControlChannel::iter() {
            values[channel as usize] = self.resolve(channel, signals, frame);
        }
        ResolvedControls {
            values,
            bounds: self.bounds,
        }
    }
}

// -------------------------------------------------------------------------------------------------
