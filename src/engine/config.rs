use four_cc::FourCC;

use crate::{
    engine::{grain::validate_grain_limit, trigger::TriggerMode, LiveCloud, MAX_GRAINS},
    parameter::BooleanParameter,
    Error,
};

// -------------------------------------------------------------------------------------------------

/// The engine's persisted behavior toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BehaviorFlags {
    /// Linearly interpolate between window table frames. Else window positions get truncated.
    pub window_interpolation: bool,
    /// Linearly interpolate between recorded frames. Else read positions get truncated.
    pub sample_interpolation: bool,
    /// Detect triggers at positive zero crossings instead of ramp resets.
    pub zero_crossing: bool,
}

impl Default for BehaviorFlags {
    fn default() -> Self {
        Self {
            window_interpolation: LiveCloud::WINDOW_INTERPOLATION.default_value(),
            sample_interpolation: LiveCloud::SAMPLE_INTERPOLATION.default_value(),
            zero_crossing: LiveCloud::ZERO_CROSSING.default_value(),
        }
    }
}

impl BehaviorFlags {
    const PARAMETERS: [&'static BooleanParameter; 3] = [
        &LiveCloud::WINDOW_INTERPOLATION,
        &LiveCloud::SAMPLE_INTERPOLATION,
        &LiveCloud::ZERO_CROSSING,
    ];

    /// The trigger detection mode the flags select.
    pub fn trigger_mode(&self) -> TriggerMode {
        if self.zero_crossing {
            TriggerMode::ZeroCrossing
        } else {
            TriggerMode::RampReset
        }
    }

    fn flag(&self, id: FourCC) -> Option<bool> {
        match id {
            _ if id == LiveCloud::WINDOW_INTERPOLATION.id() => Some(self.window_interpolation),
            _ if id == LiveCloud::SAMPLE_INTERPOLATION.id() => Some(self.sample_interpolation),
            _ if id == LiveCloud::ZERO_CROSSING.id() => Some(self.zero_crossing),
            _ => None,
        }
    }

    fn flag_mut(&mut self, id: FourCC) -> Option<&mut bool> {
        match id {
            _ if id == LiveCloud::WINDOW_INTERPOLATION.id() => Some(&mut self.window_interpolation),
            _ if id == LiveCloud::SAMPLE_INTERPOLATION.id() => Some(&mut self.sample_interpolation),
            _ if id == LiveCloud::ZERO_CROSSING.id() => Some(&mut self.zero_crossing),
            _ => None,
        }
    }

    /// Serialize the flags as parameter id, string value pairs, e.g. to persist them in a
    /// host's document.
    pub fn to_values(&self) -> Vec<(FourCC, String)> {
        Self::PARAMETERS
            .iter()
            .filter_map(|parameter| {
                let value = self.flag(parameter.id())?;
                Some((parameter.id(), parameter.value_to_string(value)))
            })
            .collect()
    }

    /// Restore flags from parameter id, string value pairs. Missing flags use their defaults.
    pub fn from_values<S: AsRef<str>>(values: &[(FourCC, S)]) -> Result<Self, Error> {
        let mut flags = Self::default();
        for (id, string) in values {
            let parameter = Self::PARAMETERS
                .iter()
                .find(|parameter| parameter.id() == *id)
                .ok_or_else(|| Error::ParameterError(format!("Unknown behavior flag '{id}'")))?;
            let value = parameter.string_to_value(string.as_ref()).ok_or_else(|| {
                Error::ParameterError(format!(
                    "Invalid value '{}' for behavior flag '{id}'",
                    string.as_ref()
                ))
            })?;
            if let Some(flag) = flags.flag_mut(*id) {
                *flag = value;
            }
        }
        Ok(flags)
    }
}

// -------------------------------------------------------------------------------------------------

/// Init-time configuration of a [`LiveCloud`] engine.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveCloudConfig {
    /// Initial sample rate in Hz. Can be changed later on via [`LiveCloud::prepare`].
    pub sample_rate: u32,
    /// Number of preallocated grain slots (1 - 512). Upper bound for all grain limits.
    pub grain_capacity: usize,
    /// Initial number of concurrently playing grains (1 - `grain_capacity`).
    pub grain_limit: usize,
    /// Name of the initial window table in the engine's window registry. May be empty or
    /// refer to a table that gets registered later on.
    pub window_name: String,
    /// Initial recording state.
    pub record: bool,
    /// Initial behavior toggles.
    pub flags: BehaviorFlags,
    /// Seed for the grain parameter randomization. When `None`, the engine seeds from the
    /// operating system's entropy source.
    pub random_seed: Option<u64>,
}

impl Default for LiveCloudConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            grain_capacity: MAX_GRAINS,
            grain_limit: LiveCloud::GRAIN_LIMIT.default_value() as usize,
            window_name: String::new(),
            record: LiveCloud::RECORD.default_value(),
            flags: BehaviorFlags::default(),
            random_seed: None,
        }
    }
}

impl LiveCloudConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate all config values.
    pub fn validate(&self) -> Result<(), Error> {
        if self.sample_rate == 0 {
            return Err(Error::ParameterError(
                "Sample rate must be > 0".to_string(),
            ));
        }
        if self.grain_capacity == 0 || self.grain_capacity > MAX_GRAINS {
            return Err(Error::ParameterError(format!(
                "Grain capacity must be between 1 and {MAX_GRAINS}"
            )));
        }
        validate_grain_limit(self.grain_limit, self.grain_capacity)
    }
}

// -------------------------------------------------------------------------------------------------
