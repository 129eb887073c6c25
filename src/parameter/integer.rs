use std::ops::RangeInclusive;

use four_cc::FourCC;

use super::{Parameter, ParameterType};
use crate::Error;

// -------------------------------------------------------------------------------------------------

/// A discrete (integer) parameter descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegerParameter {
    id: FourCC,
    name: &'static str,
    range: RangeInclusive<i32>,
    default: i32,
}

impl IntegerParameter {
    pub const fn new(
        id: FourCC,
        name: &'static str,
        range: RangeInclusive<i32>,
        default: i32,
    ) -> Self {
        assert!(
            default >= *range.start() && default <= *range.end(),
            "Invalid parameter default value"
        );
        Self {
            id,
            name,
            range,
            default,
        }
    }

    pub const fn id(&self) -> FourCC {
        self.id
    }

    pub const fn range(&self) -> &RangeInclusive<i32> {
        &self.range
    }

    pub const fn default_value(&self) -> i32 {
        self.default
    }

    pub fn clamp_value(&self, value: i32) -> i32 {
        value.clamp(*self.range.start(), *self.range.end())
    }

    /// A copy of the descriptor with its range end lowered to the given value. Ends outside of
    /// the current range are clamped into it.
    pub fn with_range_end(&self, end: i32) -> Self {
        let end = self.clamp_value(end);
        Self {
            range: *self.range.start()..=end,
            default: self.default.min(end),
            ..self.clone()
        }
    }

    /// Returns the given value when it's inside the parameter's range, else an error.
    pub fn validate_value(&self, value: i64) -> Result<i32, Error> {
        match i32::try_from(value) {
            Ok(value) if self.range.contains(&value) => Ok(value),
            _ => Err(Error::ParameterError(format!(
                "'{}' must be in range {}..={}, but is {value}",
                self.name,
                self.range.start(),
                self.range.end()
            ))),
        }
    }

    pub fn normalize_value(&self, value: i32) -> f32 {
        let span = *self.range.end() as f32 - *self.range.start() as f32;
        if span > 0.0 {
            (self.clamp_value(value) as f32 - *self.range.start() as f32) / span
        } else {
            0.0
        }
    }

    pub fn denormalize_value(&self, normalized: f32) -> i32 {
        let normalized = normalized.clamp(0.0, 1.0);
        let value = *self.range.start() as f32
            + normalized * (*self.range.end() as f32 - *self.range.start() as f32);
        value.round() as i32
    }
}

impl Parameter for IntegerParameter {
    fn id(&self) -> FourCC {
        self.id
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn parameter_type(&self) -> ParameterType {
        ParameterType::Integer {
            range: self.range.clone(),
            default: self.default,
        }
    }

    fn default_normalized_value(&self) -> f32 {
        self.normalize_value(self.default)
    }

    fn normalized_value_to_string(&self, normalized: f32, _include_unit: bool) -> String {
        self.denormalize_value(normalized).to_string()
    }

    fn string_to_normalized_value(&self, string: &str) -> Option<f32> {
        let value = string.trim().parse::<i32>().ok()?;
        Some(self.normalize_value(value))
    }
}

// -------------------------------------------------------------------------------------------------
