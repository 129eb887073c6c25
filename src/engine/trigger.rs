// -------------------------------------------------------------------------------------------------

/// Trigger detection mode of a [`TriggerDetector`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    strum::EnumString,
    strum::Display,
    strum::VariantNames,
)]
#[repr(u8)]
pub enum TriggerMode {
    /// Fires when a rising ramp signal (e.g. a 0..1 sawtooth LFO) jumps back towards zero.
    #[default]
    RampReset,
    /// Fires when the signal crosses zero from negative to non-negative values.
    ZeroCrossing,
}

// -------------------------------------------------------------------------------------------------

/// Stateful edge detector over a trigger signal. Fires at most once per sample.
#[derive(Debug, Clone)]
pub struct TriggerDetector {
    mode: TriggerMode,
    previous: f32,
}

impl TriggerDetector {
    /// Minimum single-sample drop which is treated as a ramp reset.
    ///
    /// Tuned for ramps in range 0..1. Any steeper falling edge of the trigger signal also fires.
    pub const RAMP_RESET_THRESHOLD: f32 = 0.9;

    pub fn new(mode: TriggerMode) -> Self {
        Self {
            mode,
            previous: 0.0,
        }
    }

    pub fn mode(&self) -> TriggerMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: TriggerMode) {
        self.mode = mode;
    }

    /// Forget the previous sample.
    pub fn reset(&mut self) {
        self.previous = 0.0;
    }

    /// Evaluate the next trigger signal sample. Returns true when a trigger fires.
    #[inline]
    pub fn evaluate(&mut self, current: f32) -> bool {
        let fires = match self.mode {
            TriggerMode::ZeroCrossing => self.previous < 0.0 && current >= 0.0,
            TriggerMode::RampReset => (self.previous - current) > Self::RAMP_RESET_THRESHOLD,
        };
        self.previous = current;
        fires
    }
}

impl Default for TriggerDetector {
    fn default() -> Self {
        Self::new(TriggerMode::default())
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_reset() {
        let mut detector = TriggerDetector::new(TriggerMode::RampReset);
        // ramp 0..1 over 100 samples, then reset to 0
        let mut fired = Vec::new();
        for i in 0..100 {
            if detector.evaluate(i as f32 / 99.0) {
                fired.push(i);
            }
        }
        if detector.evaluate(0.0) {
            fired.push(100);
        }
        assert_eq!(fired, vec![100]);

        // small drops don't fire
        let mut detector = TriggerDetector::new(TriggerMode::RampReset);
        assert!(!detector.evaluate(1.0));
        assert!(!detector.evaluate(0.2));
        assert!(!detector.evaluate(-0.6));
    }

    #[test]
    fn zero_crossing() {
        let mut detector = TriggerDetector::new(TriggerMode::ZeroCrossing);
        let signal = [0.5, -0.5, -0.1, 0.0, 0.5, -0.2, 0.3, 1.0, -1.0];
        let fired = signal
            .iter()
            .map(|s| detector.evaluate(*s))
            .collect::<Vec<_>>();
        assert_eq!(
            fired,
            vec![false, false, false, true, false, false, true, false, false]
        );
    }

    #[test]
    fn mode_switch_keeps_state() {
        let mut detector = TriggerDetector::new(TriggerMode::RampReset);
        assert!(!detector.evaluate(-0.5));
        detector.set_mode(TriggerMode::ZeroCrossing);
        assert!(detector.evaluate(0.5));
        detector.reset();
        assert!(!detector.evaluate(0.5));
    }

    #[test]
    fn mode_names() {
        assert_eq!(TriggerMode::ZeroCrossing.to_string(), "ZeroCrossing");
        assert_eq!(
            "RampReset".parse::<TriggerMode>().ok(),
            Some(TriggerMode::RampReset)
        );
    }
}
