#![doc = include_str!("../README.md")]

// private mods (will be partly re-exported)
mod engine;
mod error;
mod parameter;
mod window;

// public, flat re-exports
pub use error::Error;

pub use engine::{
    BehaviorFlags, BlockInputs, ControlChannel, LiveCloud, LiveCloudConfig, LiveCloudHandle,
    TriggerMode, MAX_DELAY_MS, MAX_GAIN, MAX_GRAINS, MAX_GRAIN_LENGTH_MS, MAX_PAN, MAX_PITCH,
    MIN_GAIN, MIN_GRAIN_LENGTH_MS, MIN_PAN, MIN_PITCH, RECORD_BUFFER_MS,
};

pub use parameter::{
    BooleanParameter, FloatParameter, IntegerParameter, Parameter, ParameterType,
};

pub use window::{WindowData, WindowTable, WindowTableRegistry};

// public mods
pub mod utils;

pub mod dsp {
    //! Building blocks of the [`LiveCloud`](super::LiveCloud) engine.

    pub use super::engine::{
        ControlBounds, ControlResolver, ControlSignals, GrainGeometry, GrainLimits,
        ResolvedControls, RingBufferRecorder, TriggerDetector,
    };
}
