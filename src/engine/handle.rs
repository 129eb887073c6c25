use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use crossbeam_queue::ArrayQueue;

use crate::{
    engine::{controls::ControlChannel, grain::validate_grain_limit, trigger::TriggerMode},
    window::{WindowTable, WindowTableRegistry},
    Error,
};

// -------------------------------------------------------------------------------------------------

/// Control messages, sent from [`LiveCloudHandle`]s to a running [`LiveCloud`](super::LiveCloud).
/// All values got validated before sending.
pub(crate) enum LiveCloudMessage {
    SetWindow(Arc<WindowTable>),
    SetGrainLimit(usize),
    SetRecording(bool),
    SetWindowInterpolation(bool),
    SetSampleInterpolation(bool),
    SetTriggerMode(TriggerMode),
    SetControl(ControlChannel, f64),
}

impl LiveCloudMessage {
    fn name(&self) -> &'static str {
        match self {
            Self::SetWindow(_) => "set_window",
            Self::SetGrainLimit(_) => "set_grain_limit",
            Self::SetRecording(_) => "set_recording",
            Self::SetWindowInterpolation(_) => "set_window_interpolation",
            Self::SetSampleInterpolation(_) => "set_sample_interpolation",
            Self::SetTriggerMode(_) => "set_trigger_mode",
            Self::SetControl(..) => "set_control",
        }
    }
}

pub(crate) type LiveCloudMessageQueue = Arc<ArrayQueue<LiveCloudMessage>>;

// -------------------------------------------------------------------------------------------------

/// A cloneable, thread-safe handle to control a [`LiveCloud`](super::LiveCloud) engine from
/// non real-time threads.
///
/// Commands get validated before they are sent. Invalid commands are rejected with an error and
/// the engine keeps its previous state. Accepted commands get applied at the start of the
/// engine's next processed block.
#[derive(Clone)]
pub struct LiveCloudHandle {
    message_queue: LiveCloudMessageQueue,
    registry: WindowTableRegistry,
    active_grains: Arc<AtomicUsize>,
    grain_capacity: usize,
}

impl LiveCloudHandle {
    pub(crate) fn new(
        message_queue: LiveCloudMessageQueue,
        registry: WindowTableRegistry,
        active_grains: Arc<AtomicUsize>,
        grain_capacity: usize,
    ) -> Self {
        Self {
            message_queue,
            registry,
            active_grains,
            grain_capacity,
        }
    }

    /// Number of grains which were playing at the end of the engine's last processed block.
    pub fn active_grains(&self) -> usize {
        self.active_grains.load(Ordering::Relaxed)
    }

    /// The window table registry the engine resolves window names from.
    pub fn registry(&self) -> &WindowTableRegistry {
        &self.registry
    }

    /// Switch to the window table with the given name. All playing grains get stopped.
    pub fn set_window(&self, name: &str) -> Result<(), Error> {
        if name.is_empty() {
            log::warn!("Ignoring window change: no window table name given");
            return Err(Error::WindowNotFoundError(name.to_string()));
        }
        let table = self.registry.get(name).ok_or_else(|| {
            log::warn!("Ignoring window change: window table '{name}' does not exist");
            Error::WindowNotFoundError(name.to_string())
        })?;
        let channel_count = table.channel_count();
        if channel_count > 1 {
            log::warn!(
                "Window table '{name}' has {channel_count} channels: only the first one is used"
            );
        }
        self.send(LiveCloudMessage::SetWindow(table))
    }

    /// Change the number of concurrently playing grains (1 - grain capacity). The new limit
    /// gets applied as soon as no grains are playing.
    pub fn set_grain_limit(&self, limit: usize) -> Result<(), Error> {
        validate_grain_limit(limit, self.grain_capacity)
            .inspect_err(|err| log::warn!("Ignoring grain limit change: {err}"))?;
        self.send(LiveCloudMessage::SetGrainLimit(limit))
    }

    /// Enable or disable recording of the live input.
    pub fn set_recording(&self, record: bool) -> Result<(), Error> {
        log::info!("record {}", if record { "on" } else { "off" });
        self.send(LiveCloudMessage::SetRecording(record))
    }

    pub fn set_window_interpolation(&self, enabled: bool) -> Result<(), Error> {
        self.send(LiveCloudMessage::SetWindowInterpolation(enabled))
    }

    pub fn set_sample_interpolation(&self, enabled: bool) -> Result<(), Error> {
        self.send(LiveCloudMessage::SetSampleInterpolation(enabled))
    }

    pub fn set_trigger_mode(&self, mode: TriggerMode) -> Result<(), Error> {
        self.send(LiveCloudMessage::SetTriggerMode(mode))
    }

    /// Shortcut for [`Self::set_trigger_mode`]: zero crossing or ramp reset detection.
    pub fn set_zero_crossing(&self, enabled: bool) -> Result<(), Error> {
        self.set_trigger_mode(if enabled {
            TriggerMode::ZeroCrossing
        } else {
            TriggerMode::RampReset
        })
    }

    /// Set the scalar value of a control channel, which is used while the channel's signal is
    /// not connected. Values are specified in the channel's parameter unit.
    pub fn set_control(&self, channel: ControlChannel, value: f64) -> Result<(), Error> {
        let value = channel.validate_scalar(value).inspect_err(|err| {
            log::warn!("Ignoring '{channel}' control change: {err}");
        })?;
        self.send(LiveCloudMessage::SetControl(channel, value))
    }

    fn send(&self, message: LiveCloudMessage) -> Result<(), Error> {
        let name = message.name();
        self.message_queue.push(message).map_err(|_| {
            log::warn!("Engine message queue is full. Failed to send a {name} message.");
            Error::SendError("Engine message queue is full".to_string())
        })
    }
}
