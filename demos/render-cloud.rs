//! Renders a grain cloud from a synthetic live input into a WAV file.
//!
//! Usage: `cargo run --example render-cloud [OUTPUT_PATH]`

use std::f32::consts::TAU;

use hound::{SampleFormat, WavSpec, WavWriter};

use livecloud::{
    utils::buffer::stereo_to_interleaved, BlockInputs, ControlChannel, LiveCloud,
    LiveCloudConfig, WindowTable, WindowTableRegistry,
};

// -------------------------------------------------------------------------------------------------

#[cfg(all(debug_assertions, feature = "assert-allocs"))]
#[global_allocator]
static A: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;

// -------------------------------------------------------------------------------------------------

// Cloud parameter consts (tweak as needed!)

const SAMPLE_RATE: u32 = 48000;
const BLOCK_SIZE: usize = 256;
const DURATION_SECS: usize = 8;

/// Grain spawn rate of the trigger ramp
const TRIGGER_RATE: f32 = 24.0; // Hz

const GRAIN_LIMIT: usize = 32;
const GRAIN_LENGTH: (f64, f64) = (40.0, 180.0); // 1ms - 500ms
const GRAIN_PITCH: (f64, f64) = (0.5, 2.0); // 0.001 - 10.0
const GRAIN_PAN: (f64, f64) = (-0.8, 0.8); // -1.0 - 1.0
const GRAIN_GAIN: (f64, f64) = (0.3, 0.7); // 0.0 - 2.0

// -------------------------------------------------------------------------------------------------

fn main() -> Result<(), Box<dyn std::error::Error>> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()?;

    let output_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "live-cloud.wav".to_string());

    // Register windows and create the engine
    let registry = WindowTableRegistry::new();
    registry.insert(WindowTable::hann("hann", 1024))?;
    registry.insert(WindowTable::triangle("triangle", 1024))?;

    let config = LiveCloudConfig {
        sample_rate: SAMPLE_RATE,
        window_name: "hann".to_string(),
        record: true,
        ..Default::default()
    };
    let mut cloud = LiveCloud::new(config, registry)?;

    // Configure the cloud via its handle, as a control thread would do
    let handle = cloud.handle();
    handle.set_grain_limit(GRAIN_LIMIT)?;
    handle.set_window_interpolation(true)?;
    for (channel, value) in [
        (ControlChannel::LengthMin, GRAIN_LENGTH.0),
        (ControlChannel::LengthMax, GRAIN_LENGTH.1),
        (ControlChannel::PitchMin, GRAIN_PITCH.0),
        (ControlChannel::PitchMax, GRAIN_PITCH.1),
        (ControlChannel::PanMin, GRAIN_PAN.0),
        (ControlChannel::PanMax, GRAIN_PAN.1),
        (ControlChannel::GainMin, GRAIN_GAIN.0),
        (ControlChannel::GainMax, GRAIN_GAIN.1),
    ] {
        handle.set_control(channel, value)?;
    }

    let spec = WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    };
    let mut writer = WavWriter::create(&output_path, spec)?;

    let mut trigger = vec![0.0; BLOCK_SIZE];
    let mut input = vec![0.0; BLOCK_SIZE];
    let mut delay = vec![0.0; BLOCK_SIZE];
    let mut left = vec![0.0; BLOCK_SIZE];
    let mut right = vec![0.0; BLOCK_SIZE];
    let mut interleaved = vec![0.0; 2 * BLOCK_SIZE];

    let total_frames = DURATION_SECS * SAMPLE_RATE as usize;
    let mut frame_time = 0;
    let mut peak_grains = 0;
    while frame_time < total_frames {
        // Synthesize the live input: a slowly gliding saw, a trigger ramp and a delay LFO
        for (i, ((trigger, input), delay)) in trigger
            .iter_mut()
            .zip(input.iter_mut())
            .zip(delay.iter_mut())
            .enumerate()
        {
            let time = (frame_time + i) as f32 / SAMPLE_RATE as f32;
            let frequency = 110.0 * (1.0 + 0.5 * (TAU * 0.1 * time).sin());
            *input = 0.5 * (2.0 * (time * frequency).fract() - 1.0);
            *trigger = (time * TRIGGER_RATE).fract();
            *delay = 250.0 * (1.0 + (TAU * 0.25 * time).sin());
        }
        // Switch to a triangle window halfway through
        if frame_time == total_frames / 2 / BLOCK_SIZE * BLOCK_SIZE {
            handle.set_window("triangle")?;
        }

        let inputs =
            BlockInputs::new(&trigger, &input).with_control(ControlChannel::Delay, &delay);
        let active_grains = cloud.process(&inputs, &mut left, &mut right);
        peak_grains = peak_grains.max(active_grains);

        stereo_to_interleaved(&left, &right, &mut interleaved);
        for sample in &interleaved {
            writer.write_sample(*sample)?;
        }
        frame_time += BLOCK_SIZE;
    }
    writer.finalize()?;

    log::info!(
        "Rendered {DURATION_SECS} seconds with up to {peak_grains} concurrent grains into '{output_path}'"
    );
    Ok(())
}
