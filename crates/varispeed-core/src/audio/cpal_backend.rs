//! CPAL audio backend
//!
//! Builds the single stereo output stream and moves the
//! [`PlayerEngine`](crate::engine::PlayerEngine) into its callback. The
//! callback is the render thread: it drains the command queue, renders one
//! block, and copies it into the device buffer.
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │  Control thread  │───push()───────────►│   Command Queue     │
//! │   (UI / facade)  │                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!         │                                           │
//!         │ Relaxed atomics / scope ring              │ pop()
//!         ▼                                           ▼
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │ TransportAtomics │◄────────────────────│  CPAL audio thread  │
//! │   ScopeBuffer    │     sync writes     │ (owns PlayerEngine) │
//! └──────────────────┘                     └─────────────────────┘
//! ```

use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::config::{AudioConfig, BufferSize, DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE};
use super::device::{find_device_by_id, get_cpal_default_device};
use super::error::{AudioError, AudioResult};
use crate::engine::{
    command_channel, EngineCommand, PlayerEngine, ScopeBuffer, TransportAtomics,
};
use crate::types::StereoBuffer;

/// Handle keeping the audio stream alive
///
/// Drop this to stop audio.
pub struct AudioHandle {
    _stream: Stream,
    sample_rate: u32,
    /// Actual buffer size in frames (as negotiated with the device)
    buffer_size: u32,
}

impl AudioHandle {
    /// Sample rate of the audio system
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Actual buffer size in frames
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Output latency in milliseconds (one-way, device buffer only)
    pub fn latency_ms(&self) -> f32 {
        (self.buffer_size as f32 / self.sample_rate as f32) * 1000.0
    }
}

/// Control-thread end of the command queue
pub struct CommandSender {
    producer: rtrb::Producer<EngineCommand>,
}

impl CommandSender {
    /// Send a command to the render thread
    ///
    /// Returns the command back on failure (queue full, which only happens if
    /// the audio stream has stalled).
    pub fn send(&mut self, command: EngineCommand) -> Result<(), EngineCommand> {
        self.producer.push(command).map_err(|e| match e {
            rtrb::PushError::Full(c) => c,
        })
    }
}

/// Everything the control thread needs after the audio system starts
pub struct AudioSystemResult {
    /// Keeps the stream alive
    pub handle: AudioHandle,
    /// Command queue into the render thread
    pub command_sender: CommandSender,
    /// Lock-free transport state for polling
    pub transport_atomics: Arc<TransportAtomics>,
    /// Output tap for the waveform display
    pub scope: Arc<ScopeBuffer>,
    /// Negotiated sample rate
    pub sample_rate: u32,
    /// Negotiated buffer size in frames
    pub buffer_size: u32,
    /// Output latency in milliseconds
    pub latency_ms: f32,
}

/// Start the audio system with the given configuration
///
/// Opens the configured (or default) output device, builds the stream, and
/// starts it. The returned engine handles are the only way to talk to the
/// running stream.
pub fn start_audio_system(config: &AudioConfig) -> AudioResult<AudioSystemResult> {
    let device = match &config.device {
        Some(id) => find_device_by_id(id)?,
        None => get_cpal_default_device()?,
    };

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let (supported_config, buffer_size) = get_output_config(&device, config)?;
    let sample_rate = supported_config.sample_rate().0;

    let stream_config = StreamConfig {
        channels: supported_config.channels(),
        sample_rate: supported_config.sample_rate(),
        buffer_size: CpalBufferSize::Fixed(buffer_size),
    };

    let latency_ms = (buffer_size as f32 / sample_rate as f32) * 1000.0;

    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        latency_ms
    );

    let engine = PlayerEngine::new_with_sample_rate(sample_rate);
    let transport_atomics = engine.transport_atomics();
    let scope = engine.scope();

    let (command_tx, command_rx) = command_channel();

    let stream = build_output_stream(&device, &stream_config, engine, command_rx)?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");

    Ok(AudioSystemResult {
        handle: AudioHandle {
            _stream: stream,
            sample_rate,
            buffer_size,
        },
        command_sender: CommandSender { producer: command_tx },
        transport_atomics,
        scope,
        sample_rate,
        buffer_size,
        latency_ms,
    })
}

/// Get the best output configuration for a device
///
/// Returns (SupportedStreamConfig, actual_buffer_size_in_frames)
fn get_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<(cpal::SupportedStreamConfig, u32)> {
    let supported_configs: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    if supported_configs.is_empty() {
        return Err(AudioError::ConfigError(
            "No supported output configurations".to_string(),
        ));
    }

    let target_sample_rate = config
        .sample_rate
        .unwrap_or(super::config::DEFAULT_SAMPLE_RATE);

    // Prefer f32, stereo, and the requested sample rate
    let best_config = supported_configs
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(|c| c.channels() >= 2)
        .filter(|c| {
            target_sample_rate >= c.min_sample_rate().0
                && target_sample_rate <= c.max_sample_rate().0
        })
        .next()
        .or_else(|| supported_configs.iter().find(|c| c.channels() >= 2))
        .or_else(|| supported_configs.first())
        .ok_or_else(|| {
            AudioError::ConfigError("No suitable output configuration found".to_string())
        })?;

    let sample_rate = if target_sample_rate >= best_config.min_sample_rate().0
        && target_sample_rate <= best_config.max_sample_rate().0
    {
        cpal::SampleRate(target_sample_rate)
    } else {
        let fallback = best_config.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz (sources will be resampled)",
            target_sample_rate,
            fallback.0
        );
        fallback
    };

    let stream_config = best_config.clone().with_sample_rate(sample_rate);

    let buffer_size = match config.buffer_size {
        BufferSize::Default => DEFAULT_BUFFER_SIZE,
        BufferSize::Fixed(frames) => frames.clamp(64, MAX_BUFFER_SIZE as u32),
        // Known-good small buffer; full latency probing isn't worth the
        // platform-specific complexity for a player
        BufferSize::LowLatency => 256,
    };

    log::debug!(
        "Selected buffer size: {} frames for {:?} mode",
        buffer_size,
        config.buffer_size
    );

    Ok((stream_config, buffer_size))
}

/// Build the output stream, moving the engine into the callback
fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut engine: PlayerEngine,
    mut command_rx: rtrb::Consumer<EngineCommand>,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;
    let mut render_buffer = StereoBuffer::silence(MAX_BUFFER_SIZE);

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                let n_frames = (data.len() / channels).min(MAX_BUFFER_SIZE);

                render_buffer.set_len_from_capacity(n_frames);
                engine.process_commands(&mut command_rx);
                engine.process(&mut render_buffer);

                let samples = render_buffer.as_slice();
                for (i, frame) in data.chunks_mut(channels).enumerate() {
                    if i < samples.len() {
                        let sample = samples[i];
                        frame[0] = sample.left;
                        if channels > 1 {
                            frame[1] = sample.right;
                        }
                        // Fill additional channels with silence
                        for ch in frame.iter_mut().skip(2) {
                            *ch = 0.0;
                        }
                    } else {
                        for ch in frame.iter_mut() {
                            *ch = 0.0;
                        }
                    }
                }
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None, // No timeout (blocking)
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    Ok(stream)
}
