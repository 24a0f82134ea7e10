//! Control-thread player facade
//!
//! The single entry point for the presentation layer. Wraps the audio system:
//! file loading happens here on the calling thread, transport and parameter
//! changes become commands on the lock-free queue, and playback state comes
//! back through the shared atomics and the scope tap.
//!
//! Everything is non-blocking with respect to the render thread; commands
//! take effect at the next block boundary, so a status read immediately after
//! a command may still show the previous state for up to one buffer period.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::audio::{start_audio_system, AudioConfig, AudioHandle, AudioResult, CommandSender};
use crate::engine::{EngineCommand, PanMode, ScopeBuffer, TransportAtomics, MAX_PITCH_CENTS, MAX_RATE, MIN_RATE};
use crate::source::{self, SourceError};
use crate::types::{PlaybackStatus, StereoSample};

/// Errors from [`Player::load_file`]
#[derive(Error, Debug)]
pub enum LoadError {
    /// Decoding or resampling failed
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The command queue is full (the audio stream has stalled)
    #[error("audio engine is not accepting commands")]
    CommandQueueFull,
}

/// Audio player: one track, variable rate and pitch, stereo balance
///
/// Construct with [`Player::start`], which opens the output device and starts
/// the render thread. Dropping the player stops audio.
pub struct Player {
    command_sender: CommandSender,
    atomics: Arc<TransportAtomics>,
    scope: Arc<ScopeBuffer>,
    handle: AudioHandle,
}

impl Player {
    /// Open the output device and start the audio system
    pub fn start(config: &AudioConfig) -> AudioResult<Self> {
        let system = start_audio_system(config)?;

        Ok(Self {
            command_sender: system.command_sender,
            atomics: system.transport_atomics,
            scope: system.scope,
            handle: system.handle,
        })
    }

    /// Engine sample rate
    pub fn sample_rate(&self) -> u32 {
        self.handle.sample_rate()
    }

    /// Negotiated device buffer size in frames
    pub fn buffer_size(&self) -> u32 {
        self.handle.buffer_size()
    }

    /// Output latency in milliseconds (for the status display)
    pub fn latency_ms(&self) -> f32 {
        self.handle.latency_ms()
    }

    /// Load an audio file, replacing the current track
    ///
    /// Decodes and resamples on the calling thread, which can take a moment
    /// for long files; audio keeps running meanwhile. On success the new track
    /// is loaded stopped at position zero. On failure the current track is
    /// untouched.
    pub fn load_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), LoadError> {
        let source = source::load(path, self.sample_rate())?;

        self.command_sender
            .send(EngineCommand::LoadTrack { source: Box::new(source) })
            .map_err(|_| LoadError::CommandQueueFull)
    }

    /// Drop the current track
    pub fn unload(&mut self) {
        let _ = self.command_sender.send(EngineCommand::UnloadTrack);
    }

    /// Start or resume playback
    pub fn play(&mut self) {
        let _ = self.command_sender.send(EngineCommand::Play);
    }

    /// Pause, keeping the playhead where it is
    pub fn pause(&mut self) {
        let _ = self.command_sender.send(EngineCommand::Pause);
    }

    /// Toggle between playing and paused
    pub fn toggle_play(&mut self) {
        let _ = self.command_sender.send(EngineCommand::TogglePlay);
    }

    /// Stop playback, keeping the playhead for a later resume
    pub fn stop(&mut self) {
        let _ = self
            .command_sender
            .send(EngineCommand::Stop { reset_position: false });
    }

    /// Stop playback and rewind to the start
    pub fn stop_and_rewind(&mut self) {
        let _ = self
            .command_sender
            .send(EngineCommand::Stop { reset_position: true });
    }

    /// Jump the playhead to an absolute position in seconds
    ///
    /// Negative values clamp to zero; positions past the end clamp to the end.
    pub fn seek(&mut self, seconds: f64) {
        let frame = (seconds.max(0.0) * self.sample_rate() as f64).round() as u64;
        let _ = self.command_sender.send(EngineCommand::Seek { frame });
    }

    /// Move the playhead by a signed delta in seconds
    pub fn seek_by(&mut self, delta_seconds: f64) {
        let delta_frames = (delta_seconds * self.sample_rate() as f64).round() as i64;
        let _ = self.command_sender.send(EngineCommand::SeekBy { delta_frames });
    }

    /// Set the playback rate (clamped to [MIN_RATE, MAX_RATE], 1.0 = normal)
    pub fn set_rate(&mut self, rate: f64) {
        let _ = self
            .command_sender
            .send(EngineCommand::SetRate(rate.clamp(MIN_RATE, MAX_RATE)));
    }

    /// Set the pitch shift in cents (clamped to one octave either way)
    pub fn set_pitch_cents(&mut self, cents: f64) {
        let _ = self.command_sender.send(EngineCommand::SetPitchCents(
            cents.clamp(-MAX_PITCH_CENTS, MAX_PITCH_CENTS),
        ));
    }

    /// Set the pitch shift in semitones
    pub fn set_pitch_semitones(&mut self, semitones: f64) {
        self.set_pitch_cents(semitones * 100.0);
    }

    /// Set the stereo balance mode
    pub fn set_pan(&mut self, mode: PanMode) {
        let _ = self.command_sender.send(EngineCommand::SetPan(mode));
    }

    /// Current transport state
    ///
    /// Lock-free atomic reads; safe to call at UI refresh rate.
    pub fn status(&self) -> PlaybackStatus {
        let rate = self.sample_rate() as f64;
        PlaybackStatus {
            position_seconds: self.atomics.position_frames() as f64 / rate,
            duration_seconds: self.atomics.duration_frames() as f64 / rate,
            state: self.atomics.state(),
        }
    }

    /// Copy the most recent output frames into `out`, oldest first
    ///
    /// Returns the number of frames written. Feed this to the waveform view.
    pub fn scope_snapshot_into(&self, out: &mut [StereoSample]) -> usize {
        self.scope.snapshot_into(out)
    }

    /// Allocate and return a snapshot of recent output frames
    pub fn scope_snapshot(&self) -> Vec<StereoSample> {
        self.scope.snapshot()
    }
}
