//! Transport state machine
//!
//! The transport owns the loaded source and the playhead. It runs entirely on
//! the render thread; the control thread observes it through
//! [`TransportAtomics`], a set of lock-free atomics updated after every state
//! change and every rendered block.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::source::LoadedSource;
use crate::types::{PlayState, StereoBuffer};

/// Lock-free view of the transport for the control thread
///
/// All fields use relaxed ordering: each value is independently meaningful
/// and the UI only needs freshness, not cross-field consistency.
#[derive(Debug, Default)]
pub struct TransportAtomics {
    /// Playhead position in frames
    position_frames: AtomicU64,
    /// Duration of the loaded source in frames (0 when nothing is loaded)
    duration_frames: AtomicU64,
    /// PlayState encoded as u8: 0 stopped, 1 playing, 2 paused
    state: AtomicU8,
}

impl TransportAtomics {
    /// Current playhead position in frames
    pub fn position_frames(&self) -> u64 {
        self.position_frames.load(Ordering::Relaxed)
    }

    /// Duration of the loaded source in frames
    pub fn duration_frames(&self) -> u64 {
        self.duration_frames.load(Ordering::Relaxed)
    }

    /// Current transport state
    pub fn state(&self) -> PlayState {
        match self.state.load(Ordering::Relaxed) {
            1 => PlayState::Playing,
            2 => PlayState::Paused,
            _ => PlayState::Stopped,
        }
    }

    fn set_position(&self, frames: u64) {
        self.position_frames.store(frames, Ordering::Relaxed);
    }

    fn set_duration(&self, frames: u64) {
        self.duration_frames.store(frames, Ordering::Relaxed);
    }

    fn set_state(&self, state: PlayState) {
        let encoded = match state {
            PlayState::Stopped => 0,
            PlayState::Playing => 1,
            PlayState::Paused => 2,
        };
        self.state.store(encoded, Ordering::Relaxed);
    }
}

/// Playback transport: loaded source, playhead, and play state
///
/// Owned exclusively by the render thread. Every mutation immediately
/// publishes the new state through the shared atomics, so a command followed
/// by a status read (in render-thread order) observes the command's effect.
pub struct Transport {
    source: Option<LoadedSource>,
    /// Playhead in frames into the source
    position: usize,
    state: PlayState,
    atomics: Arc<TransportAtomics>,
}

impl Transport {
    pub fn new() -> Self {
        Self {
            source: None,
            position: 0,
            state: PlayState::Stopped,
            atomics: Arc::new(TransportAtomics::default()),
        }
    }

    /// Shared atomics for the control thread
    pub fn atomics(&self) -> Arc<TransportAtomics> {
        Arc::clone(&self.atomics)
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    pub fn duration_frames(&self) -> usize {
        self.source.as_ref().map_or(0, |s| s.duration_frames())
    }

    /// Replace the current source
    ///
    /// Stops playback and rewinds. The previous source's sample buffer is
    /// released through the GC thread when its last reference drops.
    pub fn load_source(&mut self, source: LoadedSource) {
        let duration = source.duration_frames() as u64;
        self.source = Some(source);
        self.position = 0;
        self.state = PlayState::Stopped;

        self.atomics.set_duration(duration);
        self.atomics.set_position(0);
        self.atomics.set_state(PlayState::Stopped);
    }

    /// Drop the current source and return to the empty state
    pub fn unload(&mut self) {
        self.source = None;
        self.position = 0;
        self.state = PlayState::Stopped;

        self.atomics.set_duration(0);
        self.atomics.set_position(0);
        self.atomics.set_state(PlayState::Stopped);
    }

    /// Start or resume playback; no-op when nothing is loaded
    pub fn play(&mut self) {
        if self.source.is_none() {
            return;
        }
        self.state = PlayState::Playing;
        self.atomics.set_state(self.state);
    }

    /// Pause, keeping the playhead where it is; no-op unless playing
    pub fn pause(&mut self) {
        if self.state == PlayState::Playing {
            self.state = PlayState::Paused;
            self.atomics.set_state(self.state);
        }
    }

    /// Toggle between playing and paused
    pub fn toggle_play(&mut self) {
        match self.state {
            PlayState::Playing => self.pause(),
            PlayState::Paused | PlayState::Stopped => self.play(),
        }
    }

    /// Stop playback, optionally rewinding the playhead to zero
    pub fn stop(&mut self, reset_position: bool) {
        self.state = PlayState::Stopped;
        if reset_position {
            self.position = 0;
            self.atomics.set_position(0);
        }
        self.atomics.set_state(self.state);
    }

    /// Jump the playhead to an absolute frame, clamped to the source length
    pub fn seek(&mut self, frame: u64) {
        let duration = self.duration_frames();
        self.position = (frame as usize).min(duration);
        self.atomics.set_position(self.position as u64);
    }

    /// Move the playhead by a signed delta, clamped to [0, duration]
    pub fn seek_by(&mut self, delta_frames: i64) {
        let target = self.position as i64 + delta_frames;
        self.seek(target.max(0) as u64);
    }

    /// Read the next block of source audio into `out` and advance the playhead
    ///
    /// When not playing, fills silence and leaves the playhead alone. Reaching
    /// the end of the source stops the transport with the playhead clamped to
    /// the final frame, so a subsequent play() replays nothing until a seek.
    /// The engine treats this auto-stop exactly like an explicit stop and
    /// clears the stretcher and scope history after the final block.
    pub fn read_block(&mut self, out: &mut StereoBuffer) {
        if self.state != PlayState::Playing {
            out.fill_silence();
            return;
        }

        let Some(source) = &self.source else {
            out.fill_silence();
            return;
        };

        let hit_end = source.read_block(self.position, out);
        self.position += out.len();

        if hit_end {
            self.position = source.duration_frames();
            self.state = PlayState::Stopped;
            self.atomics.set_state(self.state);
        }

        self.atomics.set_position(self.position as u64);
    }
}

impl Default for Transport {
    fn default() -> Self {
        Self::new()
    }
}
