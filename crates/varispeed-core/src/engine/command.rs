//! Control-to-render command channel
//!
//! Commands are produced by the control thread (the [`crate::player::Player`]
//! facade) and consumed by the render thread at block boundaries. The channel
//! is a bounded lock-free SPSC ring buffer, so sending never blocks and the
//! render thread never takes a lock.
//!
//! Heap-carrying payloads (the decoded source) are boxed so every variant
//! stays pointer-sized and moves through the ring cheaply. The box itself is
//! allocated on the control thread and, once swapped into the transport,
//! freed through the GC thread rather than in the callback.

use rtrb::{Consumer, Producer, RingBuffer};

use super::balance::PanMode;
use crate::source::LoadedSource;

/// Capacity of the command queue
///
/// Commands are drained once per render block, so even a burst of UI activity
/// (scrub gestures, rapid rate changes) fits comfortably.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Commands sent from the control thread to the render thread
#[derive(Debug)]
pub enum EngineCommand {
    /// Replace the current source with a newly loaded one
    LoadTrack { source: Box<LoadedSource> },
    /// Drop the current source and return to the empty stopped state
    UnloadTrack,
    /// Start or resume playback from the current position
    Play,
    /// Pause, keeping the playhead where it is
    Pause,
    /// Toggle between playing and paused/stopped
    TogglePlay,
    /// Stop playback; optionally rewind the playhead to zero
    Stop { reset_position: bool },
    /// Jump the playhead to an absolute frame
    Seek { frame: u64 },
    /// Move the playhead by a signed frame delta
    SeekBy { delta_frames: i64 },
    /// Set the playback rate (1.0 = normal speed)
    SetRate(f64),
    /// Set the pitch shift in cents (100 cents = one semitone)
    SetPitchCents(f64),
    /// Set the stereo balance mode
    SetPan(PanMode),
}

/// Create a connected command producer/consumer pair
pub fn command_channel() -> (Producer<EngineCommand>, Consumer<EngineCommand>) {
    RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}
