//! Playback engine - transport, time/pitch transform, balance, scope tap
//!
//! This module contains the render-context core of the player:
//! - Transport: play/pause/stop/seek state machine over the loaded source
//! - TimePitch: independent playback-rate and pitch-shift transform
//! - BalanceStage: left/right channel gains with click-free ramping
//! - ScopeBuffer: lock-free output tap for the waveform display
//! - PlayerEngine: ties the chain together, driven by the audio callback

mod balance;
mod command;
mod engine;
mod scope;
mod timepitch;
mod transport;

pub mod gc;

pub use balance::*;
pub use command::*;
pub use engine::*;
pub use scope::*;
pub use timepitch::*;
pub use transport::*;
