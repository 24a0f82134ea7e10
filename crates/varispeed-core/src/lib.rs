//! Varispeed core - real-time playback engine for the Varispeed desktop player
//!
//! The core is split along the two execution contexts of the application:
//!
//! - The **control context** (GUI thread) loads files, sends commands over a
//!   lock-free queue, and polls playback state via atomics.
//! - The **render context** (audio device callback) owns the [`engine::PlayerEngine`]
//!   exclusively and pulls audio blocks through
//!   source → time/pitch → balance → device output + scope tap.

pub mod audio;
pub mod engine;
pub mod player;
pub mod source;
pub mod types;

pub use types::*;
