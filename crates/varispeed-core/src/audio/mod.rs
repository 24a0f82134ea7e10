//! Audio output backend
//!
//! Device enumeration, stream configuration, and the cpal output stream that
//! drives the [`crate::engine::PlayerEngine`]. The stream callback owns the
//! engine; everything else talks to it through the command channel and the
//! shared atomics returned by [`start_audio_system`].

pub mod config;
pub mod cpal_backend;
pub mod device;
pub mod error;

pub use config::{AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, DEFAULT_SAMPLE_RATE, MAX_BUFFER_SIZE};
pub use cpal_backend::{start_audio_system, AudioHandle, AudioSystemResult, CommandSender};
pub use device::{get_default_device, get_output_devices, AudioDevice};
pub use error::{AudioError, AudioResult};
