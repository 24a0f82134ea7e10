//! Time/pitch transform via signalsmith-stretch
//!
//! Wraps the signalsmith-stretch library to give the player independent
//! playback rate and pitch shift. Rate is realized by block sizing: the engine
//! feeds `round(output_len * rate)` input frames for every fixed output block,
//! and the stretcher absorbs the difference without changing pitch. Pitch
//! shift is applied on top as a transpose inside the stretcher.

use signalsmith_stretch::Stretch;

use crate::types::StereoBuffer;

/// Number of channels (stereo)
const CHANNELS: u32 = 2;

/// Slowest supported playback rate
pub const MIN_RATE: f64 = 0.25;
/// Fastest supported playback rate
pub const MAX_RATE: f64 = 4.0;
/// Pitch shift range in cents (one octave either way)
pub const MAX_PITCH_CENTS: f64 = 1200.0;

/// Independent playback-rate and pitch-shift stage
///
/// Sits between the transport and the balance stage on the render thread.
/// Input and output cross the stretcher as interleaved f32 via zero-copy
/// reinterpretation of the stereo buffers.
pub struct TimePitch {
    stretcher: Stretch,
    /// Playback rate (1.0 = normal speed)
    rate: f64,
    /// Pitch shift in cents (positive = up)
    pitch_cents: f64,
}

impl TimePitch {
    /// Create a new transform at the given engine sample rate
    pub fn new_with_sample_rate(sample_rate: u32) -> Self {
        Self {
            stretcher: Stretch::preset_default(CHANNELS, sample_rate),
            rate: 1.0,
            pitch_cents: 0.0,
        }
    }

    /// Set the playback rate, clamped to [MIN_RATE, MAX_RATE]
    ///
    /// Takes effect at the next block; no stretcher reset needed, the input
    /// sizing simply changes.
    pub fn set_rate(&mut self, rate: f64) {
        self.rate = rate.clamp(MIN_RATE, MAX_RATE);
    }

    /// Current playback rate
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Input frames the transport must supply for `output_len` output frames
    pub fn input_frames_for(&self, output_len: usize) -> usize {
        ((output_len as f64 * self.rate).round() as usize).max(1)
    }

    /// Set the pitch shift in cents, clamped to +/- MAX_PITCH_CENTS
    pub fn set_pitch_cents(&mut self, cents: f64) {
        self.pitch_cents = cents.clamp(-MAX_PITCH_CENTS, MAX_PITCH_CENTS);
        // None for tonality_limit: no formant preservation cap
        self.stretcher
            .set_transpose_factor_semitones((self.pitch_cents / 100.0) as f32, None);
    }

    /// Current pitch shift in cents
    pub fn pitch_cents(&self) -> f64 {
        self.pitch_cents
    }

    /// Input latency of the stretcher in frames
    pub fn input_latency(&self) -> usize {
        self.stretcher.input_latency()
    }

    /// Output latency of the stretcher in frames
    pub fn output_latency(&self) -> usize {
        self.stretcher.output_latency()
    }

    /// Clear stretcher history
    ///
    /// Called on load and on seek so stale audio from before the splice point
    /// doesn't smear into the new position.
    pub fn reset(&mut self) {
        self.stretcher.reset();
    }

    /// Stretch `input` into `output`
    ///
    /// The effective rate for this block is input.len() / output.len(); the
    /// caller sizes the input with [`TimePitch::input_frames_for`].
    pub fn process(&mut self, input: &StereoBuffer, output: &mut StereoBuffer) {
        if input.is_empty() {
            output.fill_silence();
            return;
        }

        let input_len = input.len();
        let output_len = output.len();

        let input_interleaved = input.as_interleaved();
        let output_interleaved = output.as_interleaved_mut();

        // Clear the region the stretcher writes into
        output_interleaved[..output_len * 2].fill(0.0);

        self.stretcher.process(
            &input_interleaved[..input_len * 2],
            &mut output_interleaved[..output_len * 2],
        );
    }

    /// Drain remaining audio held in the stretcher's window overlap
    pub fn flush(&mut self, output: &mut StereoBuffer) {
        let output_len = output.len();
        let output_interleaved = output.as_interleaved_mut();

        output_interleaved[..output_len * 2].fill(0.0);
        self.stretcher.flush(&mut output_interleaved[..output_len * 2]);
    }
}
