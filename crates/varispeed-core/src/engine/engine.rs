//! Player engine - the render-thread core
//!
//! Owns the transport, the time/pitch transform, the balance stage, and the
//! scope tap. The audio callback calls [`PlayerEngine::process_commands`] and
//! then [`PlayerEngine::process`] once per device block; nothing here takes a
//! lock or allocates after construction.

use rtrb::Consumer;

use super::balance::BalanceStage;
use super::command::EngineCommand;
use super::scope::ScopeBuffer;
use super::timepitch::TimePitch;
use super::transport::{Transport, TransportAtomics};
use crate::types::StereoBuffer;
use std::sync::Arc;

/// Maximum device block size the engine accepts (frames)
///
/// Tied to the largest buffer the backend will negotiate, so the callback's
/// clamp and the engine's pre-allocation can never disagree.
pub const MAX_BLOCK_SIZE: usize = crate::audio::config::MAX_BUFFER_SIZE;

/// Seconds of output history held by the scope tap
const SCOPE_SECONDS: usize = 2;

/// Render-thread playback engine
///
/// Signal chain per block: transport (source read) -> time/pitch -> balance,
/// then the result is both copied to the device buffer and appended to the
/// scope ring.
pub struct PlayerEngine {
    transport: Transport,
    timepitch: TimePitch,
    balance: BalanceStage,
    scope: Arc<ScopeBuffer>,
    /// Scratch buffer for variable-size stretcher input, pre-allocated for
    /// the largest block at the fastest rate
    stretch_input: StereoBuffer,
    sample_rate: u32,
}

impl PlayerEngine {
    pub fn new_with_sample_rate(sample_rate: u32) -> Self {
        let max_input = (MAX_BLOCK_SIZE as f64 * super::timepitch::MAX_RATE).ceil() as usize;
        let mut stretch_input = StereoBuffer::with_capacity(max_input);
        stretch_input.set_len_from_capacity(max_input);

        Self {
            transport: Transport::new(),
            timepitch: TimePitch::new_with_sample_rate(sample_rate),
            balance: BalanceStage::new_with_sample_rate(sample_rate),
            scope: Arc::new(ScopeBuffer::new(sample_rate as usize * SCOPE_SECONDS)),
            stretch_input,
            sample_rate,
        }
    }

    /// Engine sample rate
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Shared transport atomics for the control thread
    pub fn transport_atomics(&self) -> Arc<TransportAtomics> {
        self.transport.atomics()
    }

    /// Shared scope tap for the control thread
    pub fn scope(&self) -> Arc<ScopeBuffer> {
        Arc::clone(&self.scope)
    }

    /// Drain and apply all pending commands
    ///
    /// Called at the top of every block, so a command's effect is atomic with
    /// respect to rendering: no block mixes pre- and post-command state.
    pub fn process_commands(&mut self, commands: &mut Consumer<EngineCommand>) {
        while let Ok(command) = commands.pop() {
            match command {
                EngineCommand::LoadTrack { source } => {
                    self.transport.load_source(*source);
                    self.timepitch.reset();
                    self.scope.clear();
                }
                EngineCommand::UnloadTrack => {
                    self.transport.unload();
                    self.timepitch.reset();
                    self.scope.clear();
                }
                EngineCommand::Play => self.transport.play(),
                EngineCommand::Pause => self.transport.pause(),
                EngineCommand::TogglePlay => self.transport.toggle_play(),
                EngineCommand::Stop { reset_position } => {
                    self.transport.stop(reset_position);
                    self.timepitch.reset();
                    self.scope.clear();
                }
                EngineCommand::Seek { frame } => {
                    self.transport.seek(frame);
                    // Drop stretcher history so old audio doesn't smear
                    // across the splice
                    self.timepitch.reset();
                }
                EngineCommand::SeekBy { delta_frames } => {
                    self.transport.seek_by(delta_frames);
                    self.timepitch.reset();
                }
                EngineCommand::SetRate(rate) => self.timepitch.set_rate(rate),
                EngineCommand::SetPitchCents(cents) => self.timepitch.set_pitch_cents(cents),
                EngineCommand::SetPan(mode) => self.balance.set_mode(mode),
            }
        }
    }

    /// Render one block of output
    ///
    /// `out.len()` must not exceed [`MAX_BLOCK_SIZE`]. Real-time safe.
    pub fn process(&mut self, out: &mut StereoBuffer) {
        debug_assert!(out.len() <= MAX_BLOCK_SIZE);

        if self.transport.state() != crate::types::PlayState::Playing {
            // Silence to the device; the scope keeps its last contents so the
            // display freezes rather than blanking on pause
            out.fill_silence();
            return;
        }

        // Pull enough source frames that the stretcher emits exactly one
        // device block at the current rate
        let input_len = self.timepitch.input_frames_for(out.len());
        self.stretch_input.set_len_from_capacity(input_len);

        self.transport.read_block(&mut self.stretch_input);
        self.timepitch.process(&self.stretch_input, out);
        self.balance.process(out);

        // End of stream stops the transport inside read_block; treat it like
        // an explicit Stop so both paths reset the stretcher and the scope.
        // The final (zero-padded) block still goes to the device.
        if self.transport.state() != crate::types::PlayState::Playing {
            self.timepitch.reset();
            self.scope.clear();
            return;
        }

        self.scope.write(out.as_slice());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::balance::PanMode;
    use crate::engine::command::command_channel;
    use crate::source::LoadedSource;
    use crate::types::{PlayState, StereoSample};
    use std::f32::consts::TAU;

    const RATE: u32 = 48000;
    const BLOCK: usize = 512;

    fn sine_source(freq: f32, seconds: f32) -> LoadedSource {
        let frames = (seconds * RATE as f32) as usize;
        let mut buffer = StereoBuffer::silence(frames);
        for (i, sample) in buffer.iter_mut().enumerate() {
            let v = (TAU * freq * i as f32 / RATE as f32).sin() * 0.5;
            *sample = StereoSample::mono(v);
        }
        LoadedSource::from_buffer(buffer, RATE)
    }

    /// Drive the engine like the audio callback would
    fn run_blocks(
        engine: &mut PlayerEngine,
        commands: &mut rtrb::Consumer<EngineCommand>,
        blocks: usize,
    ) -> StereoBuffer {
        let mut out = StereoBuffer::silence(BLOCK);
        for _ in 0..blocks {
            engine.process_commands(commands);
            engine.process(&mut out);
        }
        out
    }

    #[test]
    fn test_stopped_engine_outputs_silence() {
        let mut engine = PlayerEngine::new_with_sample_rate(RATE);
        let (_tx, mut rx) = command_channel();

        let out = run_blocks(&mut engine, &mut rx, 4);
        assert_eq!(out.peak(), 0.0);
        assert!(engine.scope().snapshot().is_empty());
    }

    #[test]
    fn test_play_produces_audio_and_advances() {
        let mut engine = PlayerEngine::new_with_sample_rate(RATE);
        let (mut tx, mut rx) = command_channel();
        let atomics = engine.transport_atomics();

        tx.push(EngineCommand::LoadTrack { source: Box::new(sine_source(440.0, 2.0)) })
            .unwrap();
        tx.push(EngineCommand::Play).unwrap();

        let out = run_blocks(&mut engine, &mut rx, 8);
        assert!(out.peak() > 0.1);
        assert_eq!(atomics.state(), PlayState::Playing);
        assert_eq!(atomics.position_frames(), 8 * BLOCK as u64);
    }

    #[test]
    fn test_seek_while_playing_lands_at_target() {
        let mut engine = PlayerEngine::new_with_sample_rate(RATE);
        let (mut tx, mut rx) = command_channel();
        let atomics = engine.transport_atomics();

        tx.push(EngineCommand::LoadTrack { source: Box::new(sine_source(440.0, 5.0)) })
            .unwrap();
        tx.push(EngineCommand::Play).unwrap();
        run_blocks(&mut engine, &mut rx, 4);

        let target = 2 * RATE as u64;
        tx.push(EngineCommand::Seek { frame: target }).unwrap();
        run_blocks(&mut engine, &mut rx, 1);

        // One block was rendered from the seek target
        let pos = atomics.position_frames();
        assert!(pos >= target && pos <= target + BLOCK as u64);
        assert_eq!(atomics.state(), PlayState::Playing);
    }

    #[test]
    fn test_relative_seek_clamps_at_start() {
        let mut engine = PlayerEngine::new_with_sample_rate(RATE);
        let (mut tx, mut rx) = command_channel();
        let atomics = engine.transport_atomics();

        tx.push(EngineCommand::LoadTrack { source: Box::new(sine_source(440.0, 1.0)) })
            .unwrap();
        tx.push(EngineCommand::SeekBy { delta_frames: -100_000 }).unwrap();
        run_blocks(&mut engine, &mut rx, 1);

        assert_eq!(atomics.position_frames(), 0);
    }

    #[test]
    fn test_double_rate_advances_twice_as_fast() {
        let mut engine = PlayerEngine::new_with_sample_rate(RATE);
        let (mut tx, mut rx) = command_channel();
        let atomics = engine.transport_atomics();

        tx.push(EngineCommand::LoadTrack { source: Box::new(sine_source(440.0, 5.0)) })
            .unwrap();
        tx.push(EngineCommand::SetRate(2.0)).unwrap();
        tx.push(EngineCommand::Play).unwrap();

        run_blocks(&mut engine, &mut rx, 8);
        assert_eq!(atomics.position_frames(), 8 * 2 * BLOCK as u64);
    }

    #[test]
    fn test_pan_left_silences_right_output() {
        let mut engine = PlayerEngine::new_with_sample_rate(RATE);
        let (mut tx, mut rx) = command_channel();

        tx.push(EngineCommand::LoadTrack { source: Box::new(sine_source(440.0, 2.0)) })
            .unwrap();
        tx.push(EngineCommand::SetPan(PanMode::Left)).unwrap();
        tx.push(EngineCommand::Play).unwrap();

        // Skip past the gain ramp and the stretcher warm-up
        run_blocks(&mut engine, &mut rx, 8);
        let out = run_blocks(&mut engine, &mut rx, 1);

        let right_peak = out.iter().map(|s| s.right.abs()).fold(0.0, f32::max);
        let left_peak = out.iter().map(|s| s.left.abs()).fold(0.0, f32::max);
        assert!(left_peak > 0.1);
        assert!(right_peak < 1e-6);
    }

    #[test]
    fn test_scope_captures_output() {
        let mut engine = PlayerEngine::new_with_sample_rate(RATE);
        let (mut tx, mut rx) = command_channel();

        tx.push(EngineCommand::LoadTrack { source: Box::new(sine_source(440.0, 2.0)) })
            .unwrap();
        tx.push(EngineCommand::Play).unwrap();
        let out = run_blocks(&mut engine, &mut rx, 8);

        let snap = engine.scope().snapshot();
        assert_eq!(snap.len(), 8 * BLOCK);
        // The newest scope frames are exactly the last rendered block
        let tail = &snap[snap.len() - BLOCK..];
        assert_eq!(tail, out.as_slice());
    }

    #[test]
    fn test_stop_clears_scope() {
        let mut engine = PlayerEngine::new_with_sample_rate(RATE);
        let (mut tx, mut rx) = command_channel();

        tx.push(EngineCommand::LoadTrack { source: Box::new(sine_source(440.0, 2.0)) })
            .unwrap();
        tx.push(EngineCommand::Play).unwrap();
        run_blocks(&mut engine, &mut rx, 4);

        tx.push(EngineCommand::Stop { reset_position: false }).unwrap();
        run_blocks(&mut engine, &mut rx, 1);

        assert!(engine.scope().snapshot().is_empty());
    }

    #[test]
    fn test_playback_stops_at_end_of_source() {
        let mut engine = PlayerEngine::new_with_sample_rate(RATE);
        let (mut tx, mut rx) = command_channel();
        let atomics = engine.transport_atomics();

        // Quarter second of audio, then the engine must stop on its own
        tx.push(EngineCommand::LoadTrack { source: Box::new(sine_source(440.0, 0.25)) })
            .unwrap();
        tx.push(EngineCommand::Play).unwrap();

        let blocks = (RATE as usize / 2) / BLOCK;
        run_blocks(&mut engine, &mut rx, blocks);

        assert_eq!(atomics.state(), PlayState::Stopped);
        assert_eq!(atomics.position_frames(), RATE as u64 / 4);

        // Auto-stop behaves like an explicit Stop: scope history is cleared
        assert!(engine.scope().snapshot().is_empty());
    }

    #[test]
    fn test_full_size_block_at_max_rate() {
        let mut engine = PlayerEngine::new_with_sample_rate(RATE);
        let (mut tx, mut rx) = command_channel();

        tx.push(EngineCommand::LoadTrack { source: Box::new(sine_source(440.0, 5.0)) })
            .unwrap();
        tx.push(EngineCommand::SetRate(crate::engine::timepitch::MAX_RATE)).unwrap();
        tx.push(EngineCommand::Play).unwrap();
        engine.process_commands(&mut rx);

        // The largest block the backend can negotiate, at the fastest rate,
        // must fit the pre-allocated stretch input
        let mut out = StereoBuffer::silence(MAX_BLOCK_SIZE);
        engine.process(&mut out);
        engine.process(&mut out);

        // Past the stretcher warm-up, audio flows
        assert!(out.peak() > 0.1);
    }

    #[test]
    fn test_pitch_shift_preserves_rate() {
        let mut engine = PlayerEngine::new_with_sample_rate(RATE);
        let (mut tx, mut rx) = command_channel();
        let atomics = engine.transport_atomics();

        tx.push(EngineCommand::LoadTrack { source: Box::new(sine_source(440.0, 2.0)) })
            .unwrap();
        tx.push(EngineCommand::SetPitchCents(700.0)).unwrap();
        tx.push(EngineCommand::Play).unwrap();

        // Pitch shift alone leaves the playhead advancing at unity rate
        run_blocks(&mut engine, &mut rx, 8);
        assert_eq!(atomics.position_frames(), 8 * BLOCK as u64);
    }

    #[test]
    fn test_rate_change_preserves_pitch() {
        let mut engine = PlayerEngine::new_with_sample_rate(RATE);
        let (mut tx, mut rx) = command_channel();

        let freq = 440.0;
        tx.push(EngineCommand::LoadTrack { source: Box::new(sine_source(freq, 5.0)) })
            .unwrap();
        tx.push(EngineCommand::SetRate(1.25)).unwrap();
        tx.push(EngineCommand::Play).unwrap();

        // Let the stretcher settle, then measure the output frequency by
        // counting zero crossings over a second of scope content
        run_blocks(&mut engine, &mut rx, 120);
        let snap = engine.scope().snapshot();
        let window: Vec<f32> = snap[snap.len() - RATE as usize..]
            .iter()
            .map(|s| s.left)
            .collect();

        let mut crossings = 0;
        for pair in window.windows(2) {
            if pair[0] <= 0.0 && pair[1] > 0.0 {
                crossings += 1;
            }
        }

        // One positive-going crossing per cycle; pitch stays near 440Hz even
        // though the material plays 25% faster
        let measured = crossings as f32;
        assert!(
            (measured - freq).abs() < freq * 0.1,
            "expected ~{freq}Hz, measured {measured}Hz"
        );
    }

    #[test]
    fn test_unload_returns_to_empty_state() {
        let mut engine = PlayerEngine::new_with_sample_rate(RATE);
        let (mut tx, mut rx) = command_channel();
        let atomics = engine.transport_atomics();

        tx.push(EngineCommand::LoadTrack { source: Box::new(sine_source(440.0, 1.0)) })
            .unwrap();
        tx.push(EngineCommand::Play).unwrap();
        run_blocks(&mut engine, &mut rx, 2);

        tx.push(EngineCommand::UnloadTrack).unwrap();
        let out = run_blocks(&mut engine, &mut rx, 1);

        assert_eq!(atomics.state(), PlayState::Stopped);
        assert_eq!(atomics.duration_frames(), 0);
        assert_eq!(out.peak(), 0.0);
    }
}
