//! Audio source loading and random access
//!
//! A source is a fully decoded, stereo, engine-rate PCM image of an audio
//! file. Decoding, channel folding, and sample-rate conversion all happen on
//! the control thread at load time; the render thread only ever does plain
//! memory reads through [`LoadedSource::read_block`].
//!
//! Sample data lives in a `basedrop::Shared` allocation so that replacing a
//! source on the render thread defers the (potentially very large)
//! deallocation to the collector thread.

mod decode;

use std::path::{Path, PathBuf};

use basedrop::Shared;
use thiserror::Error;

use crate::engine::gc::gc_handle;
use crate::types::{StereoBuffer, StereoSample};

/// Errors raised while opening or decoding an audio file
#[derive(Error, Debug)]
pub enum SourceError {
    /// File not found or couldn't be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Container/codec not recognized by the decoder
    #[error("unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// The container holds no decodable audio track
    #[error("no audio track found in file")]
    NoAudioTrack,

    /// The stream decoded to zero frames (corrupt or empty file)
    #[error("audio stream is empty or corrupt")]
    EmptyStream,

    /// Sample rate conversion failed
    #[error("resampling failed: {0}")]
    Resample(String),
}

/// A fully decoded audio source ready for playback
///
/// Cloning is cheap: the sample data is shared. At most one source feeds the
/// engine at a time; replacement goes through the transport, which swaps
/// sources only between render blocks.
#[derive(Clone)]
pub struct LoadedSource {
    /// Decoded stereo samples at the engine sample rate
    samples: Shared<StereoBuffer>,
    /// Engine sample rate the samples were converted to
    sample_rate: u32,
    /// Sample rate of the file before conversion
    source_sample_rate: u32,
    /// Channel count of the file before folding to stereo
    source_channels: u16,
    /// Path the source was loaded from
    path: PathBuf,
}

impl LoadedSource {
    /// Wrap an already decoded stereo buffer as a source
    ///
    /// Used for synthesized material; file loading goes through [`load`].
    pub fn from_buffer(samples: StereoBuffer, sample_rate: u32) -> Self {
        Self {
            samples: Shared::new(&gc_handle(), samples),
            sample_rate,
            source_sample_rate: sample_rate,
            source_channels: 2,
            path: PathBuf::new(),
        }
    }

    /// Engine sample rate of the decoded samples
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Sample rate of the file as stored on disk
    pub fn source_sample_rate(&self) -> u32 {
        self.source_sample_rate
    }

    /// Channel count of the file as stored on disk
    pub fn source_channels(&self) -> u16 {
        self.source_channels
    }

    /// Path the source was loaded from (empty for synthesized sources)
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total duration in frames
    pub fn duration_frames(&self) -> usize {
        self.samples.len()
    }

    /// Total duration in seconds
    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Fill `out` with frames starting at `from_frame`, zero-padding past the
    /// end of the stream. Returns true if the block touched or passed the end.
    ///
    /// Real-time safe: plain memory reads, no allocation.
    pub fn read_block(&self, from_frame: usize, out: &mut StereoBuffer) -> bool {
        let data = self.samples.as_slice();
        let len = data.len();
        let out_slice = out.as_mut_slice();

        for (i, slot) in out_slice.iter_mut().enumerate() {
            let idx = from_frame + i;
            *slot = if idx < len { data[idx] } else { StereoSample::silence() };
        }

        from_frame + out_slice.len() >= len
    }
}

impl std::fmt::Debug for LoadedSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedSource")
            .field("path", &self.path)
            .field("frames", &self.samples.len())
            .field("sample_rate", &self.sample_rate)
            .field("source_sample_rate", &self.source_sample_rate)
            .field("source_channels", &self.source_channels)
            .finish()
    }
}

/// Load an audio file and prepare it for playback at `target_sample_rate`
///
/// Decodes the full stream, folds any channel layout to stereo, and resamples
/// when the file rate differs from the engine rate. Blocking: call from the
/// control thread, never from the render callback.
pub fn load<P: AsRef<Path>>(path: P, target_sample_rate: u32) -> Result<LoadedSource, SourceError> {
    let path = path.as_ref();

    let decoded = decode::decode_to_stereo(path)?;
    let source_sample_rate = decoded.sample_rate;
    let source_channels = decoded.channels;

    if decoded.left.is_empty() {
        return Err(SourceError::EmptyStream);
    }

    let (left, right) = if source_sample_rate != target_sample_rate {
        log::info!(
            "resampling {:?} from {}Hz to {}Hz",
            path.file_name().unwrap_or_default(),
            source_sample_rate,
            target_sample_rate
        );
        decode::resample_stereo(&decoded.left, &decoded.right, source_sample_rate, target_sample_rate)?
    } else {
        (decoded.left, decoded.right)
    };

    let buffer = StereoBuffer::from_channels(&left, &right);

    log::info!(
        "loaded {:?}: {} frames ({:.2}s), {} channel(s) at {}Hz",
        path.file_name().unwrap_or_default(),
        buffer.len(),
        buffer.len() as f64 / target_sample_rate as f64,
        source_channels,
        source_sample_rate
    );

    Ok(LoadedSource {
        samples: Shared::new(&gc_handle(), buffer),
        sample_rate: target_sample_rate,
        source_sample_rate,
        source_channels,
        path: path.to_path_buf(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    fn write_sine_wav(
        path: &Path,
        freq: f32,
        seconds: f32,
        sample_rate: u32,
        channels: u16,
    ) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let frames = (seconds * sample_rate as f32) as usize;
        for i in 0..frames {
            let value = (TAU * freq * i as f32 / sample_rate as f32).sin();
            let sample = (value * 0.5 * i16::MAX as f32) as i16;
            for _ in 0..channels {
                writer.write_sample(sample).unwrap();
            }
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_load_stereo_wav_native_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_sine_wav(&path, 440.0, 1.0, 48000, 2);

        let source = load(&path, 48000).unwrap();
        assert_eq!(source.sample_rate(), 48000);
        assert_eq!(source.source_channels(), 2);
        assert_eq!(source.duration_frames(), 48000);
        assert!((source.duration_seconds() - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_load_mono_folds_to_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_sine_wav(&path, 220.0, 0.5, 48000, 1);

        let source = load(&path, 48000).unwrap();
        assert_eq!(source.source_channels(), 1);

        // Mono input duplicates into both channels
        let mut block = StereoBuffer::silence(256);
        source.read_block(1000, &mut block);
        for sample in block.iter() {
            assert_eq!(sample.left, sample.right);
        }
        assert!(block.peak() > 0.1);
    }

    #[test]
    fn test_load_resamples_to_engine_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cd_rate.wav");
        write_sine_wav(&path, 440.0, 1.0, 44100, 2);

        let source = load(&path, 48000).unwrap();
        assert_eq!(source.sample_rate(), 48000);
        assert_eq!(source.source_sample_rate(), 44100);
        // Duration preserved through resampling (sinc filter edges allowed)
        assert!((source.duration_seconds() - 1.0).abs() < 0.05);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load("/nonexistent/no_such.wav", 48000).unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }

    #[test]
    fn test_read_block_past_end_reports_eos() {
        let source = LoadedSource::from_buffer(StereoBuffer::silence(100), 48000);
        let mut block = StereoBuffer::silence(64);

        assert!(!source.read_block(0, &mut block));
        assert!(source.read_block(50, &mut block));
        assert!(source.read_block(200, &mut block));
    }
}
