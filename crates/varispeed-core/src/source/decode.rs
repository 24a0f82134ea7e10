//! Symphonia decoding and rubato sample-rate conversion
//!
//! Both run on the control thread during load; nothing here is called from
//! the render callback.

use std::fs::File;
use std::path::Path;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::SourceError;
use crate::types::Sample;

/// Decoded stereo stream at the file's native sample rate
pub(crate) struct DecodedStereo {
    pub left: Vec<Sample>,
    pub right: Vec<Sample>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Decode an audio file to stereo f32 using Symphonia
///
/// Any channel layout is folded to stereo: mono is duplicated, layouts with
/// more than two channels keep the first pair.
pub(crate) fn decode_to_stereo(path: &Path) -> Result<DecodedStereo, SourceError> {
    let file = File::open(path).map_err(|e| SourceError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Give the probe the file extension as a hint
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| SourceError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(SourceError::NoAudioTrack)?;

    let track_id = track.id;

    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| SourceError::UnsupportedFormat("unknown sample rate".to_string()))?;

    let channels = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(2);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| SourceError::UnsupportedFormat(e.to_string()))?;

    let mut left: Vec<Sample> = Vec::new();
    let mut right: Vec<Sample> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                log::warn!("error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(e) => {
                // A bad packet is skipped; the stream may still be playable
                log::warn!("error decoding packet: {}", e);
                continue;
            }
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            let duration = decoded.capacity() as u64;
            sample_buf = Some(SampleBuffer::new(duration, spec));
        }

        if let Some(ref mut buf) = sample_buf {
            buf.copy_interleaved_ref(decoded);
            fold_interleaved(buf.samples(), channels as usize, &mut left, &mut right);
        }
    }

    Ok(DecodedStereo {
        left,
        right,
        sample_rate,
        channels,
    })
}

/// Fold interleaved frames of any channel count into stereo channel vectors
fn fold_interleaved(
    interleaved: &[Sample],
    channels: usize,
    left: &mut Vec<Sample>,
    right: &mut Vec<Sample>,
) {
    match channels {
        0 => {}
        1 => {
            for &s in interleaved {
                left.push(s);
                right.push(s);
            }
        }
        _ => {
            for frame in interleaved.chunks_exact(channels) {
                left.push(frame[0]);
                right.push(frame[1]);
            }
        }
    }
}

/// Resampler chunk size in input frames
const RESAMPLE_CHUNK: usize = 1024;

/// Convert a stereo stream from one sample rate to another
///
/// Offline sinc resampling; quality over speed, since this runs once per load.
pub(crate) fn resample_stereo(
    left: &[Sample],
    right: &[Sample],
    from_rate: u32,
    to_rate: u32,
) -> Result<(Vec<Sample>, Vec<Sample>), SourceError> {
    let ratio = to_rate as f64 / from_rate as f64;

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let mut resampler = SincFixedIn::<Sample>::new(ratio, 2.0, params, RESAMPLE_CHUNK, 2)
        .map_err(|e| SourceError::Resample(e.to_string()))?;

    let expected = (left.len() as f64 * ratio) as usize + RESAMPLE_CHUNK;
    let mut out_left: Vec<Sample> = Vec::with_capacity(expected);
    let mut out_right: Vec<Sample> = Vec::with_capacity(expected);

    let mut pos = 0;
    while pos < left.len() {
        let need = resampler.input_frames_next();
        let produced = if left.len() - pos >= need {
            let chunk = [&left[pos..pos + need], &right[pos..pos + need]];
            pos += need;
            resampler
                .process(&chunk, None)
                .map_err(|e| SourceError::Resample(e.to_string()))?
        } else {
            // Final short chunk
            let chunk = [&left[pos..], &right[pos..]];
            pos = left.len();
            resampler
                .process_partial(Some(&chunk), None)
                .map_err(|e| SourceError::Resample(e.to_string()))?
        };
        out_left.extend_from_slice(&produced[0]);
        out_right.extend_from_slice(&produced[1]);
    }

    // Flush the sinc filter delay line
    let tail = resampler
        .process_partial(None::<&[&[Sample]]>, None)
        .map_err(|e| SourceError::Resample(e.to_string()))?;
    out_left.extend_from_slice(&tail[0]);
    out_right.extend_from_slice(&tail[1]);

    Ok((out_left, out_right))
}
