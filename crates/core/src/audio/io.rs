//! Audio I/O: WAV read/write, compressed-format decoding, resampling.

use std::collections::TryReserveError;
use std::path::Path;

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};

use crate::error::AssetError;

/// Read a WAV file and return (samples_f64_normalized, sample_rate).
///
/// - Normalizes int16/int32 to f64 in [-1, 1]
/// - Passes through float WAVs as f64
/// - Takes the first channel if stereo/multi-channel
#[cfg(test)]
pub(crate) fn read_wav(path: &Path) -> Result<(Vec<f64>, u32)> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open WAV file: {}", path.display()))?;

    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels as usize;

    let samples: Vec<f64> = match spec.sample_format {
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .into_samples::<i32>()
                .enumerate()
                .filter(|(i, _)| i % channels == 0)
                .map(|(_, s)| s.map(|v| v as f64 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()
                .context("Failed to read WAV samples")?
        }
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .enumerate()
            .filter(|(i, _)| i % channels == 0)
            .map(|(_, s)| s.map(|v| v as f64))
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("Failed to read WAV samples")?,
    };

    Ok((samples, sample_rate))
}

/// Write f64 samples to a 16-bit PCM mono WAV file.
///
/// Clips values to [-1, 1] before conversion.
/// Creates parent directories if needed.
pub fn write_wav(path: &Path, samples: &[f64], sample_rate: u32) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }

    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {}", path.display()))?;

    for &sample in samples {
        let clipped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clipped * 32767.0) as i16)?;
    }

    writer.finalize().context("Failed to finalize WAV file")?;
    Ok(())
}

/// Frames fed to the resampler per call.
const RESAMPLE_CHUNK: usize = 1024;

/// Why a resampling pass failed.
#[derive(Debug)]
enum ResampleFailure {
    Exhausted(TryReserveError),
    Rubato(String),
}

impl From<TryReserveError> for ResampleFailure {
    fn from(e: TryReserveError) -> Self {
        ResampleFailure::Exhausted(e)
    }
}

/// Chunked sinc resampling into a buffer grown with `try_reserve`.
///
/// The output has `ceil(len * to / from)` samples with the filter delay
/// removed. The input is never copied, so a long asset only costs its output.
fn resample_chunked(
    samples: &[f64],
    from_sr: u32,
    to_sr: u32,
) -> std::result::Result<Vec<f64>, ResampleFailure> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType,
        WindowFunction,
    };

    let rubato_err = |e: &dyn std::fmt::Display| ResampleFailure::Rubato(e.to_string());

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_sr as f64 / from_sr as f64;
    let mut resampler = SincFixedIn::<f64>::new(ratio, 2.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| rubato_err(&e))?;

    let delay = resampler.output_delay();
    let expected = (samples.len() as f64 * ratio).ceil() as usize;

    let mut output: Vec<f64> = Vec::new();
    output.try_reserve_exact(expected + delay)?;
    let mut chunk_out = vec![vec![0.0f64; resampler.output_frames_max()]];

    let mut pos = 0;
    while samples.len() - pos >= resampler.input_frames_next() {
        let need = resampler.input_frames_next();
        let chunk: [&[f64]; 1] = [&samples[pos..pos + need]];
        let (_, written) = resampler
            .process_into_buffer(&chunk[..], &mut chunk_out, None)
            .map_err(|e| rubato_err(&e))?;
        output.try_reserve(written)?;
        output.extend_from_slice(&chunk_out[0][..written]);
        pos += need;
    }
    if pos < samples.len() {
        let remainder: [&[f64]; 1] = [&samples[pos..]];
        let (_, written) = resampler
            .process_partial_into_buffer(Some(&remainder[..]), &mut chunk_out, None)
            .map_err(|e| rubato_err(&e))?;
        output.try_reserve(written)?;
        output.extend_from_slice(&chunk_out[0][..written]);
    }
    // Flush the filter tail.
    while output.len() < expected + delay {
        let (_, written) = resampler
            .process_partial_into_buffer(None::<&[&[f64]]>, &mut chunk_out, None)
            .map_err(|e| rubato_err(&e))?;
        if written == 0 {
            break;
        }
        output.try_reserve(written)?;
        output.extend_from_slice(&chunk_out[0][..written]);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected);
    Ok(output)
}

/// Resample audio from source sample rate to target sample rate.
///
/// Uses rubato for high-quality resampling.
pub fn resample(samples: &[f64], from_sr: u32, to_sr: u32) -> Result<Vec<f64>> {
    if from_sr == to_sr {
        return Ok(samples.to_vec());
    }
    if samples.is_empty() {
        return Ok(vec![]);
    }
    resample_chunked(samples, from_sr, to_sr).map_err(|e| match e {
        ResampleFailure::Exhausted(source) => anyhow::Error::new(source)
            .context(format!("Out of memory resampling {} samples", samples.len())),
        ResampleFailure::Rubato(message) => anyhow::anyhow!("Resampling failed: {}", message),
    })
}

/// Decode any supported file (WAV, MP3, AAC/MP4) to mono f64 samples.
///
/// Multi-channel audio is averaged down to one channel. Every growth of the
/// output goes through `try_reserve`, so an oversized asset surfaces as
/// [`AssetError::Exhausted`] instead of aborting the process.
pub fn decode_file(path: &Path) -> std::result::Result<(Vec<f64>, u32), AssetError> {
    use symphonia::core::audio::SampleBuffer;
    use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
    use symphonia::core::errors::Error as SymphError;
    use symphonia::core::formats::FormatOptions;
    use symphonia::core::io::MediaSourceStream;
    use symphonia::core::meta::MetadataOptions;
    use symphonia::core::probe::Hint;

    let decode_err = |source: SymphError| AssetError::Decode {
        path: path.to_path_buf(),
        source,
    };

    let file = std::fs::File::open(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            AssetError::Missing { path: path.to_path_buf() }
        } else {
            AssetError::Io { path: path.to_path_buf(), source }
        }
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(decode_err)?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AssetError::NoTrack { path: path.to_path_buf() })?;

    let track_id = track.id;
    let source_sr = track.codec_params.sample_rate.unwrap_or(44100);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(decode_err)?;

    let mut all_samples: Vec<f64> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphError::IoError(ref e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphError::ResetRequired) => break,
            Err(e) => return Err(decode_err(e)),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let num_frames = decoded.frames();
                let channels = spec.channels.count().max(1);
                let mut sample_buf = SampleBuffer::<f64>::new(num_frames as u64, spec);
                sample_buf.copy_interleaved_ref(decoded);
                let interleaved = sample_buf.samples();

                all_samples
                    .try_reserve(num_frames)
                    .map_err(|source| AssetError::Exhausted {
                        path: path.to_path_buf(),
                        source,
                    })?;

                if channels > 1 {
                    for frame in interleaved.chunks_exact(channels) {
                        all_samples.push(frame.iter().sum::<f64>() / channels as f64);
                    }
                } else {
                    all_samples.extend_from_slice(interleaved);
                }
            }
            Err(SymphError::DecodeError(_)) => continue,
            Err(e) => return Err(decode_err(e)),
        }
    }

    Ok((all_samples, source_sr))
}

/// Decode a file and bring it to `target_sr`, the way every clip and noise
/// asset enters a session.
///
/// Allocation failure while decoding or resampling is reported as
/// [`AssetError::Exhausted`].
pub fn load_mono(path: &Path, target_sr: u32) -> std::result::Result<Vec<f64>, AssetError> {
    let (samples, source_sr) = decode_file(path)?;
    if source_sr == target_sr || samples.is_empty() {
        return Ok(samples);
    }
    log::debug!(
        "Resampling {} from {} Hz to {} Hz",
        path.display(),
        source_sr,
        target_sr
    );
    resample_chunked(&samples, source_sr, target_sr).map_err(|e| match e {
        ResampleFailure::Exhausted(source) => AssetError::Exhausted {
            path: path.to_path_buf(),
            source,
        },
        ResampleFailure::Rubato(message) => AssetError::Resample {
            path: path.to_path_buf(),
            message,
        },
    })
}
