//! Media decoding for the speech engine.
//!
//! Whisper wants 16 kHz mono `f32` samples in `[-1.0, 1.0]`. WAV goes through
//! hound; every other container (mp4, m4a, mp3, flac, ogg, ...) goes through
//! symphonia's format detection and codec registry. Any channel count and
//! sample rate is accepted.

use crate::defaults::SAMPLE_RATE;
use crate::error::{Result, SmartsumError};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

fn decode_error(message: String) -> SmartsumError {
    SmartsumError::AudioDecode { message }
}

/// Decode a media file into 16 kHz mono samples.
pub fn decode_file(path: &Path) -> Result<Vec<f32>> {
    let file = File::open(path)
        .map_err(|e| decode_error(format!("Failed to open {}: {}", path.display(), e)))?;

    let extension = path.extension().and_then(|e| e.to_str());
    if extension.is_some_and(|e| e.eq_ignore_ascii_case("wav")) {
        return decode_wav(BufReader::new(file));
    }
    decode_media(Box::new(file), extension)
}

/// Decode media data from any reader into 16 kHz mono samples.
///
/// The container is detected from the data itself.
pub fn decode_reader<R: Read>(mut reader: R) -> Result<Vec<f32>> {
    let mut data = Vec::new();
    reader
        .read_to_end(&mut data)
        .map_err(|e| decode_error(format!("Failed to read media: {}", e)))?;

    if data.starts_with(b"RIFF") {
        decode_wav(Cursor::new(data))
    } else {
        decode_media(Box::new(Cursor::new(data)), None)
    }
}

fn decode_wav<R: Read>(reader: R) -> Result<Vec<f32>> {
    let mut wav_reader = hound::WavReader::new(reader)
        .map_err(|e| decode_error(format!("Failed to parse WAV file: {}", e)))?;

    let spec = wav_reader.spec();
    let interleaved = read_samples(&mut wav_reader, spec)?;
    let mono = downmix(&interleaved, spec.channels as usize);

    log::debug!(
        "Decoded {} samples ({} Hz, {} channel(s), {}-bit {:?})",
        mono.len(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        spec.sample_format
    );

    Ok(resample(&mono, spec.sample_rate, SAMPLE_RATE))
}

/// Decode the first audio track of any container symphonia recognizes.
fn decode_media(source: Box<dyn MediaSource>, extension: Option<&str>) -> Result<Vec<f32>> {
    let mut hint = Hint::new();
    if let Some(extension) = extension {
        hint.with_extension(extension);
    }

    let stream = MediaSourceStream::new(source, Default::default());
    let detected = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| decode_error(format!("Unsupported media format: {}", e)))?;
    let mut format = detected.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| decode_error("No audio track found".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error(format!("Unsupported codec: {}", e)))?;

    let mut mono = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(decode_error(format!("Failed to read packet: {}", e))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate.get_or_insert(spec.rate);
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                mono.extend(downmix(buffer.samples(), spec.channels.count()));
            }
            // A corrupt packet costs its samples, not the whole file
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet: {}", e);
            }
            Err(e) => return Err(decode_error(format!("Failed to decode audio: {}", e))),
        }
    }

    let sample_rate =
        sample_rate.ok_or_else(|| decode_error("Media has no sample rate".to_string()))?;
    log::debug!("Decoded {} samples ({} Hz)", mono.len(), sample_rate);

    Ok(resample(&mono, sample_rate, SAMPLE_RATE))
}

/// Duration in seconds of decoded 16 kHz audio.
pub fn duration_secs(samples: &[f32]) -> f64 {
    samples.len() as f64 / SAMPLE_RATE as f64
}

fn read_samples<R: Read>(
    wav_reader: &mut hound::WavReader<R>,
    spec: hound::WavSpec,
) -> Result<Vec<f32>> {
    let samples: std::result::Result<Vec<f32>, hound::Error> = match spec.sample_format {
        hound::SampleFormat::Float => wav_reader.samples::<f32>().collect(),
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            wav_reader
                .samples::<i32>()
                .map(|sample| sample.map(|s| s as f32 / scale))
                .collect()
        }
    };

    samples.map_err(|e| SmartsumError::AudioDecode {
        message: format!("Failed to read WAV samples: {}", e),
    })
}

/// Average interleaved channels into one.
fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }

    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Simple linear interpolation resampling.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = (source_pos - source_idx as f64) as f32;

            match (samples.get(source_idx), samples.get(source_idx + 1)) {
                (Some(&left), Some(&right)) => left + (right - left) * fraction,
                (Some(&left), None) => left,
                _ => samples[samples.len() - 1],
            }
        })
        .collect()
}
