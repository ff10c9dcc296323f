//! Audio decoding module
//!
//! Uses symphonia for decoding multiple formats:
//! - WAV, AIFF (PCM)
//! - FLAC (lossless)
//! - MP3, OGG Vorbis, AAC (lossy)
//!
//! Output is always a mono [`Waveform`]. Multichannel sources are averaged
//! down, and a source that peaks above full scale is attenuated to 0 dBFS.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use serde::{Deserialize, Serialize};
use symphonia::core::audio::{SampleBuffer, SignalSpec};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Track};
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use vx_core::Waveform;

use crate::error::{SeparationError, SeparationResult};

/// Resampler block size (input frames per call)
const RESAMPLE_CHUNK: usize = 1024;

// ═══════════════════════════════════════════════════════════════════════════════
// STREAM INFO
// ═══════════════════════════════════════════════════════════════════════════════

/// Stream properties read without decoding
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioInfo {
    pub sample_rate: u32,
    pub channels: usize,
    /// Frames per channel, when the container reports it
    pub frames: Option<u64>,
}

impl AudioInfo {
    /// Duration in seconds, when known
    pub fn duration(&self) -> Option<f64> {
        match (self.frames, self.sample_rate) {
            (Some(frames), rate) if rate > 0 => Some(frames as f64 / rate as f64),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DECODER
// ═══════════════════════════════════════════════════════════════════════════════

/// Universal audio decoder using symphonia
pub struct AudioDecoder;

impl AudioDecoder {
    /// Decode an audio file to a mono waveform at its native rate
    pub fn decode(path: &Path) -> SeparationResult<Waveform> {
        let (mss, hint) = Self::open_file(path)?;
        Self::decode_stream(mss, &hint)
    }

    /// Decode in-memory audio. `extension` is an optional format hint.
    pub fn decode_bytes(bytes: &[u8], extension: Option<&str>) -> SeparationResult<Waveform> {
        if bytes.is_empty() {
            return Err(SeparationError::EmptyAudio);
        }
        let source = Box::new(Cursor::new(bytes.to_vec())) as Box<dyn MediaSource>;
        let mss = MediaSourceStream::new(source, Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }
        Self::decode_stream(mss, &hint)
    }

    /// Read stream properties without decoding samples
    pub fn probe(path: &Path) -> SeparationResult<AudioInfo> {
        let (mss, hint) = Self::open_file(path)?;
        let format = Self::probe_format(mss, &hint)?;
        let track = Self::default_track(&*format)?;
        let params = &track.codec_params;

        Ok(AudioInfo {
            sample_rate: params
                .sample_rate
                .ok_or_else(|| SeparationError::Decode("stream has no sample rate".into()))?,
            channels: params.channels.map(|c| c.count()).unwrap_or(1),
            frames: params.n_frames,
        })
    }

    /// Decode, then resample to `target_rate` when it differs from the native rate
    pub fn decode_resampled(path: &Path, target_rate: Option<u32>) -> SeparationResult<Waveform> {
        let waveform = Self::decode(path)?;
        match target_rate {
            Some(rate) if rate != waveform.sample_rate => resample(&waveform, rate),
            _ => Ok(waveform),
        }
    }

    fn open_file(path: &Path) -> SeparationResult<(MediaSourceStream, Hint)> {
        let file = File::open(path).map_err(|e| {
            SeparationError::Decode(format!("failed to open {}: {}", path.display(), e))
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }
        Ok((mss, hint))
    }

    fn probe_format(mss: MediaSourceStream, hint: &Hint) -> SeparationResult<Box<dyn FormatReader>> {
        let probed = symphonia::default::get_probe()
            .format(hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| SeparationError::Decode(format!("unrecognized format: {}", e)))?;
        Ok(probed.format)
    }

    fn default_track(format: &dyn FormatReader) -> SeparationResult<&Track> {
        format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| SeparationError::Decode("no audio track found".into()))
    }

    fn decode_stream(mss: MediaSourceStream, hint: &Hint) -> SeparationResult<Waveform> {
        let mut format = Self::probe_format(mss, hint)?;

        let track = Self::default_track(&*format)?;
        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| SeparationError::Decode(format!("unsupported codec: {}", e)))?;

        let mut sample_rate = codec_params.sample_rate.unwrap_or(0);
        let mut channels = codec_params.channels.map(|c| c.count()).unwrap_or(0);
        let mut interleaved: Vec<f64> = Vec::new();
        let mut sample_buf: Option<(SampleBuffer<f64>, usize, SignalSpec)> = None;
        let mut packets = 0usize;
        let mut skipped = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => {
                    decoder.reset();
                    continue;
                }
                Err(e) => {
                    return Err(SeparationError::Decode(format!("packet read error: {}", e)));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }
            packets += 1;

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("Skipping undecodable packet: {}", e);
                    skipped += 1;
                    continue;
                }
                Err(e) => return Err(SeparationError::Decode(format!("decode error: {}", e))),
            };

            let spec = *decoded.spec();
            sample_rate = spec.rate;
            channels = spec.channels.count();

            // Reallocate when the packet outgrows the buffer or the layout changes
            let frames = decoded.capacity();
            let stale = match &sample_buf {
                Some((_, cap, buf_spec)) => *cap < frames || *buf_spec != spec,
                None => true,
            };
            if stale {
                sample_buf = Some((SampleBuffer::<f64>::new(frames as u64, spec), frames, spec));
            }
            if let Some((buf, _, _)) = sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(buf.samples());
            }
        }

        if packets > 0 && packets == skipped {
            return Err(SeparationError::Decode(format!(
                "none of {} packets could be decoded",
                packets
            )));
        }
        if interleaved.is_empty() {
            return Err(SeparationError::EmptyAudio);
        }
        if sample_rate == 0 || channels == 0 {
            return Err(SeparationError::Decode(
                "stream reports no sample rate or channel layout".into(),
            ));
        }

        let mut waveform = Waveform::from_interleaved(&interleaved, channels, sample_rate);
        let gain = waveform.prevent_clipping();

        log::info!(
            "Decoded {} samples @ {} Hz ({} ch{}, {} packet(s) skipped)",
            waveform.len(),
            sample_rate,
            channels,
            if gain < 1.0 { ", attenuated" } else { "" },
            skipped
        );

        Ok(waveform)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SAMPLE RATE CONVERSION
// ═══════════════════════════════════════════════════════════════════════════════

/// Sinc-resample a waveform to `target_rate`.
///
/// The output holds `round(len * target / source)` samples with the
/// resampler delay removed.
pub fn resample(waveform: &Waveform, target_rate: u32) -> SeparationResult<Waveform> {
    if target_rate == 0 {
        return Err(SeparationError::Configuration(
            "target sample rate must be positive".into(),
        ));
    }
    if waveform.sample_rate == target_rate || waveform.is_empty() {
        return Ok(Waveform::new(waveform.samples.clone(), target_rate));
    }

    let ratio = target_rate as f64 / waveform.sample_rate as f64;
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f64>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1)
        .map_err(|e| SeparationError::Decode(format!("resampler setup failed: {}", e)))?;

    let input = &waveform.samples;
    let expected = (input.len() as f64 * ratio).round() as usize;
    let delay = resampler.output_delay();
    let mut output: Vec<f64> = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);
    let resample_err = |e: rubato::ResampleError| {
        SeparationError::Decode(format!("resampling failed: {}", e))
    };

    let mut chunks = input.chunks_exact(RESAMPLE_CHUNK);
    for chunk in &mut chunks {
        let out = resampler.process(&[chunk], None).map_err(resample_err)?;
        output.extend_from_slice(&out[0]);
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let out = resampler
            .process_partial(Some(&[rest]), None)
            .map_err(resample_err)?;
        output.extend_from_slice(&out[0]);
    }
    // Drain the filter tail
    while output.len() < expected + delay {
        let out = resampler
            .process_partial(None::<&[&[f64]]>, None)
            .map_err(resample_err)?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    output.drain(..delay.min(output.len()));
    output.resize(expected, 0.0);

    log::debug!(
        "Resampled {} -> {} samples ({} Hz -> {} Hz)",
        input.len(),
        output.len(),
        waveform.sample_rate,
        target_rate
    );

    Ok(Waveform::new(output, target_rate))
}
