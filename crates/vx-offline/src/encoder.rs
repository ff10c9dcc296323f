//! Audio encoding module
//!
//! Supports:
//! - WAV (via hound), 16-bit PCM mono
//! - MP3 (via mp3lame-encoder), behind the `mp3` feature
//!
//! Encoders write to memory only; callers decide where bytes end up.

use std::io::Cursor;

use crate::error::{SeparationError, SeparationResult};
use crate::formats::OutputFormat;
#[cfg(feature = "mp3")]
use crate::formats::{Mp3Bitrate, Mp3Config};
use crate::synthesis::VoiceTrack;

// ═══════════════════════════════════════════════════════════════════════════════
// ENCODER TRAIT
// ═══════════════════════════════════════════════════════════════════════════════

/// Audio encoder trait
pub trait AudioEncoder: Send + Sync {
    /// Encode a voice track to container bytes
    fn encode(&self, track: &VoiceTrack) -> SeparationResult<Vec<u8>>;

    /// File extension
    fn extension(&self) -> &'static str;

    /// MIME type of the encoded bytes
    fn mime_type(&self) -> &'static str;
}

/// Encoder for an output format
pub fn encoder_for(format: &OutputFormat) -> SeparationResult<Box<dyn AudioEncoder>> {
    match format {
        OutputFormat::Wav => Ok(Box::new(WavEncoder)),
        #[cfg(feature = "mp3")]
        OutputFormat::Mp3(config) => Ok(Box::new(LameMp3Encoder::new(*config))),
        #[cfg(not(feature = "mp3"))]
        OutputFormat::Mp3(_) => Err(SeparationError::Encode(
            "MP3 output requires the `mp3` feature".into(),
        )),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// WAV ENCODER
// ═══════════════════════════════════════════════════════════════════════════════

/// WAV encoder using hound
#[derive(Debug, Clone, Copy, Default)]
pub struct WavEncoder;

impl AudioEncoder for WavEncoder {
    fn encode(&self, track: &VoiceTrack) -> SeparationResult<Vec<u8>> {
        let mut output = Vec::new();
        let cursor = Cursor::new(&mut output);

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: track.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = hound::WavWriter::new(cursor, spec)
            .map_err(|e| SeparationError::Encode(e.to_string()))?;

        for &sample in &track.samples {
            writer
                .write_sample(sample)
                .map_err(|e| SeparationError::Encode(e.to_string()))?;
        }

        writer
            .finalize()
            .map_err(|e| SeparationError::Encode(e.to_string()))?;

        Ok(output)
    }

    fn extension(&self) -> &'static str {
        "wav"
    }

    fn mime_type(&self) -> &'static str {
        "audio/wav"
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// MP3 ENCODER (Native LAME)
// ═══════════════════════════════════════════════════════════════════════════════

/// Lowest MPEG-2.5 sample rate
#[cfg(feature = "mp3")]
const MIN_MP3_SAMPLE_RATE: u32 = 8000;

/// Native MP3 encoder using LAME via mp3lame-encoder crate
#[cfg(feature = "mp3")]
pub struct LameMp3Encoder {
    config: Mp3Config,
}

#[cfg(feature = "mp3")]
impl LameMp3Encoder {
    pub fn new(config: Mp3Config) -> Self {
        Self { config }
    }

    /// Nearest LAME bitrate at or below the requested CBR rate
    fn lame_bitrate(kbps: u32) -> mp3lame_encoder::Bitrate {
        use mp3lame_encoder::Bitrate;
        match kbps {
            0..=111 => Bitrate::Kbps96,
            112..=127 => Bitrate::Kbps112,
            128..=159 => Bitrate::Kbps128,
            160..=191 => Bitrate::Kbps160,
            192..=223 => Bitrate::Kbps192,
            224..=255 => Bitrate::Kbps224,
            256..=319 => Bitrate::Kbps256,
            _ => Bitrate::Kbps320,
        }
    }

    /// LAME quality scale, 0 (best) to 9 (worst)
    fn lame_quality(level: u8) -> mp3lame_encoder::Quality {
        use mp3lame_encoder::Quality;
        match level {
            0 => Quality::Best,
            1 => Quality::SecondBest,
            2 => Quality::NearBest,
            3 => Quality::VeryNice,
            4 => Quality::Nice,
            5 => Quality::Good,
            6 => Quality::Decent,
            7 => Quality::Ok,
            8 => Quality::SecondWorst,
            _ => Quality::Worst,
        }
    }

    /// Apply rate control: a fixed bitrate for CBR, VBR mode plus quality otherwise
    fn configure(
        &self,
        builder: &mut mp3lame_encoder::Builder,
    ) -> Result<(), (&'static str, mp3lame_encoder::BuildError)> {
        use mp3lame_encoder::{Quality, VbrMode};
        match self.config.bitrate {
            Mp3Bitrate::Cbr(kbps) => {
                builder
                    .set_vbr_mode(VbrMode::Off)
                    .map_err(|e| ("set VBR mode", e))?;
                builder
                    .set_brate(Self::lame_bitrate(kbps))
                    .map_err(|e| ("set bitrate", e))?;
                builder
                    .set_quality(Quality::Best)
                    .map_err(|e| ("set quality", e))?;
            }
            Mp3Bitrate::Vbr(level) => {
                builder
                    .set_vbr_mode(VbrMode::Mtrh)
                    .map_err(|e| ("set VBR mode", e))?;
                builder
                    .set_vbr_quality(Self::lame_quality(level))
                    .map_err(|e| ("set VBR quality", e))?;
                builder
                    .set_quality(Quality::NearBest)
                    .map_err(|e| ("set quality", e))?;
            }
        }
        Ok(())
    }
}

#[cfg(feature = "mp3")]
impl AudioEncoder for LameMp3Encoder {
    fn encode(&self, track: &VoiceTrack) -> SeparationResult<Vec<u8>> {
        use mp3lame_encoder::{Builder, DualPcm, FlushNoGap};

        if track.sample_rate < MIN_MP3_SAMPLE_RATE {
            return Err(SeparationError::Encode(format!(
                "MP3 needs at least {} Hz, track is {} Hz",
                MIN_MP3_SAMPLE_RATE, track.sample_rate
            )));
        }

        let lame_err = |stage: &str, e: &dyn std::fmt::Debug| {
            SeparationError::Encode(format!("LAME {} failed: {:?}", stage, e))
        };

        let mut builder =
            Builder::new().ok_or_else(|| SeparationError::Encode("LAME init failed".into()))?;
        builder
            .set_num_channels(1)
            .map_err(|e| lame_err("set channels", &e))?;
        builder
            .set_sample_rate(track.sample_rate)
            .map_err(|e| lame_err("set sample rate", &e))?;
        self.configure(&mut builder)
            .map_err(|(stage, e)| lame_err(stage, &e))?;

        let mut encoder = builder.build().map_err(|e| lame_err("build", &e))?;

        // Mono: LAME reads only the left plane
        let input = DualPcm {
            left: &track.samples,
            right: &track.samples,
        };

        let mut mp3_output: Vec<u8> =
            Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(track.samples.len()));

        let encoded_size = encoder
            .encode(input, mp3_output.spare_capacity_mut())
            .map_err(|e| lame_err("encode", &e))?;

        // SAFETY: encoder wrote encoded_size bytes into spare capacity
        unsafe {
            mp3_output.set_len(encoded_size);
        }

        mp3_output.reserve(7200);
        let flush_size = encoder
            .flush::<FlushNoGap>(mp3_output.spare_capacity_mut())
            .map_err(|e| lame_err("flush", &e))?;

        // SAFETY: encoder wrote flush_size bytes into spare capacity
        unsafe {
            mp3_output.set_len(mp3_output.len() + flush_size);
        }

        Ok(mp3_output)
    }

    fn extension(&self) -> &'static str {
        "mp3"
    }

    fn mime_type(&self) -> &'static str {
        "audio/mpeg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone_track(len: usize, sample_rate: u32) -> VoiceTrack {
        VoiceTrack {
            label: "low".into(),
            sample_rate,
            samples: (0..len)
                .map(|i| {
                    let t = i as f64 / sample_rate as f64;
                    (16000.0 * (2.0 * std::f64::consts::PI * 150.0 * t).sin()) as i16
                })
                .collect(),
            normalization_gain: 1.0,
        }
    }

    #[test]
    fn test_wav_round_trip() {
        let track = tone_track(4410, 22050);
        let bytes = WavEncoder.encode(&track).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");

        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 22050);
        assert_eq!(spec.bits_per_sample, 16);
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded, track.samples);
    }

    #[test]
    fn test_wav_empty_track() {
        let track = tone_track(0, 16000);
        let bytes = WavEncoder.encode(&track).unwrap();
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.len(), 0);
    }

    #[test]
    fn test_encoder_for_format() {
        let wav = encoder_for(&OutputFormat::Wav).unwrap();
        assert_eq!(wav.extension(), "wav");
        assert_eq!(wav.mime_type(), "audio/wav");
    }

    #[cfg(feature = "mp3")]
    #[test]
    fn test_mp3_encode_produces_frames() {
        let track = tone_track(22050, 22050);
        let encoder = encoder_for(&OutputFormat::mp3_cbr(128)).unwrap();
        assert_eq!(encoder.extension(), "mp3");
        let bytes = encoder.encode(&track).unwrap();
        assert!(bytes.len() > 1000);
        // Frame sync in the first bytes
        assert!(bytes.windows(2).take(4096).any(|w| w[0] == 0xFF && w[1] & 0xE0 == 0xE0));
    }

    #[cfg(feature = "mp3")]
    #[test]
    fn test_mp3_vbr_is_variable_rate() {
        let track = tone_track(4 * 44100, 44100);
        let vbr = encoder_for(&OutputFormat::mp3_vbr(9))
            .unwrap()
            .encode(&track)
            .unwrap();
        let cbr = encoder_for(&OutputFormat::mp3_cbr(320))
            .unwrap()
            .encode(&track)
            .unwrap();
        assert!(vbr.len() < cbr.len(), "vbr {} >= cbr {}", vbr.len(), cbr.len());
    }

    #[cfg(feature = "mp3")]
    #[test]
    fn test_mp3_rejects_unsupported_rate() {
        let track = tone_track(200, 1);
        let err = encoder_for(&OutputFormat::mp3_192())
            .unwrap()
            .encode(&track)
            .unwrap_err();
        assert!(matches!(err, SeparationError::Encode(_)));
        assert_eq!(err.kind(), crate::error::ErrorKind::Encode);
    }

    #[cfg(not(feature = "mp3"))]
    #[test]
    fn test_mp3_without_feature_is_encode_error() {
        let err = encoder_for(&OutputFormat::mp3_192()).err().unwrap();
        assert!(matches!(err, SeparationError::Encode(_)));
    }
}
