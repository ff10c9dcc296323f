//! Voice track synthesis
//!
//! Applies a voice mask to the source waveform, peak-normalizes the result
//! and quantizes it to 16-bit PCM.

use vx_core::{i16_to_sample, normalize_peak, quantize_block_i16, Decibels, Waveform};

use crate::mask::VoiceMask;

/// One separated voice, ready for encoding
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceTrack {
    pub label: String,
    pub sample_rate: u32,
    pub samples: Vec<i16>,
    /// Gain applied by peak normalization
    pub normalization_gain: f64,
}

impl VoiceTrack {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// True when every sample is zero
    pub fn is_silent(&self) -> bool {
        self.samples.iter().all(|&s| s == 0)
    }

    /// Sum of squared samples over `range`, in full-scale units
    pub fn energy(&self, range: std::ops::Range<usize>) -> f64 {
        let end = range.end.min(self.samples.len());
        let start = range.start.min(end);
        self.samples[start..end]
            .iter()
            .map(|&s| {
                let x = i16_to_sample(s);
                x * x
            })
            .sum()
    }

    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f64 / self.sample_rate as f64
        }
    }
}

/// Mask-and-normalize voice renderer
pub struct Synthesizer;

impl Synthesizer {
    /// Render one voice.
    ///
    /// The output always has the waveform's length. A mask that silences
    /// everything yields an all-zero track.
    pub fn render(waveform: &Waveform, mask: &VoiceMask) -> VoiceTrack {
        let gains = mask.to_samples(waveform.len());
        let mut voice: Vec<f64> = waveform
            .samples
            .iter()
            .zip(&gains)
            .map(|(&s, &g)| s * g.clamp(0.0, 1.0))
            .collect();

        let gain = normalize_peak(&mut voice);
        log::debug!(
            "Voice '{}': {} samples, normalization {:+.1} dB",
            mask.label,
            voice.len(),
            Decibels::from_gain(gain).0
        );

        VoiceTrack {
            label: mask.label.clone(),
            sample_rate: waveform.sample_rate,
            samples: quantize_block_i16(&voice),
            normalization_gain: gain,
        }
    }

    /// Render every voice
    pub fn render_all(waveform: &Waveform, masks: &[VoiceMask]) -> Vec<VoiceTrack> {
        masks.iter().map(|mask| Self::render(waveform, mask)).collect()
    }
}
