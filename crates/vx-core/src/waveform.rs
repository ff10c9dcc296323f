//! Mono waveform buffer

use std::ops::Range;

use crate::sample::{peak, Sample};

/// Mono audio waveform at a fixed sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    /// Samples, nominally within [-1, 1]
    pub samples: Vec<Sample>,
    /// Sample rate (Hz)
    pub sample_rate: u32,
}

impl Waveform {
    /// Create waveform from mono samples
    pub fn new(samples: Vec<Sample>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Create a silent waveform of `len` samples
    pub fn silence(len: usize, sample_rate: u32) -> Self {
        Self::new(vec![0.0; len], sample_rate)
    }

    /// Mix interleaved multichannel samples down to mono by averaging
    pub fn from_interleaved(interleaved: &[Sample], channels: usize, sample_rate: u32) -> Self {
        if channels <= 1 {
            return Self::new(interleaved.to_vec(), sample_rate);
        }

        let samples = interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<Sample>() / channels as f64)
            .collect();

        Self::new(samples, sample_rate)
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// True when the waveform holds no samples
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples.len() as f64 / self.sample_rate as f64
        }
    }

    /// Borrow a sample range, clamped to the waveform bounds
    pub fn slice(&self, range: Range<usize>) -> &[Sample] {
        let end = range.end.min(self.samples.len());
        let start = range.start.min(end);
        &self.samples[start..end]
    }

    /// Peak level (linear)
    pub fn peak(&self) -> Sample {
        peak(&self.samples)
    }

    /// Apply gain
    pub fn apply_gain(&mut self, gain: f64) {
        for sample in &mut self.samples {
            *sample *= gain;
        }
    }

    /// Scale down so the peak does not exceed 1.0. Never boosts.
    ///
    /// Returns the applied gain.
    pub fn prevent_clipping(&mut self) -> f64 {
        let peak = self.peak();
        if peak > 1.0 {
            let gain = 1.0 / peak;
            log::debug!("Peak {:.3} above full scale, scaling by {:.3}", peak, gain);
            self.apply_gain(gain);
            gain
        } else {
            1.0
        }
    }
}
