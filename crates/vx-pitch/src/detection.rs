//! Frame pitch detection
//!
//! Peak-picking over the STFT magnitude spectrum:
//! 1. Hann-windowed, centered STFT frame
//! 2. Keep bins inside `[fmin, fmax)` that are local maxima along frequency
//!    and exceed 10% of the frame's strongest bin
//! 3. Refine each maximum with parabolic interpolation
//! 4. Report the candidate with the largest interpolated magnitude

use rayon::prelude::*;
use vx_core::FrameLayout;
use vx_dsp::{StftAnalyzer, StftScratch};

use crate::segment::Segment;
use crate::{PitchConfig, PitchError, PitchEstimate, PitchResult};

/// Fraction of the frame maximum a peak must exceed to be a candidate
const RELATIVE_PEAK_THRESHOLD: f64 = 0.1;

/// Dominant-peak pitch detector
pub struct PeakPickingDetector {
    config: PitchConfig,
    sample_rate: u32,
    stft: StftAnalyzer,
    /// First bin inside the search range
    min_bin: usize,
    /// One past the last bin inside the search range
    max_bin: usize,
}

impl PeakPickingDetector {
    /// Create detector for audio at `sample_rate`
    pub fn new(config: PitchConfig, sample_rate: u32) -> PitchResult<Self> {
        if sample_rate == 0 {
            return Err(PitchError::InvalidSampleRate(sample_rate));
        }
        config.validate()?;

        let stft = StftAnalyzer::new(config.layout()?);
        let min_bin = stft.freq_to_bin(config.fmin, sample_rate).ceil() as usize;
        // fmax is exclusive
        let max_bin = (stft.freq_to_bin(config.fmax, sample_rate).ceil() as usize)
            .min(stft.bin_count());

        Ok(Self {
            config,
            sample_rate,
            stft,
            min_bin,
            max_bin,
        })
    }

    pub fn config(&self) -> &PitchConfig {
        &self.config
    }

    pub fn layout(&self) -> FrameLayout {
        self.stft.layout()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// One estimate per analysis frame of `samples`.
    ///
    /// Frames are processed in parallel; the output order and values do not
    /// depend on the thread count.
    pub fn detect_frames(&self, samples: &[f64]) -> Vec<PitchEstimate> {
        let num_frames = self.layout().num_frames(samples.len());
        (0..num_frames)
            .into_par_iter()
            .map_init(
                || self.stft.make_scratch(),
                |scratch, frame| self.detect_frame(samples, frame, scratch),
            )
            .collect()
    }

    /// Estimate for a single frame
    pub fn detect_frame(
        &self,
        samples: &[f64],
        frame_index: usize,
        scratch: &mut StftScratch,
    ) -> PitchEstimate {
        let spectrum = self.stft.frame_magnitudes(samples, frame_index, scratch);
        self.pick_peak(spectrum)
    }

    /// Mean pitch of the confident frames inside `segment`.
    ///
    /// Frames at or below `min_magnitude` are left out of the mean. Returns
    /// `None` when no frame in the segment qualifies.
    pub fn segment_pitch(&self, samples: &[f64], segment: Segment) -> Option<f64> {
        let end = segment.end.min(samples.len());
        let start = segment.start.min(end);
        let estimates = self.detect_frames(&samples[start..end]);

        let (sum, count) = estimates
            .iter()
            .filter_map(|e| e.voiced(self.config.min_magnitude))
            .fold((0.0, 0usize), |(sum, count), f| (sum + f, count + 1));

        if count == 0 {
            None
        } else {
            Some(sum / count as f64)
        }
    }

    /// Strongest interpolated peak of one magnitude spectrum
    fn pick_peak(&self, spectrum: &[f64]) -> PitchEstimate {
        let frame_max = spectrum.iter().copied().fold(0.0, f64::max);
        if frame_max <= 0.0 {
            return PitchEstimate::NONE;
        }
        let threshold = RELATIVE_PEAK_THRESHOLD * frame_max;

        // Interpolation needs both neighbours
        let lo = self.min_bin.max(1);
        let hi = self.max_bin.min(spectrum.len().saturating_sub(1));

        let mut best = PitchEstimate::NONE;
        for k in lo..hi {
            let (prev, cur, next) = (spectrum[k - 1], spectrum[k], spectrum[k + 1]);
            if !(cur > prev && cur >= next && cur > threshold) {
                continue;
            }

            let avg = 0.5 * (next - prev);
            let curvature = 2.0 * cur - next - prev;
            let shift = if curvature.abs() > f64::EPSILON {
                avg / curvature
            } else {
                0.0
            };

            let magnitude = cur + 0.5 * avg * shift;
            if magnitude > best.magnitude {
                best = PitchEstimate::new(
                    self.stft.bin_to_freq(k as f64 + shift, self.sample_rate),
                    magnitude,
                );
            }
        }

        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 22050;

    fn generate_sine(freq: f64, sample_rate: u32, num_samples: usize) -> Vec<f64> {
        (0..num_samples)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate as f64).sin())
            .collect()
    }

    fn generate_voice(freq: f64, sample_rate: u32, num_samples: usize) -> Vec<f64> {
        (0..num_samples)
            .map(|i| {
                let t = i as f64 / sample_rate as f64;
                let w = 2.0 * std::f64::consts::PI * freq;
                0.6 * (w * t).sin() + 0.3 * (2.0 * w * t).sin() + 0.15 * (3.0 * w * t).sin()
            })
            .collect()
    }

    fn detector() -> PeakPickingDetector {
        PeakPickingDetector::new(PitchConfig::default(), SAMPLE_RATE).unwrap()
    }

    #[test]
    fn test_sine_frames() {
        let detector = detector();
        for freq in [110.0, 150.0, 220.0, 310.0] {
            let samples = generate_sine(freq, SAMPLE_RATE, SAMPLE_RATE as usize);
            let track = detector.detect_frames(&samples);
            let mid = track[track.len() / 2];
            assert!(
                (mid.frequency - freq).abs() < 3.0,
                "Expected ~{} Hz, got {}",
                freq,
                mid.frequency
            );
            assert!(mid.is_valid(0.1));
        }
    }

    #[test]
    fn test_fundamental_wins_over_harmonics_in_range() {
        let detector = detector();
        let samples = generate_voice(180.0, SAMPLE_RATE, SAMPLE_RATE as usize);
        let track = detector.detect_frames(&samples);
        let mid = track[track.len() / 2];
        assert!((mid.frequency - 180.0).abs() < 3.0, "got {}", mid.frequency);
    }

    #[test]
    fn test_silence_has_no_estimate() {
        let detector = detector();
        let track = detector.detect_frames(&vec![0.0; 8192]);
        assert_eq!(track.len(), 17);
        assert!(track.iter().all(|e| *e == PitchEstimate::NONE));
    }

    #[test]
    fn test_out_of_range_tone_not_reported() {
        let detector = detector();
        let samples = generate_sine(1000.0, SAMPLE_RATE, SAMPLE_RATE as usize);
        let track = detector.detect_frames(&samples);
        let mid = track[track.len() / 2];
        assert!(!mid.is_valid(0.1), "1 kHz tone leaked: {:?}", mid);
    }

    #[test]
    fn test_frame_count_matches_layout() {
        let detector = detector();
        let samples = generate_sine(200.0, SAMPLE_RATE, 5000);
        assert_eq!(detector.detect_frames(&samples).len(), 1 + 5000 / 512);
        assert!(detector.detect_frames(&[]).is_empty());
    }

    #[test]
    fn test_parallel_detection_is_deterministic() {
        let detector = detector();
        let samples = generate_voice(140.0, SAMPLE_RATE, SAMPLE_RATE as usize * 2);
        assert_eq!(detector.detect_frames(&samples), detector.detect_frames(&samples));
    }

    #[test]
    fn test_segment_pitch_mean() {
        let detector = detector();
        let mut samples = vec![0.0; 11025];
        samples.extend(generate_sine(150.0, SAMPLE_RATE, 22050));
        let segment = Segment::new(11025, samples.len());
        let pitch = detector.segment_pitch(&samples, segment).unwrap();
        assert!((pitch - 150.0).abs() < 3.0, "got {}", pitch);
    }

    #[test]
    fn test_silent_segment_has_no_pitch() {
        let detector = detector();
        let samples = vec![0.0; 22050];
        assert_eq!(detector.segment_pitch(&samples, Segment::new(0, 22050)), None);
    }

    #[test]
    fn test_rejects_bad_config() {
        assert!(PeakPickingDetector::new(PitchConfig::default(), 0).is_err());
        let inverted = PitchConfig::default().with_range(300.0, 100.0);
        assert!(PeakPickingDetector::new(inverted, SAMPLE_RATE).is_err());
    }
}
