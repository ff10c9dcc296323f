//! Non-silent segment detection
//!
//! A frame is non-silent when its RMS sits within `top_db` of the loudest
//! frame in the clip. Runs of non-silent frames become sample ranges.

use std::ops::Range;

use serde::{Deserialize, Serialize};
use vx_core::{Decibels, FrameLayout};
use vx_dsp::frame_rms;

use crate::{PitchError, PitchResult};

/// Power floor used when converting RMS to dB (amplitude floor 1e-5)
const POWER_FLOOR: f64 = 1e-10;

/// Contiguous non-silent sample range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub start: usize,
    pub end: usize,
}

impl Segment {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Energy-threshold segmenter
#[derive(Debug, Clone, Copy)]
pub struct Segmenter {
    layout: FrameLayout,
    top_db: f64,
}

impl Segmenter {
    pub fn new(layout: FrameLayout, top_db: f64) -> PitchResult<Self> {
        if !(top_db > 0.0) {
            return Err(PitchError::InvalidParameter(format!(
                "top_db must be positive, got {}",
                top_db
            )));
        }
        Ok(Self { layout, top_db })
    }

    pub fn top_db(&self) -> f64 {
        self.top_db
    }

    /// Non-silent segments of `samples`, in order. An all-zero clip has none.
    pub fn split(&self, samples: &[f64]) -> Vec<Segment> {
        let rms = frame_rms(samples, self.layout);
        let reference = rms.iter().copied().fold(0.0, f64::max);
        if reference <= 0.0 {
            return Vec::new();
        }

        let ref_power = reference * reference;
        let non_silent: Vec<bool> = rms
            .iter()
            .map(|&r| Decibels::from_power_ratio(r * r, ref_power, POWER_FLOOR).0 > -self.top_db)
            .collect();

        let mut segments = Vec::new();
        let mut run_start: Option<usize> = None;

        for (frame, &active) in non_silent.iter().enumerate() {
            match (active, run_start) {
                (true, None) => run_start = Some(frame),
                (false, Some(start)) => {
                    segments.push(self.to_samples(start, frame, samples.len()));
                    run_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = run_start {
            segments.push(self.to_samples(start, non_silent.len(), samples.len()));
        }

        segments.retain(|s| !s.is_empty());
        log::debug!(
            "Segmented {} samples into {} non-silent spans (top_db={})",
            samples.len(),
            segments.len(),
            self.top_db
        );
        segments
    }

    fn to_samples(&self, start_frame: usize, end_frame: usize, len: usize) -> Segment {
        let start = (start_frame * self.layout.hop_length).min(len);
        let end = (end_frame * self.layout.hop_length).min(len);
        Segment::new(start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| 0.8 * (2.0 * std::f64::consts::PI * 200.0 * i as f64 / 16000.0).sin())
            .collect()
    }

    fn segmenter() -> Segmenter {
        Segmenter::new(FrameLayout::new(1024, 256).unwrap(), 20.0).unwrap()
    }

    #[test]
    fn test_silence_has_no_segments() {
        assert!(segmenter().split(&vec![0.0; 16000]).is_empty());
        assert!(segmenter().split(&[]).is_empty());
    }

    #[test]
    fn test_continuous_tone_is_one_segment() {
        let segments = segmenter().split(&tone(16000));
        assert_eq!(segments, vec![Segment::new(0, 16000)]);
    }

    #[test]
    fn test_gap_splits_segments() {
        let mut samples = tone(16000);
        samples.extend(vec![0.0; 16000]);
        samples.extend(tone(16000));

        let segments = segmenter().split(&samples);
        assert_eq!(segments.len(), 2);

        // Boundaries land within a frame of the true edges
        assert_eq!(segments[0].start, 0);
        assert!(segments[0].end >= 16000 && segments[0].end <= 16000 + 1024);
        assert!(segments[1].start + 1024 >= 32000 && segments[1].start <= 32000);
        assert_eq!(segments[1].end, 48000);
    }

    #[test]
    fn test_quiet_passage_below_top_db_is_silent() {
        let mut samples = tone(16000);
        // -40 dB relative to the loud part
        samples.extend(tone(16000).iter().map(|s| s * 0.01));
        let segments = segmenter().split(&samples);
        assert_eq!(segments.len(), 1);
        assert!(segments[0].end < 16000 + 1024);
    }

    #[test]
    fn test_rejects_non_positive_top_db() {
        assert!(Segmenter::new(FrameLayout::default(), 0.0).is_err());
    }
}
