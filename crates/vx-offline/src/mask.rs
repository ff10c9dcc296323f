//! Voice mask construction
//!
//! Turns pitch decisions into per-voice gain masks. Frame policies produce
//! one value per analysis frame; the segment policy works directly on
//! samples.

use serde::{Deserialize, Serialize};
use vx_core::FrameLayout;
use vx_dsp::MovingAverage;
use vx_pitch::distribution::{DistributionAnalysis, PitchPeak};
use vx_pitch::segment::Segment;
use vx_pitch::PitchEstimate;

use crate::error::{SeparationError, SeparationResult};

// ═══════════════════════════════════════════════════════════════════════════════
// POLICY
// ═══════════════════════════════════════════════════════════════════════════════

/// How frames (or segments) are assigned to output voices
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum MaskPolicy {
    /// Whole segments go low when their mean pitch is below `split_hz`
    SegmentThreshold { split_hz: f64 },
    /// Each frame goes low when its pitch is below `split_hz`
    FrameThreshold { split_hz: f64 },
    /// One voice: frames within `tolerance_hz` of `target_hz`
    TargetBand { target_hz: f64, tolerance_hz: f64 },
    /// One voice per detected distribution peak
    DetectedPeaks { tolerance_hz: f64 },
}

impl Default for MaskPolicy {
    fn default() -> Self {
        Self::SegmentThreshold { split_hz: 185.0 }
    }
}

impl MaskPolicy {
    pub const DEFAULT_SEGMENT_SPLIT_HZ: f64 = 185.0;
    pub const DEFAULT_FRAME_SPLIT_HZ: f64 = 165.0;
    pub const DEFAULT_TOLERANCE_HZ: f64 = 30.0;

    pub fn segment_threshold() -> Self {
        Self::SegmentThreshold {
            split_hz: Self::DEFAULT_SEGMENT_SPLIT_HZ,
        }
    }

    pub fn frame_threshold() -> Self {
        Self::FrameThreshold {
            split_hz: Self::DEFAULT_FRAME_SPLIT_HZ,
        }
    }

    pub fn target_band(target_hz: f64) -> Self {
        Self::TargetBand {
            target_hz,
            tolerance_hz: Self::DEFAULT_TOLERANCE_HZ,
        }
    }

    pub fn detected_peaks() -> Self {
        Self::DetectedPeaks {
            tolerance_hz: Self::DEFAULT_TOLERANCE_HZ,
        }
    }

    /// Band policy around peak `index` of an earlier analysis
    pub fn from_peak(
        context: &PeakContext,
        index: usize,
        tolerance_hz: f64,
    ) -> SeparationResult<Self> {
        let peak = context.peak(index).ok_or_else(|| {
            SeparationError::Configuration(format!(
                "peak {} requested but analysis found {}",
                index,
                context.peaks().len()
            ))
        })?;
        let policy = Self::TargetBand {
            target_hz: peak.frequency,
            tolerance_hz,
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Short name used on the command line and in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::SegmentThreshold { .. } => "segment",
            Self::FrameThreshold { .. } => "frame",
            Self::TargetBand { .. } => "target",
            Self::DetectedPeaks { .. } => "peaks",
        }
    }

    /// Segment policy needs the segmenter instead of a frame track
    pub fn uses_segments(&self) -> bool {
        matches!(self, Self::SegmentThreshold { .. })
    }

    /// Thresholds and tolerances must be positive.
    ///
    /// Values outside the pitch search range are accepted; they simply
    /// produce all-zero or all-one masks.
    pub fn validate(&self) -> SeparationResult<()> {
        let check = |name: &str, value: f64| {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(SeparationError::Configuration(format!(
                    "{} must be positive, got {}",
                    name, value
                )))
            }
        };

        match *self {
            Self::SegmentThreshold { split_hz } | Self::FrameThreshold { split_hz } => {
                check("split_hz", split_hz)
            }
            Self::TargetBand {
                target_hz,
                tolerance_hz,
            } => {
                check("target_hz", target_hz)?;
                check("tolerance_hz", tolerance_hz)
            }
            Self::DetectedPeaks { tolerance_hz } => check("tolerance_hz", tolerance_hz),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PEAK CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

/// Distribution analysis of one clip, carried from analysis to masking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeakContext {
    pub sample_rate: u32,
    /// Frames analysed
    pub num_frames: usize,
    pub analysis: DistributionAnalysis,
}

impl PeakContext {
    pub fn new(sample_rate: u32, num_frames: usize, analysis: DistributionAnalysis) -> Self {
        Self {
            sample_rate,
            num_frames,
            analysis,
        }
    }

    /// Peaks, tallest first
    pub fn peaks(&self) -> &[PitchPeak] {
        &self.analysis.peaks
    }

    pub fn peak(&self, index: usize) -> Option<&PitchPeak> {
        self.analysis.peaks.get(index)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// VOICE MASK
// ═══════════════════════════════════════════════════════════════════════════════

/// Time base of a mask's values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MaskResolution {
    /// One value per analysis frame
    Frame { layout: FrameLayout },
    /// One value per sample
    Sample,
}

/// Gain mask for one output voice, values in [0, 1]
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceMask {
    /// Voice label, used in output file names
    pub label: String,
    pub resolution: MaskResolution,
    pub values: Vec<f64>,
}

impl VoiceMask {
    pub fn frames(label: impl Into<String>, layout: FrameLayout, values: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            resolution: MaskResolution::Frame { layout },
            values,
        }
    }

    pub fn samples(label: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            resolution: MaskResolution::Sample,
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_frame_resolution(&self) -> bool {
        matches!(self.resolution, MaskResolution::Frame { .. })
    }

    /// Expand to exactly `num_samples` gains
    pub fn to_samples(&self, num_samples: usize) -> Vec<f64> {
        match self.resolution {
            MaskResolution::Frame { layout } => layout.upsample(&self.values, num_samples),
            MaskResolution::Sample => {
                let mut out = self.values.clone();
                let fill = out.last().copied().unwrap_or(0.0);
                out.resize(num_samples, fill);
                out
            }
        }
    }

    /// Replace frame values with their moving average.
    ///
    /// Sample-resolution masks are hard cuts at silence and stay as they are.
    pub fn smooth(&mut self, smoother: &MovingAverage) {
        if self.is_frame_resolution() {
            smoother.apply_in_place(&mut self.values);
        }
    }

    /// Positions where this mask and `other` are both nonzero
    pub fn overlap_count(&self, other: &VoiceMask) -> usize {
        self.values
            .iter()
            .zip(&other.values)
            .filter(|(a, b)| **a > 0.0 && **b > 0.0)
            .count()
    }
}

pub const LOW_VOICE: &str = "low";
pub const HIGH_VOICE: &str = "high";
pub const TARGET_VOICE: &str = "target";

// ═══════════════════════════════════════════════════════════════════════════════
// BUILDERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Low/high frame masks, complementary on every voiced frame.
///
/// A frame goes low when its pitch is below `split_hz` and high otherwise, so
/// a pitch exactly at the threshold is high. Frames without a valid estimate
/// are zero in both masks.
pub fn frame_threshold_masks(
    track: &[PitchEstimate],
    layout: FrameLayout,
    split_hz: f64,
    min_magnitude: f64,
) -> [VoiceMask; 2] {
    let (low, high): (Vec<f64>, Vec<f64>) = track
        .iter()
        .map(|e| match e.voiced(min_magnitude) {
            Some(pitch) if pitch < split_hz => (1.0, 0.0),
            Some(_) => (0.0, 1.0),
            None => (0.0, 0.0),
        })
        .unzip();

    [
        VoiceMask::frames(LOW_VOICE, layout, low),
        VoiceMask::frames(HIGH_VOICE, layout, high),
    ]
}

/// Single-voice frame mask: 1 where a valid pitch lies within `tolerance_hz`
/// of `target_hz`
pub fn target_band_mask(
    label: impl Into<String>,
    track: &[PitchEstimate],
    layout: FrameLayout,
    target_hz: f64,
    tolerance_hz: f64,
    min_magnitude: f64,
) -> VoiceMask {
    let values = track
        .iter()
        .map(|e| match e.voiced(min_magnitude) {
            Some(f) if (f - target_hz).abs() <= tolerance_hz => 1.0,
            _ => 0.0,
        })
        .collect();
    VoiceMask::frames(label, layout, values)
}

/// One band mask per detected peak, labelled `peak1`, `peak2`, ...
pub fn peak_band_masks(
    context: &PeakContext,
    track: &[PitchEstimate],
    layout: FrameLayout,
    tolerance_hz: f64,
    min_magnitude: f64,
) -> Vec<VoiceMask> {
    context
        .peaks()
        .iter()
        .enumerate()
        .map(|(i, peak)| {
            target_band_mask(
                format!("peak{}", i + 1),
                track,
                layout,
                peak.frequency,
                tolerance_hz,
                min_magnitude,
            )
        })
        .collect()
}

/// Sample-resolution low/high masks from per-segment mean pitches.
///
/// A segment without a pitch is left out of both voices.
pub fn segment_threshold_masks(
    num_samples: usize,
    segments: &[(Segment, Option<f64>)],
    split_hz: f64,
) -> [VoiceMask; 2] {
    let mut low = vec![0.0; num_samples];
    let mut high = vec![0.0; num_samples];

    for (segment, pitch) in segments {
        let Some(pitch) = *pitch else {
            continue;
        };
        let target = if pitch < split_hz { &mut low } else { &mut high };
        let end = segment.end.min(num_samples);
        let start = segment.start.min(end);
        target[start..end].fill(1.0);
    }

    [
        VoiceMask::samples(LOW_VOICE, low),
        VoiceMask::samples(HIGH_VOICE, high),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use vx_pitch::distribution::{DistributionAnalyzer, DistributionConfig};

    fn layout() -> FrameLayout {
        FrameLayout::new(2048, 512).unwrap()
    }

    fn estimates(freqs: &[f64]) -> Vec<PitchEstimate> {
        freqs.iter().map(|&f| PitchEstimate::new(f, 10.0)).collect()
    }

    #[test]
    fn test_threshold_tie_goes_high() {
        let track = estimates(&[164.999, 165.0, 165.001]);
        let [low, high] = frame_threshold_masks(&track, layout(), 165.0, 0.1);
        assert_eq!(low.values, vec![1.0, 0.0, 0.0]);
        assert_eq!(high.values, vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_frame_masks_complementary_when_voiced() {
        let mut track = estimates(&[120.0, 240.0, 170.0, 90.0]);
        track.push(PitchEstimate::NONE);
        track.push(PitchEstimate::new(300.0, 0.05));
        let [low, high] = frame_threshold_masks(&track, layout(), 165.0, 0.1);

        for (l, h) in low.values[..4].iter().zip(&high.values[..4]) {
            assert_eq!(l + h, 1.0);
        }
        // Unvoiced frames belong to neither voice
        assert_eq!(&low.values[4..], &[0.0, 0.0]);
        assert_eq!(&high.values[4..], &[0.0, 0.0]);
        assert_eq!(low.overlap_count(&high), 0);
    }

    #[test]
    fn test_target_band_inclusive_tolerance() {
        let track = estimates(&[120.0, 150.0, 180.0, 181.0, 0.0]);
        let mask = target_band_mask(TARGET_VOICE, &track, layout(), 150.0, 30.0, 0.1);
        assert_eq!(mask.values, vec![1.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_target_band_skips_weak_frames() {
        let track = vec![PitchEstimate::new(150.0, 0.01); 4];
        let mask = target_band_mask(TARGET_VOICE, &track, layout(), 150.0, 30.0, 0.1);
        assert!(mask.values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_out_of_range_target_is_degenerate() {
        let track = estimates(&[120.0, 200.0, 300.0]);
        let mask = target_band_mask(TARGET_VOICE, &track, layout(), 5000.0, 30.0, 0.1);
        assert!(mask.values.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_segment_masks() {
        let segments = [
            (Segment::new(0, 100), Some(150.0)),
            (Segment::new(200, 300), None),
            (Segment::new(400, 500), Some(185.0)),
        ];
        let [low, high] = segment_threshold_masks(600, &segments, 185.0);
        assert_eq!(low.len(), 600);
        assert!(low.values[..100].iter().all(|&v| v == 1.0));
        assert!(high.values[400..500].iter().all(|&v| v == 1.0));
        // No pitch: silent in both
        assert!(low.values[200..300].iter().all(|&v| v == 0.0));
        assert!(high.values[200..300].iter().all(|&v| v == 0.0));
        assert_eq!(low.resolution, MaskResolution::Sample);
    }

    #[test]
    fn test_smoothing_widens_overlap() {
        let track = estimates(&[120.0, 120.0, 120.0, 240.0, 240.0, 240.0, 120.0, 120.0]);
        let mut overlaps = Vec::new();
        for window in [1, 3, 5, 7] {
            let [mut low, mut high] = frame_threshold_masks(&track, layout(), 165.0, 0.1);
            let smoother = MovingAverage::new(window);
            low.smooth(&smoother);
            high.smooth(&smoother);
            assert_eq!(low.len(), track.len());
            assert!(low.values.iter().all(|v| (0.0..=1.0 + 1e-12).contains(v)));
            overlaps.push(low.overlap_count(&high));
        }
        assert_eq!(overlaps[0], 0);
        assert!(overlaps.windows(2).all(|w| w[0] <= w[1]), "{:?}", overlaps);
    }

    #[test]
    fn test_sample_masks_not_smoothed() {
        let mut mask = VoiceMask::samples(LOW_VOICE, vec![0.0, 1.0, 1.0, 0.0]);
        mask.smooth(&MovingAverage::new(3));
        assert_eq!(mask.values, vec![0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_to_samples() {
        let layout = FrameLayout::new(4, 2).unwrap();
        let mask = VoiceMask::frames(LOW_VOICE, layout, vec![1.0, 0.0, 0.5]);
        assert_eq!(mask.to_samples(5), vec![1.0, 1.0, 0.0, 0.0, 0.5]);
        assert_eq!(mask.to_samples(8).len(), 8);

        let mask = VoiceMask::samples(HIGH_VOICE, vec![0.0, 1.0]);
        assert_eq!(mask.to_samples(3), vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_from_peak() {
        let analyzer = DistributionAnalyzer::new(DistributionConfig::default()).unwrap();
        let mut pitches = vec![150.0; 100];
        pitches.extend(vec![220.0; 60]);
        let context = PeakContext::new(22050, 160, analyzer.from_frequencies(&pitches));
        assert_eq!(context.peaks().len(), 2);

        match MaskPolicy::from_peak(&context, 1, 20.0).unwrap() {
            MaskPolicy::TargetBand {
                target_hz,
                tolerance_hz,
            } => {
                assert!((target_hz - 220.0).abs() <= 5.0);
                assert_eq!(tolerance_hz, 20.0);
            }
            other => panic!("unexpected policy {:?}", other),
        }
        assert!(MaskPolicy::from_peak(&context, 2, 20.0).is_err());
        assert!(MaskPolicy::from_peak(&context, 0, 0.0).is_err());
    }

    #[test]
    fn test_policy_validation() {
        assert!(MaskPolicy::default().validate().is_ok());
        assert!(MaskPolicy::FrameThreshold { split_hz: -1.0 }.validate().is_err());
        assert!(MaskPolicy::TargetBand {
            target_hz: 150.0,
            tolerance_hz: 0.0
        }
        .validate()
        .is_err());
        // Out of the search range is allowed
        assert!(MaskPolicy::target_band(1000.0).validate().is_ok());
    }

    #[test]
    fn test_policy_serde() {
        let json = serde_json::to_string(&MaskPolicy::frame_threshold()).unwrap();
        assert!(json.contains("\"mode\":\"frame_threshold\""));
        let back: MaskPolicy = serde_json::from_str(&json).unwrap();
        assert_eq!(back, MaskPolicy::frame_threshold());
    }
}
