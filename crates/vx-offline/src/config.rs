//! Configuration types for voice separation

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vx_core::FrameLayout;
use vx_pitch::distribution::DistributionConfig;
use vx_pitch::PitchConfig;

use crate::error::{SeparationError, SeparationResult};
use crate::formats::OutputFormat;
use crate::mask::MaskPolicy;

/// Silence segmentation settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Frames quieter than the loudest frame by more than this are silent (dB)
    pub top_db: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self { top_db: 20.0 }
    }
}

/// Mask smoothing settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingConfig {
    /// Moving-average width in frames (odd, 1 disables smoothing)
    pub window: usize,
}

impl Default for SmoothingConfig {
    fn default() -> Self {
        Self { window: 11 }
    }
}

/// Complete separation request configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeparationConfig {
    pub analysis: PitchConfig,
    pub segmentation: SegmentationConfig,
    pub distribution: DistributionConfig,
    pub smoothing: SmoothingConfig,
    pub policy: MaskPolicy,
    pub output: OutputFormat,
    /// Resample decoded audio to this rate (None = keep native rate)
    pub target_sample_rate: Option<u32>,
    /// Parent directory for per-request scratch space (None = system temp)
    pub scratch_dir: Option<PathBuf>,
}

impl Default for SeparationConfig {
    fn default() -> Self {
        Self {
            analysis: PitchConfig::default(),
            segmentation: SegmentationConfig::default(),
            distribution: DistributionConfig::default(),
            smoothing: SmoothingConfig::default(),
            policy: MaskPolicy::default(),
            output: OutputFormat::default(),
            target_sample_rate: None,
            scratch_dir: None,
        }
    }
}

impl SeparationConfig {
    /// Load from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> SeparationResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> SeparationResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| SeparationError::Configuration(format!("invalid JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> SeparationResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SeparationError::Configuration(e.to_string()))
    }

    /// Frame geometry shared by every stage
    pub fn layout(&self) -> SeparationResult<FrameLayout> {
        Ok(self.analysis.layout()?)
    }

    /// Check every section
    pub fn validate(&self) -> SeparationResult<()> {
        self.analysis
            .validate()
            .map_err(|e| SeparationError::Configuration(e.to_string()))?;
        self.distribution
            .validate()
            .map_err(|e| SeparationError::Configuration(e.to_string()))?;

        if !(self.segmentation.top_db > 0.0) {
            return Err(SeparationError::Configuration(format!(
                "top_db must be positive, got {}",
                self.segmentation.top_db
            )));
        }

        let window = self.smoothing.window;
        if window == 0 || window % 2 == 0 {
            return Err(SeparationError::Configuration(format!(
                "smoothing window must be a positive odd number, got {}",
                window
            )));
        }

        self.policy.validate()?;

        if let OutputFormat::Mp3(mp3) = &self.output {
            if !mp3.bitrate.is_valid() {
                return Err(SeparationError::Configuration(format!(
                    "unsupported MP3 bitrate {:?}",
                    mp3.bitrate
                )));
            }
        }

        if self.target_sample_rate == Some(0) {
            return Err(SeparationError::Configuration(
                "target sample rate must be positive".into(),
            ));
        }

        Ok(())
    }

    pub fn with_policy(mut self, policy: MaskPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_smoothing_window(mut self, window: usize) -> Self {
        self.smoothing.window = window;
        self
    }

    pub fn with_frame(mut self, frame_length: usize, hop_length: usize) -> Self {
        self.analysis = self.analysis.with_frame(frame_length, hop_length);
        self
    }

    pub fn with_top_db(mut self, top_db: f64) -> Self {
        self.segmentation.top_db = top_db;
        self
    }

    pub fn with_max_peaks(mut self, max_peaks: usize) -> Self {
        self.distribution.max_peaks = max_peaks;
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output = format;
        self
    }

    pub fn with_target_sample_rate(mut self, rate: u32) -> Self {
        self.target_sample_rate = Some(rate);
        self
    }

    pub fn with_scratch_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SeparationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.frame_length, 2048);
        assert_eq!(config.analysis.hop_length, 512);
        assert_eq!(config.smoothing.window, 11);
        assert_eq!(config.policy, MaskPolicy::SegmentThreshold { split_hz: 185.0 });
    }

    #[test]
    fn test_even_window_rejected() {
        let config = SeparationConfig::default().with_smoothing_window(10);
        assert!(matches!(
            config.validate(),
            Err(SeparationError::Configuration(_))
        ));
        assert!(SeparationConfig::default().with_smoothing_window(0).validate().is_err());
        assert!(SeparationConfig::default().with_smoothing_window(1).validate().is_ok());
    }

    #[test]
    fn test_bad_sections_rejected() {
        assert!(SeparationConfig::default().with_frame(2048, 0).validate().is_err());
        assert!(SeparationConfig::default().with_top_db(0.0).validate().is_err());
        let policy = MaskPolicy::TargetBand {
            target_hz: 150.0,
            tolerance_hz: -5.0,
        };
        assert!(SeparationConfig::default().with_policy(policy).validate().is_err());
        assert!(SeparationConfig::default()
            .with_output_format(OutputFormat::mp3_cbr(32))
            .validate()
            .is_err());
        assert!(SeparationConfig::default()
            .with_target_sample_rate(0)
            .validate()
            .is_err());
    }

    #[test]
    fn test_json_partial_and_round_trip() {
        let config = SeparationConfig::from_json(
            r#"{ "smoothing": { "window": 5 }, "policy": { "mode": "frame_threshold", "split_hz": 170.0 } }"#,
        )
        .unwrap();
        assert_eq!(config.smoothing.window, 5);
        assert_eq!(config.policy, MaskPolicy::FrameThreshold { split_hz: 170.0 });
        assert_eq!(config.analysis, PitchConfig::default());

        let json = config.to_json().unwrap();
        assert_eq!(SeparationConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn test_json_rejects_invalid_values() {
        let result = SeparationConfig::from_json(r#"{ "smoothing": { "window": 4 } }"#);
        assert!(matches!(result, Err(SeparationError::Configuration(_))));
    }
}
