//! VoxSplit Pitch Engine
//!
//! Dominant-pitch analysis for voice separation:
//!
//! ## Features
//! - **Frame Tracking**: Strongest spectral peak per analysis frame, refined by
//!   parabolic interpolation
//! - **Segmentation**: Non-silent spans found by an energy threshold relative to
//!   the loudest frame
//! - **Segment Averaging**: One mean pitch per segment from its confident frames
//! - **Distribution Peaks**: Histogram of clip pitches with smoothed peak picking
//!   to suggest separation targets
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vx_pitch::{PitchConfig, detection::PeakPickingDetector};
//!
//! let detector = PeakPickingDetector::new(PitchConfig::default(), 22050)?;
//! let track = detector.detect_frames(&waveform.samples);
//! let voiced: Vec<_> = track.iter().filter(|e| e.is_valid(0.1)).collect();
//! ```

pub mod detection;
pub mod distribution;
pub mod segment;

mod error;

pub use error::{PitchError, PitchResult};

use serde::{Deserialize, Serialize};
use vx_core::FrameLayout;

/// Dominant pitch of one frame (or one segment)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PitchEstimate {
    /// Frequency (Hz), 0.0 when nothing was found
    pub frequency: f64,
    /// Spectral magnitude of the selected peak
    pub magnitude: f64,
}

impl PitchEstimate {
    pub const NONE: Self = Self {
        frequency: 0.0,
        magnitude: 0.0,
    };

    pub fn new(frequency: f64, magnitude: f64) -> Self {
        Self {
            frequency,
            magnitude,
        }
    }

    /// True when the magnitude clears `min_magnitude`
    #[inline]
    pub fn is_valid(&self, min_magnitude: f64) -> bool {
        self.frequency > 0.0 && self.magnitude > min_magnitude
    }

    /// Frequency if valid, else `None`
    #[inline]
    pub fn voiced(&self, min_magnitude: f64) -> Option<f64> {
        self.is_valid(min_magnitude).then_some(self.frequency)
    }
}

/// Pitch analysis configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchConfig {
    /// Analysis window length (samples, also FFT size)
    pub frame_length: usize,
    /// Hop length (samples)
    pub hop_length: usize,
    /// Lowest frequency searched (Hz)
    pub fmin: f64,
    /// Upper bound of the search range (Hz, exclusive)
    pub fmax: f64,
    /// Estimates at or below this magnitude are unvoiced
    pub min_magnitude: f64,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            frame_length: 2048,
            hop_length: 512,
            fmin: 50.0,
            fmax: 400.0,
            min_magnitude: 0.1,
        }
    }
}

impl PitchConfig {
    /// Frame geometry
    pub fn layout(&self) -> PitchResult<FrameLayout> {
        Ok(FrameLayout::new(self.frame_length, self.hop_length)?)
    }

    /// Check ranges
    pub fn validate(&self) -> PitchResult<()> {
        self.layout()?;
        if !(self.fmin > 0.0 && self.fmax > self.fmin) {
            return Err(PitchError::InvalidFrequencyRange {
                min: self.fmin,
                max: self.fmax,
            });
        }
        if !(self.min_magnitude >= 0.0) {
            return Err(PitchError::InvalidParameter(format!(
                "min_magnitude must be >= 0, got {}",
                self.min_magnitude
            )));
        }
        Ok(())
    }

    pub fn with_frame(mut self, frame_length: usize, hop_length: usize) -> Self {
        self.frame_length = frame_length;
        self.hop_length = hop_length;
        self
    }

    pub fn with_range(mut self, fmin: f64, fmax: f64) -> Self {
        self.fmin = fmin;
        self.fmax = fmax;
        self
    }
}

/// Convert frequency to MIDI note number
pub fn freq_to_midi(freq: f64) -> f64 {
    69.0 + 12.0 * (freq / 440.0).log2()
}

/// Note names
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Nearest note name for a frequency, e.g. `"D3"` for 147 Hz
pub fn freq_to_note_name(freq: f64) -> String {
    let note = freq_to_midi(freq).round() as i32;
    let octave = note.div_euclid(12) - 1;
    let note_idx = note.rem_euclid(12) as usize;
    format!("{}{}", NOTE_NAMES[note_idx], octave)
}
