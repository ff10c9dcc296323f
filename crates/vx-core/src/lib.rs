//! vx-core: Shared types for VoxSplit
//!
//! This crate provides the foundational types used across all VoxSplit crates:
//! the mono [`Waveform`], analysis [`FrameLayout`] geometry, and sample
//! quantization helpers.

mod error;
mod frame;
mod sample;
mod waveform;

pub use error::*;
pub use frame::*;
pub use sample::*;
pub use waveform::*;

/// Decibel value wrapper
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, serde::Serialize, serde::Deserialize)]
pub struct Decibels(pub f64);

impl Decibels {
    pub const ZERO: Self = Self(0.0);
    pub const NEG_INF: Self = Self(f64::NEG_INFINITY);

    #[inline]
    pub fn from_gain(gain: f64) -> Self {
        if gain <= 0.0 {
            Self::NEG_INF
        } else {
            Self(20.0 * gain.log10())
        }
    }

    /// Power ratio relative to `reference`, floored at `amin` to keep
    /// silent frames finite
    #[inline]
    pub fn from_power_ratio(power: f64, reference: f64, amin: f64) -> Self {
        Self(10.0 * power.max(amin).log10() - 10.0 * reference.max(amin).log10())
    }

    #[inline]
    pub fn to_gain(self) -> f64 {
        if self.0 <= -144.0 {
            0.0
        } else {
            10.0_f64.powf(self.0 / 20.0)
        }
    }
}

impl Default for Decibels {
    fn default() -> Self {
        Self::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_decibels_round_trip_gain() {
        assert_relative_eq!(Decibels::from_gain(0.5).to_gain(), 0.5, epsilon = 1e-12);
        assert_eq!(Decibels::from_gain(0.0), Decibels::NEG_INF);
    }

    #[test]
    fn test_power_ratio_is_relative() {
        let db = Decibels::from_power_ratio(0.01, 1.0, 1e-10);
        assert_relative_eq!(db.0, -20.0, epsilon = 1e-9);
        let floor = Decibels::from_power_ratio(0.0, 1.0, 1e-10);
        assert_relative_eq!(floor.0, -100.0, epsilon = 1e-9);
    }
}
