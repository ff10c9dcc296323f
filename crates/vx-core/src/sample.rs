//! Sample types and fixed-point conversion

/// Type alias for audio samples (always f64 for maximum precision)
pub type Sample = f64;

/// Full-scale value of a signed 16-bit sample
pub const I16_FULL_SCALE: f64 = 32767.0;

/// Quantize a sample to signed 16-bit.
///
/// Scales by 32767 and rounds to nearest. Values outside [-1, 1] clamp
/// to the i16 range instead of wrapping.
#[inline]
pub fn quantize_i16(sample: Sample) -> i16 {
    let scaled = (sample * I16_FULL_SCALE).round();
    scaled.clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

/// Quantize a whole block to signed 16-bit
pub fn quantize_block_i16(samples: &[Sample]) -> Vec<i16> {
    samples.iter().map(|&s| quantize_i16(s)).collect()
}

/// Convert a signed 16-bit sample back to float
#[inline]
pub fn i16_to_sample(value: i16) -> Sample {
    value as f64 / 32768.0
}

/// Peak absolute value of a block (linear)
pub fn peak(samples: &[Sample]) -> Sample {
    samples.iter().map(|s| s.abs()).fold(0.0, f64::max)
}

/// Scale a block so its peak sits at full scale.
///
/// A block with zero peak is left untouched. Returns the applied gain.
pub fn normalize_peak(samples: &mut [Sample]) -> Sample {
    let current = peak(samples);
    if current <= 0.0 {
        return 1.0;
    }
    let gain = 1.0 / current;
    for sample in samples.iter_mut() {
        *sample *= gain;
    }
    gain
}
