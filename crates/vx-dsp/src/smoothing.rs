//! Kernel smoothing
//!
//! Offline counterpart of a parameter smoother: whole arrays are convolved
//! with a fixed kernel in "same" mode, so the output keeps the input length
//! and stays center-aligned. Samples outside the array count as zero.

/// Convolve `signal` with `kernel`, keeping `signal.len()` outputs.
///
/// Output `j` is the full convolution at index `j + (kernel.len() - 1) / 2`,
/// the same alignment as NumPy's `convolve(..., mode="same")`.
pub fn convolve_same(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let n = signal.len();
    let m = kernel.len();
    if n == 0 || m == 0 {
        return vec![0.0; n];
    }

    let offset = (m - 1) / 2;
    let mut out = Vec::with_capacity(n);

    for j in 0..n {
        let k = j + offset;
        // full[k] = sum_i signal[i] * kernel[k - i], 0 <= k - i < m
        let i_min = (k + 1).saturating_sub(m);
        let i_max = k.min(n - 1);
        let mut acc = 0.0;
        for i in i_min..=i_max {
            acc += signal[i] * kernel[k - i];
        }
        out.push(acc);
    }

    out
}

/// Uniform moving-average smoother
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovingAverage {
    width: usize,
}

impl MovingAverage {
    /// Create smoother with kernel width `width` (clamped to at least 1)
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }

    /// Kernel width in taps
    pub fn width(&self) -> usize {
        self.width
    }

    /// Smoothed copy of `values`
    pub fn apply(&self, values: &[f64]) -> Vec<f64> {
        if self.width == 1 {
            return values.to_vec();
        }
        let kernel = vec![1.0 / self.width as f64; self.width];
        convolve_same(values, &kernel)
    }

    /// Smooth `values` in place
    pub fn apply_in_place(&self, values: &mut Vec<f64>) {
        if self.width > 1 {
            *values = self.apply(values);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_convolve_same_odd_kernel_is_centered() {
        let out = convolve_same(&[0.0, 0.0, 1.0, 0.0, 0.0], &[1.0, 2.0, 3.0]);
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0, 0.0]);
    }

    #[test]
    fn test_convolve_same_even_kernel_alignment() {
        // Even kernels lean one tap toward the end
        let out = convolve_same(&[0.0, 0.0, 1.0, 0.0, 0.0, 0.0], &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(out, vec![0.0, 1.0, 2.0, 3.0, 4.0, 0.0]);
    }

    #[test]
    fn test_convolve_keeps_length_for_long_kernel() {
        let out = convolve_same(&[1.0, 1.0], &[0.2; 5]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_moving_average_ramps_at_step() {
        let step = [0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        let smoothed = MovingAverage::new(3).apply(&step);
        assert_relative_eq!(smoothed[2], 1.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(smoothed[3], 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(smoothed[4], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_moving_average_zero_padded_edges() {
        let ones = [1.0; 5];
        let smoothed = MovingAverage::new(3).apply(&ones);
        assert_relative_eq!(smoothed[0], 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(smoothed[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_width_one_is_identity() {
        let mask = vec![0.0, 1.0, 0.0, 1.0];
        assert_eq!(MovingAverage::new(1).apply(&mask), mask);
        assert_eq!(MovingAverage::new(0).width(), 1);
    }
}
