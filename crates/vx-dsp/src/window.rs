//! Window functions

use std::f64::consts::PI;

/// Periodic Hann window (STFT convention: period `size`, not `size - 1`)
pub fn hann_periodic(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / size as f64).cos()))
        .collect()
}

/// Symmetric Hamming window
pub fn hamming(size: usize) -> Vec<f64> {
    match size {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => (0..size)
            .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (size - 1) as f64).cos())
            .collect(),
    }
}

/// Scale a kernel so its taps sum to one
pub fn normalized(mut kernel: Vec<f64>) -> Vec<f64> {
    let sum: f64 = kernel.iter().sum();
    if sum != 0.0 {
        for tap in &mut kernel {
            *tap /= sum;
        }
    }
    kernel
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hamming_is_symmetric() {
        let w = hamming(10);
        assert_relative_eq!(w[0], 0.08, epsilon = 1e-12);
        assert_relative_eq!(w[9], 0.08, epsilon = 1e-12);
        for i in 0..5 {
            assert_relative_eq!(w[i], w[9 - i], epsilon = 1e-12);
        }
    }

    #[test]
    fn test_hann_periodic_starts_at_zero() {
        let w = hann_periodic(8);
        assert_eq!(w[0], 0.0);
        assert_relative_eq!(w[4], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_normalized_sums_to_one() {
        let k = normalized(hamming(10));
        assert_relative_eq!(k.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
    }
}
