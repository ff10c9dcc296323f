//! Audio analysis: STFT magnitudes and frame energy

use std::sync::Arc;

use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;
use vx_core::FrameLayout;

use crate::window::hann_periodic;

/// Short-time Fourier analyzer over centered, Hann-windowed frames.
///
/// Magnitudes are unnormalized (`|X[k]|` straight from the FFT), so a
/// full-scale sine peaks at roughly `frame_length / 4`.
pub struct StftAnalyzer {
    layout: FrameLayout,
    fft: Arc<dyn RealToComplex<f64>>,
    window: Vec<f64>,
}

/// Per-thread working buffers for [`StftAnalyzer`]
pub struct StftScratch {
    input: Vec<f64>,
    output: Vec<Complex<f64>>,
    fft_scratch: Vec<Complex<f64>>,
    magnitudes: Vec<f64>,
}

impl StftAnalyzer {
    pub fn new(layout: FrameLayout) -> Self {
        let mut planner = RealFftPlanner::new();
        let fft = planner.plan_fft_forward(layout.frame_length);
        Self {
            layout,
            fft,
            window: hann_periodic(layout.frame_length),
        }
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Number of frequency bins (`frame_length / 2 + 1`)
    pub fn bin_count(&self) -> usize {
        self.layout.frame_length / 2 + 1
    }

    /// Center frequency of a bin
    pub fn bin_to_freq(&self, bin: f64, sample_rate: u32) -> f64 {
        bin * sample_rate as f64 / self.layout.frame_length as f64
    }

    /// Fractional bin index of a frequency
    pub fn freq_to_bin(&self, freq: f64, sample_rate: u32) -> f64 {
        freq * self.layout.frame_length as f64 / sample_rate as f64
    }

    /// Allocate working buffers for one thread
    pub fn make_scratch(&self) -> StftScratch {
        StftScratch {
            input: self.fft.make_input_vec(),
            output: self.fft.make_output_vec(),
            fft_scratch: self.fft.make_scratch_vec(),
            magnitudes: vec![0.0; self.bin_count()],
        }
    }

    /// Magnitude spectrum of one frame
    pub fn frame_magnitudes<'a>(
        &self,
        samples: &[f64],
        frame_index: usize,
        scratch: &'a mut StftScratch,
    ) -> &'a [f64] {
        self.layout.fill_frame(samples, frame_index, &mut scratch.input);
        for (x, w) in scratch.input.iter_mut().zip(&self.window) {
            *x *= w;
        }

        // Buffer sizes come from the plan itself
        if let Err(e) = self.fft.process_with_scratch(
            &mut scratch.input,
            &mut scratch.output,
            &mut scratch.fft_scratch,
        ) {
            log::warn!("STFT frame {} failed: {}", frame_index, e);
            scratch.magnitudes.fill(0.0);
            return &scratch.magnitudes;
        }

        for (mag, c) in scratch.magnitudes.iter_mut().zip(&scratch.output) {
            *mag = (c.re * c.re + c.im * c.im).sqrt();
        }
        &scratch.magnitudes
    }
}

/// Root-mean-square energy of every centered frame
pub fn frame_rms(samples: &[f64], layout: FrameLayout) -> Vec<f64> {
    let mut frame = vec![0.0; layout.frame_length];
    (0..layout.num_frames(samples.len()))
        .map(|i| {
            layout.fill_frame(samples, i, &mut frame);
            let power = frame.iter().map(|x| x * x).sum::<f64>() / layout.frame_length as f64;
            power.sqrt()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate_sine(freq: f64, sample_rate: u32, num_samples: usize) -> Vec<f64> {
        (0..num_samples)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate as f64).sin())
            .collect()
    }

    #[test]
    fn test_stft_peak_bin() {
        let layout = FrameLayout::new(1024, 256).unwrap();
        let analyzer = StftAnalyzer::new(layout);
        // 16 kHz / 1024 = 15.625 Hz per bin; 250 Hz lands on bin 16
        let samples = generate_sine(250.0, 16000, 8000);
        let mut scratch = analyzer.make_scratch();
        let mid = analyzer.frame_magnitudes(&samples, layout.num_frames(samples.len()) / 2, &mut scratch);
        assert_eq!(mid.len(), analyzer.bin_count());

        let peak_bin = mid
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak_bin, 16);
        // Hann-windowed full-scale sine: |X| ~= N / 4
        assert!((mid[16] - 256.0).abs() < 5.0, "magnitude {}", mid[16]);
    }

    #[test]
    fn test_bin_freq_conversion() {
        let analyzer = StftAnalyzer::new(FrameLayout::new(2048, 512).unwrap());
        assert!((analyzer.bin_to_freq(10.0, 20480) - 100.0).abs() < 1e-9);
        assert!((analyzer.freq_to_bin(100.0, 20480) - 10.0).abs() < 1e-9);
        assert_eq!(analyzer.bin_count(), 1025);
    }

    #[test]
    fn test_frame_rms_of_silence_and_tone() {
        let layout = FrameLayout::new(512, 128).unwrap();
        assert!(frame_rms(&vec![0.0; 4000], layout).iter().all(|&r| r == 0.0));

        let tone = generate_sine(400.0, 16000, 16000);
        let rms = frame_rms(&tone, layout);
        let mid = rms[rms.len() / 2];
        assert!((mid - std::f64::consts::FRAC_1_SQRT_2).abs() < 0.02, "rms {}", mid);
    }
}
