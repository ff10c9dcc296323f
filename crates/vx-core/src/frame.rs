//! Analysis frame geometry
//!
//! Frames are centered: frame `i` is centered on sample `i * hop_length` and
//! spans `frame_length` samples, zero-padded where it runs past either end of
//! the waveform. A waveform of `n > 0` samples yields `1 + n / hop_length`
//! frames.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Fixed-length, fixed-hop framing over a waveform's index space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLayout {
    /// Frame length in samples (also the FFT size)
    pub frame_length: usize,
    /// Hop between consecutive frame centers in samples
    pub hop_length: usize,
}

impl Default for FrameLayout {
    fn default() -> Self {
        Self {
            frame_length: 2048,
            hop_length: 512,
        }
    }
}

impl FrameLayout {
    /// Create a validated layout
    pub fn new(frame_length: usize, hop_length: usize) -> CoreResult<Self> {
        if frame_length == 0 || hop_length == 0 {
            return Err(CoreError::InvalidFrameLayout {
                frame_length,
                hop_length,
            });
        }
        Ok(Self {
            frame_length,
            hop_length,
        })
    }

    /// Number of frames covering `num_samples`
    #[inline]
    pub fn num_frames(&self, num_samples: usize) -> usize {
        if num_samples == 0 {
            0
        } else {
            1 + num_samples / self.hop_length
        }
    }

    /// Center sample of a frame
    #[inline]
    pub fn frame_center(&self, frame_index: usize) -> usize {
        frame_index * self.hop_length
    }

    /// First sample covered by a frame (may be negative: zero-padded region)
    #[inline]
    pub fn frame_start(&self, frame_index: usize) -> isize {
        self.frame_center(frame_index) as isize - (self.frame_length / 2) as isize
    }

    /// Copy frame `frame_index` of `samples` into `out`, zero-padding outside
    /// the signal. `out` must be `frame_length` long.
    pub fn fill_frame(&self, samples: &[f64], frame_index: usize, out: &mut [f64]) {
        debug_assert_eq!(out.len(), self.frame_length);
        let start = self.frame_start(frame_index);
        for (i, slot) in out.iter_mut().enumerate() {
            let idx = start + i as isize;
            *slot = if idx >= 0 && (idx as usize) < samples.len() {
                samples[idx as usize]
            } else {
                0.0
            };
        }
    }

    /// Expand a per-frame array to exactly `num_samples` values.
    ///
    /// Each frame value is repeated `hop_length` times. The result is
    /// truncated, or padded by holding the last value, to `num_samples`.
    pub fn upsample(&self, per_frame: &[f64], num_samples: usize) -> Vec<f64> {
        let mut out = Vec::with_capacity(num_samples);
        for &value in per_frame {
            if out.len() >= num_samples {
                break;
            }
            let take = self.hop_length.min(num_samples - out.len());
            out.extend(std::iter::repeat_n(value, take));
        }
        let fill = per_frame.last().copied().unwrap_or(0.0);
        out.resize(num_samples, fill);
        out
    }
}
