//! Clip-wide pitch distribution
//!
//! Histograms the voiced frame pitches of a clip, smooths the histogram with
//! a normalized Hamming kernel and picks its dominant peaks. The peaks are
//! candidate targets for band masking.

use serde::{Deserialize, Serialize};
use vx_dsp::{convolve_same, window};

use crate::{PitchError, PitchEstimate, PitchResult};

/// Histogram and peak-picking parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DistributionConfig {
    /// Number of histogram bins
    pub bins: usize,
    /// Lower histogram edge (Hz)
    pub min_hz: f64,
    /// Upper histogram edge (Hz, inclusive)
    pub max_hz: f64,
    /// Hamming kernel width (bins)
    pub smoothing_width: usize,
    /// Minimum distance between reported peaks (bins)
    pub min_separation_bins: usize,
    /// Minimum prominence as a fraction of the smoothed maximum
    pub prominence_ratio: f64,
    /// Number of peaks reported
    pub max_peaks: usize,
}

impl Default for DistributionConfig {
    fn default() -> Self {
        Self {
            bins: 100,
            min_hz: 50.0,
            max_hz: 400.0,
            smoothing_width: 10,
            min_separation_bins: 20,
            prominence_ratio: 0.1,
            max_peaks: 2,
        }
    }
}

impl DistributionConfig {
    pub fn validate(&self) -> PitchResult<()> {
        if self.bins == 0 {
            return Err(PitchError::InvalidParameter(
                "histogram needs at least one bin".into(),
            ));
        }
        if !(self.min_hz >= 0.0 && self.max_hz > self.min_hz) {
            return Err(PitchError::InvalidFrequencyRange {
                min: self.min_hz,
                max: self.max_hz,
            });
        }
        if self.smoothing_width == 0 {
            return Err(PitchError::InvalidParameter(
                "smoothing_width must be at least 1".into(),
            ));
        }
        if !(self.prominence_ratio >= 0.0) {
            return Err(PitchError::InvalidParameter(format!(
                "prominence_ratio must be >= 0, got {}",
                self.prominence_ratio
            )));
        }
        Ok(())
    }

    pub fn with_range(mut self, min_hz: f64, max_hz: f64) -> Self {
        self.min_hz = min_hz;
        self.max_hz = max_hz;
        self
    }

    pub fn with_max_peaks(mut self, max_peaks: usize) -> Self {
        self.max_peaks = max_peaks;
        self
    }

    pub fn with_min_separation(mut self, bins: usize) -> Self {
        self.min_separation_bins = bins;
        self
    }

    /// Width of one bin (Hz)
    pub fn bin_width(&self) -> f64 {
        (self.max_hz - self.min_hz) / self.bins as f64
    }
}

/// One dominant pitch of the clip
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchPeak {
    /// Bin center (Hz)
    pub frequency: f64,
    /// Smoothed histogram height
    pub height: f64,
    /// Raw frame count in the bin
    pub count: usize,
    /// Height above the higher of the two surrounding minima
    pub prominence: f64,
    pub bin: usize,
}

/// Histogram, smoothed histogram and peaks of one clip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionAnalysis {
    /// `bins + 1` edges (Hz)
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
    pub smoothed: Vec<f64>,
    /// Sorted by descending height
    pub peaks: Vec<PitchPeak>,
}

impl DistributionAnalysis {
    /// Frames that landed inside the histogram range
    pub fn total_count(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Center frequency of every bin
    pub fn bin_centers(&self) -> Vec<f64> {
        self.edges.windows(2).map(|e| 0.5 * (e[0] + e[1])).collect()
    }
}

/// Histogram peak finder
#[derive(Debug, Clone)]
pub struct DistributionAnalyzer {
    config: DistributionConfig,
    kernel: Vec<f64>,
}

impl DistributionAnalyzer {
    pub fn new(config: DistributionConfig) -> PitchResult<Self> {
        config.validate()?;
        Ok(Self {
            kernel: window::normalized(window::hamming(config.smoothing_width)),
            config,
        })
    }

    pub fn config(&self) -> &DistributionConfig {
        &self.config
    }

    /// Analyze the valid estimates of a frame track
    pub fn analyze(&self, track: &[PitchEstimate], min_magnitude: f64) -> DistributionAnalysis {
        let voiced: Vec<f64> = track.iter().filter_map(|e| e.voiced(min_magnitude)).collect();
        self.from_frequencies(&voiced)
    }

    /// Analyze raw frequencies (Hz)
    pub fn from_frequencies(&self, frequencies: &[f64]) -> DistributionAnalysis {
        let counts = self.histogram(frequencies);
        let raw: Vec<f64> = counts.iter().map(|&c| c as f64).collect();
        let smoothed = convolve_same(&raw, &self.kernel);

        let width = self.config.bin_width();
        let mut peaks: Vec<PitchPeak> = self
            .find_peaks(&smoothed)
            .into_iter()
            .map(|(bin, prominence)| PitchPeak {
                frequency: self.config.min_hz + (bin as f64 + 0.5) * width,
                height: smoothed[bin],
                count: counts[bin],
                prominence,
                bin,
            })
            .collect();

        peaks.sort_by(|a, b| b.height.total_cmp(&a.height).then(a.bin.cmp(&b.bin)));
        peaks.truncate(self.config.max_peaks);

        log::debug!(
            "Pitch distribution: {} of {} frames in range, {} peak(s)",
            counts.iter().sum::<usize>(),
            frequencies.len(),
            peaks.len()
        );

        DistributionAnalysis {
            edges: (0..=self.config.bins)
                .map(|i| self.config.min_hz + i as f64 * width)
                .collect(),
            counts,
            smoothed,
            peaks,
        }
    }

    fn histogram(&self, frequencies: &[f64]) -> Vec<usize> {
        let DistributionConfig {
            bins,
            min_hz,
            max_hz,
            ..
        } = self.config;
        let width = self.config.bin_width();
        let mut counts = vec![0usize; bins];

        for &f in frequencies {
            if !(f >= min_hz && f <= max_hz) {
                continue;
            }
            // Right edge belongs to the last bin
            let bin = (((f - min_hz) / width) as usize).min(bins - 1);
            counts[bin] += 1;
        }
        counts
    }

    /// Qualifying peaks as `(bin, prominence)`, in bin order
    fn find_peaks(&self, x: &[f64]) -> Vec<(usize, f64)> {
        let maxima = local_maxima(x);
        let kept = filter_by_distance(&maxima, x, self.config.min_separation_bins);

        let global_max = x.iter().copied().fold(0.0, f64::max);
        let min_prominence = self.config.prominence_ratio * global_max;

        kept.into_iter()
            .map(|bin| (bin, prominence(x, bin)))
            .filter(|&(_, p)| p >= min_prominence && p > 0.0)
            .collect()
    }
}

/// Strict local maxima; a flat top reports its middle (left of center when even).
/// The first and last samples never qualify.
fn local_maxima(x: &[f64]) -> Vec<usize> {
    let mut peaks = Vec::new();
    if x.len() < 3 {
        return peaks;
    }

    let last = x.len() - 1;
    let mut i = 1;
    while i < last {
        if x[i - 1] < x[i] {
            let mut ahead = i + 1;
            while ahead < last && x[ahead] == x[i] {
                ahead += 1;
            }
            if x[ahead] < x[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

/// Drop peaks closer than `distance` bins to a taller one
fn filter_by_distance(peaks: &[usize], x: &[f64], distance: usize) -> Vec<usize> {
    if distance <= 1 {
        return peaks.to_vec();
    }

    let mut keep = vec![true; peaks.len()];
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| x[peaks[b]].total_cmp(&x[peaks[a]]).then(a.cmp(&b)));

    for j in order {
        if !keep[j] {
            continue;
        }
        for k in (0..j).rev() {
            if peaks[j] - peaks[k] >= distance {
                break;
            }
            keep[k] = false;
        }
        for k in j + 1..peaks.len() {
            if peaks[k] - peaks[j] >= distance {
                break;
            }
            keep[k] = false;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, k)| k.then_some(p))
        .collect()
}

/// Height of `peak` above the higher of its left and right bases
fn prominence(x: &[f64], peak: usize) -> f64 {
    let height = x[peak];

    let mut left_min = height;
    for &v in x[..=peak].iter().rev() {
        if v > height {
            break;
        }
        left_min = left_min.min(v);
    }

    let mut right_min = height;
    for &v in &x[peak..] {
        if v > height {
            break;
        }
        right_min = right_min.min(v);
    }

    height - left_min.max(right_min)
}
