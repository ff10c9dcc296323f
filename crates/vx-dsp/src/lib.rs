//! vx-dsp: DSP building blocks for VoxSplit
//!
//! ## Modules
//! - `window` - Hann and Hamming windows
//! - `smoothing` - "same"-mode convolution and moving-average mask smoothing
//! - `analysis` - STFT magnitude frames and frame RMS

pub mod analysis;
pub mod smoothing;
pub mod window;

pub use analysis::{frame_rms, StftAnalyzer, StftScratch};
pub use smoothing::{convolve_same, MovingAverage};
