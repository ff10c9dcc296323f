//! Error types for pitch engine

use thiserror::Error;
use vx_core::CoreError;

/// Pitch engine errors
#[derive(Debug, Error)]
pub enum PitchError {
    /// Invalid sample rate
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    /// Invalid frequency range
    #[error("Invalid frequency range: {min} - {max} Hz")]
    InvalidFrequencyRange { min: f64, max: f64 },

    /// Parameter outside its valid domain
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Frame geometry rejected by core
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Result type for pitch operations
pub type PitchResult<T> = Result<T, PitchError>;
