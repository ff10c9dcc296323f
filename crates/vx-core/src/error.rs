//! Error types for VoxSplit core types

use thiserror::Error;

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    #[error("Invalid frame layout: frame_length={frame_length}, hop_length={hop_length}")]
    InvalidFrameLayout {
        frame_length: usize,
        hop_length: usize,
    },
}

/// Result type alias
pub type CoreResult<T> = Result<T, CoreError>;
