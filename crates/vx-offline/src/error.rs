//! Error types for voice separation

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vx_core::CoreError;
use vx_pitch::PitchError;

/// Separation errors
#[derive(Error, Debug)]
pub enum SeparationError {
    #[error("Failed to decode audio: {0}")]
    Decode(String),

    #[error("Audio contains no samples")]
    EmptyAudio,

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Encoding error: {0}")]
    Encode(String),

    #[error("Separation cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pitch analysis error: {0}")]
    Pitch(#[from] PitchError),

    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

/// Coarse error category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Decode,
    EmptyAudio,
    Configuration,
    Encode,
    Cancelled,
    Io,
}

impl SeparationError {
    /// Category of this error.
    ///
    /// Parameter errors raised by the analysis crates count as configuration
    /// errors.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(_) => ErrorKind::Decode,
            Self::EmptyAudio => ErrorKind::EmptyAudio,
            Self::Configuration(_) | Self::Pitch(_) | Self::Core(_) => ErrorKind::Configuration,
            Self::Encode(_) => ErrorKind::Encode,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

/// Result type for separation operations
pub type SeparationResult<T> = Result<T, SeparationError>;
