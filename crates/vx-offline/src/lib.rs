//! VX-Offline: Pitch-Based Voice Separation Pipeline
//!
//! Splits a recording into per-voice tracks by dominant pitch:
//! - Decode any container symphonia reads, downmixed to mono
//! - Frame or segment pitch estimation
//! - Low/high threshold, target band, or detected-peak voice masks
//! - Mask smoothing, peak normalization, 16-bit quantization
//! - WAV or MP3 encoding, one buffer per voice
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                      SeparationPipeline                          │
//! │                                                                  │
//! │  ┌─────────┐   ┌────────────┐   ┌──────────┐   ┌─────────────┐  │
//! │  │ Scratch │ → │  Decoder   │ → │  Pitch   │ → │ Voice Masks │  │
//! │  │ (spool) │   │ (symphonia)│   │ (vx-pitch│   │  (policy)   │  │
//! │  └─────────┘   └────────────┘   └──────────┘   └─────────────┘  │
//! │                                                       ↓          │
//! │              ┌──────────┐   ┌─────────────┐   ┌─────────────┐   │
//! │              │ Encoder  │ ← │ Synthesizer │ ← │  Smoothing  │   │
//! │              └──────────┘   └─────────────┘   └─────────────┘   │
//! │                                                                  │
//! │  ┌─────────────────────────────────────────────────────────────┐ │
//! │  │                  BatchProcessor (rayon)                     │ │
//! │  │  [Job1] [Job2] [Job3] ... [JobN] → ThreadPool               │ │
//! │  └─────────────────────────────────────────────────────────────┘ │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use vx_offline::{MaskPolicy, SeparationConfig, SeparationPipeline};
//!
//! let config = SeparationConfig::default().with_policy(MaskPolicy::frame_threshold());
//! let mut pipeline = SeparationPipeline::new(config)?;
//!
//! let output = pipeline.separate(&bytes, Some("mp3"))?;
//! for voice in &output.voices {
//!     std::fs::write(format!("duet_{}.{}", voice.label, voice.extension), &voice.bytes)?;
//! }
//! ```

mod config;
mod decoder;
mod encoder;
mod error;
mod formats;
mod job;
mod mask;
mod pipeline;
mod scratch;
mod synthesis;

pub use config::*;
pub use decoder::*;
pub use encoder::*;
pub use error::*;
pub use formats::*;
pub use job::*;
pub use mask::*;
pub use pipeline::*;
pub use scratch::*;
pub use synthesis::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
