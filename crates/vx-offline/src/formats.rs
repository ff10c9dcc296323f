//! Output format definitions

use serde::{Deserialize, Serialize};

/// Output container
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutputFormat {
    /// 16-bit PCM WAV
    Wav,
    /// MP3 (lossy)
    Mp3(Mp3Config),
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Wav
    }
}

impl OutputFormat {
    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3(_) => "mp3",
        }
    }

    /// MP3 at a constant bitrate (kbps)
    pub fn mp3_cbr(kbps: u32) -> Self {
        Self::Mp3(Mp3Config {
            bitrate: Mp3Bitrate::Cbr(kbps),
        })
    }

    /// MP3 at a VBR quality (0 = best, 9 = worst)
    pub fn mp3_vbr(quality: u8) -> Self {
        Self::Mp3(Mp3Config {
            bitrate: Mp3Bitrate::Vbr(quality),
        })
    }

    /// MP3 192kbps
    pub fn mp3_192() -> Self {
        Self::mp3_cbr(192)
    }

    /// Parse a format name (`wav` or `mp3`)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "wav" => Some(Self::Wav),
            "mp3" => Some(Self::mp3_192()),
            _ => None,
        }
    }
}

/// MP3 configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mp3Config {
    pub bitrate: Mp3Bitrate,
}

impl Default for Mp3Config {
    fn default() -> Self {
        Self {
            bitrate: Mp3Bitrate::Cbr(192),
        }
    }
}

/// MP3 bitrate mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mp3Bitrate {
    /// Constant bitrate (96-320 kbps)
    Cbr(u32),
    /// Variable bitrate quality (0-9)
    Vbr(u8),
}

impl Mp3Bitrate {
    pub fn is_valid(&self) -> bool {
        match *self {
            Self::Cbr(kbps) => (96..=320).contains(&kbps),
            Self::Vbr(q) => q <= 9,
        }
    }
}
