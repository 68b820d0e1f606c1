//! Encoding formats offered by the catalog and their file extensions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Encoding format requested from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AudioFormat {
    AacHi,
    AiffLossless,
    Alac,
    Flac,
    #[default]
    #[serde(rename = "mp3-320")]
    Mp3_320,
    #[serde(rename = "mp3-v0")]
    Mp3V0,
    Vorbis,
    Wav,
}

impl AudioFormat {
    pub const ALL: [AudioFormat; 8] = [
        AudioFormat::AacHi,
        AudioFormat::AiffLossless,
        AudioFormat::Alac,
        AudioFormat::Flac,
        AudioFormat::Mp3_320,
        AudioFormat::Mp3V0,
        AudioFormat::Vorbis,
        AudioFormat::Wav,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AudioFormat::AacHi => "aac-hi",
            AudioFormat::AiffLossless => "aiff-lossless",
            AudioFormat::Alac => "alac",
            AudioFormat::Flac => "flac",
            AudioFormat::Mp3_320 => "mp3-320",
            AudioFormat::Mp3V0 => "mp3-v0",
            AudioFormat::Vorbis => "vorbis",
            AudioFormat::Wav => "wav",
        }
    }

    /// Extension of a single-track download in this format.
    pub fn extension(self) -> &'static str {
        match self {
            AudioFormat::AacHi | AudioFormat::Alac => ".m4a",
            AudioFormat::AiffLossless => ".aiff",
            AudioFormat::Flac => ".flac",
            AudioFormat::Mp3_320 | AudioFormat::Mp3V0 => ".mp3",
            AudioFormat::Vorbis => ".ogg",
            AudioFormat::Wav => ".wav",
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AudioFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AudioFormat::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("unknown format: {}", s))
    }
}

/// Longest URL extension taken over, dot included.
const MAX_URL_EXTENSION: usize = 10;

/// Extension (with leading dot) of the last URL path segment, if any.
pub fn extension_from_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let segment = parsed.path().rsplit('/').next()?;
    let dot = segment.rfind('.')?;
    let ext = &segment[dot..];
    if ext.len() <= 1
        || ext.len() > MAX_URL_EXTENSION
        || !ext[1..].bytes().all(|b| b.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_string())
}
