//! Error types for the player core.
//!
//! Only [`PlayerError::ContainerMissing`] and [`PlayerError::MediaLoad`] ever reach a
//! caller. Waveform generation failures are recovered inside `load` and only logged.

use thiserror::Error;

/// Failures reported by a [`MediaElement`](crate::media::MediaElement).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MediaError {
    #[error("no media source assigned")]
    NoSource,
    #[error("failed to open media source {url}: {reason}")]
    Open { url: String, reason: String },
    #[error("media source could not be decoded: {0}")]
    Decode(String),
    #[error("audio output unavailable: {0}")]
    Output(String),
    #[error("seek failed: {0}")]
    Seek(String),
}

/// Failures while fetching or decoding raw audio for peak extraction.
#[derive(Debug, Error)]
pub enum WaveformError {
    #[error("HTTP error! status: {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("i/o error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("decode error: {0}")]
    Decode(#[from] symphonia::core::errors::Error),
    #[error("no supported audio tracks found")]
    NoTrack,
}

impl From<ureq::Error> for WaveformError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => WaveformError::Status(code),
            other => WaveformError::Network(other.to_string()),
        }
    }
}

/// Errors surfaced by the public player API.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlayerError {
    #[error("WaveformPlayer: Container element not found: {0}")]
    ContainerMissing(String),
    #[error(transparent)]
    MediaLoad(#[from] MediaError),
    #[error("player {0} has been destroyed")]
    Destroyed(String),
}

/// Errors reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub type Result<T, E = PlayerError> = std::result::Result<T, E>;
