//! Error types for the Murmur runtime

use thiserror::Error;

/// Result type alias for Murmur operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Murmur runtime
///
/// Nothing here is fatal to the capture pipeline: hardware and classifier
/// errors are retried on the next loop iteration, upload errors abort only
/// the current pipeline run.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio hardware error (device open, frame read, playback)
    #[error("audio error: {0}")]
    Audio(String),

    /// Wake classifier error (transient, result discarded)
    #[error("classifier error: {0}")]
    Classifier(String),

    /// Network connectivity unavailable
    #[error("connectivity unavailable: {0}")]
    Connectivity(String),

    /// Upload pipeline error (transport or service failure)
    #[error("upload error: {0}")]
    Upload(String),

    /// Response parsing error
    #[error("parse error: {0}")]
    Parse(String),

    /// Persistent storage error
    #[error("storage error: {0}")]
    Storage(String),

    /// WAV encode/decode error
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
