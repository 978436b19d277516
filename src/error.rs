//! Error types for the parlance voice client

use thiserror::Error;

/// Result type alias for parlance operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice client
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Microphone access denied or no usable input device.
    /// Fatal to the capture loop; surfaced once.
    #[error("microphone unavailable: {0}")]
    PermissionDenied(String),

    /// Audio device/stream error
    #[error("audio error: {0}")]
    Audio(String),

    /// Input rejected before any network call (empty keyword, missing file)
    #[error("validation error: {0}")]
    Validation(String),

    /// Enrollment recording stopped before the minimum duration
    #[error("enrollment recording too short: {elapsed_secs}s recorded, {min_secs}s required")]
    EnrollmentTooShort {
        /// Seconds actually recorded
        elapsed_secs: u64,
        /// Minimum required seconds
        min_secs: u64,
    },

    /// Request failed before a structured reply was received
    #[error("transport error: {0}")]
    Transport(String),

    /// Structured failure returned by the assistant server
    #[error("server error: {0}")]
    Server(String),

    /// Clip decode or output-stream failure; never fatal to a session
    #[error("playback error: {0}")]
    Playback(String),

    /// WebSocket channel error
    #[error("channel error: {0}")]
    Channel(String),

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
