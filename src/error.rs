//! Error types for configuration loading and the demo host.

/// Errors surfaced outside the real-time path.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Malformed JSON configuration
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Output device could not be opened or played
    #[error("Audio device error: {0}")]
    AudioDevice(String),
}

pub type Result<T> = std::result::Result<T, Error>;
