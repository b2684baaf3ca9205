use std::time::Duration;

use thiserror::Error;

/// All errors the trim wizard can produce
#[derive(Debug, Error)]
pub enum WizardError {
    /// A requested trim range violates ordering or track bounds
    #[error("Invalid trim range ({start}s to {end}s) for duration {duration}s")]
    InvalidRange { start: f64, end: f64, duration: f64 },

    /// The playback adapter never reported `ready` for the active source
    #[error("Loading '{source_url}' stalled after {:.1}s", .waited.as_secs_f64())]
    StalledLoad { source_url: String, waited: Duration },

    /// Failed to open or read the audio file from disk
    #[error("Failed to open audio file '{path}': {source}")]
    FileOpen {
        path: String,
        source: std::io::Error,
    },

    /// Error occurred while decoding the audio data
    #[error("Audio decoding failed: {0}")]
    DecodeFailed(String),

    /// Error occurred while writing a clip
    #[error("WAV encoding failed: {0}")]
    EncodeFailed(String),

    /// Output device or stream failure inside a playback adapter
    #[error("Playback failed: {0}")]
    Playback(String),

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog or config JSON could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from hound WAV encoder
    #[error("Hound WAV error: {0}")]
    Hound(#[from] hound::Error),
}

/// Convenient Result type that uses our WizardError
pub type Result<T> = std::result::Result<T, WizardError>;
