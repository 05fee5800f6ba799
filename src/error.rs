//! Error types.
//!
//! Only two things can fail loudly: opening an audio source, and loading a
//! configuration. Everything downstream of a running source resolves to a
//! safe default instead (see [`crate::events::PipelineFault`]).

use thiserror::Error;

/// Failure to open or run an audio source. Returned before any frame is
/// produced; the emotion side of the session keeps working.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no audio input device available")]
    NoDevice,

    #[error("audio device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("audio capture permission denied: {0}")]
    PermissionDenied(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("failed to read WAV input: {0}")]
    Wav(#[from] hound::Error),

    #[error("invalid frame size: {0}")]
    InvalidFrameSize(usize),

    #[error("lip sync is already running")]
    AlreadyRunning,

    #[error("failed to spawn audio thread: {0}")]
    ThreadSpawn(String),
}

/// Invalid configuration input.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}
