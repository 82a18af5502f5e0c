use std::path::PathBuf;
use thiserror::Error;

/// Every failure the challenge builder can surface.
///
/// Failures of the core (flag encoder, tiler, placement) are returned to the
/// caller. `ExternalToolFailure` is produced by the ffmpeg wrapper and the
/// pipeline only logs it before moving on to the next stage.
#[derive(Error, Debug)]
pub enum ChallengeError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Not an image: {path}: {reason}")]
    NotAnImage { path: PathBuf, reason: String },

    #[error("Not an audio file: {path}: {reason}")]
    NotAnAudioFile { path: PathBuf, reason: String },

    #[error("Invalid grid dimensions: {0}")]
    InvalidDimensions(String),

    #[error("{operation} failed: {reason}")]
    ExternalToolFailure { operation: String, reason: String },

    #[error("Frame I/O error on {path}: {reason}")]
    FrameIOError { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ChallengeResult<T> = Result<T, ChallengeError>;
