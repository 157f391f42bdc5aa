//! Error types for barwave
//!
//! Every failure a waveform can report flows through [`WaveformError`]:
//! construction problems, rejected mutations, input-handling failures and
//! render failures alike. Drawing primitives fail with [`SurfaceError`],
//! which converts into `WaveformError` so render code can use `?`.

use std::any::Any;

use thiserror::Error;

/// Message used when a failure carries no usable description
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

/// Errors reported by a waveform instance
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WaveformError {
    #[error("No surface host was provided")]
    MissingHost,

    #[error("Invalid surface host: {0}")]
    InvalidHost(String),

    #[error("Peaks must be a non-empty sequence of numbers")]
    EmptyPeaks,

    #[error("Failed to acquire a 2D drawing context")]
    ContextUnavailable,

    #[error("No frame or timer scheduler was provided")]
    MissingScheduler,

    #[error("Drawing operation failed: {0}")]
    Surface(#[from] SurfaceError),

    #[error("Render hook failed: {0}")]
    Hook(String),

    #[error("Callback failed: {0}")]
    Callback(String),

    #[error("An unknown error occurred")]
    Unknown,
}

impl WaveformError {
    /// Normalize a panic payload into an error value
    ///
    /// String payloads keep their message; anything else becomes
    /// [`WaveformError::Unknown`]. Payloads that already are a
    /// `WaveformError` are passed through unchanged.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        if let Some(err) = payload.downcast_ref::<WaveformError>() {
            return err.clone();
        }
        if let Some(msg) = payload.downcast_ref::<&str>() {
            return WaveformError::Callback((*msg).to_string());
        }
        if let Some(msg) = payload.downcast_ref::<String>() {
            return WaveformError::Callback(msg.clone());
        }
        WaveformError::Unknown
    }

    /// Whether the instance that produced this error can no longer be used
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WaveformError::MissingHost
                | WaveformError::InvalidHost(_)
                | WaveformError::ContextUnavailable
                | WaveformError::MissingScheduler
        )
    }
}

/// Errors raised by drawing surface primitives
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    #[error("Primitive not supported by this surface: {0}")]
    Unsupported(&'static str),

    #[error("Unbalanced restore: no saved state")]
    UnbalancedRestore,

    #[error("{0}")]
    Backend(String),
}

/// Invalid color string in a style definition
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid color: {0:?} (expected #rgb, #rrggbb or #rrggbbaa)")]
pub struct ColorParseError(pub String);

pub type Result<T> = std::result::Result<T, WaveformError>;
