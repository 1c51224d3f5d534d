//! # Playback Error Types
//!
//! Errors raised inside the playback core. Public controller operations never
//! return them; they are logged and converted into a safe state at the
//! boundary.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// Neither locator of the song is usable. Callers treat this as
    /// "nothing to play".
    #[error("No playable source for song {0}")]
    NoPlayableSource(String),

    /// The media engine could not create a handle for the locator.
    #[error("Failed to load {locator}: {message}")]
    EngineLoad { locator: String, message: String },

    /// A play/pause/seek/stop call on a live handle failed.
    #[error("Engine control failed: {0}")]
    EngineControl(String),

    /// Attempted a handle operation with nothing installed.
    #[error("No active media handle")]
    NoActiveHandle,

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Wrap a failed call on a live handle.
    pub fn control(err: &BridgeError) -> Self {
        PlaybackError::EngineControl(err.to_string())
    }

    /// Returns `true` if the media engine reported the failure.
    pub fn is_engine_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::EngineLoad { .. } | PlaybackError::EngineControl(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
