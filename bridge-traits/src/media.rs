//! Media engine bridge traits.
//!
//! The engine turns a locator (URI string) into a live, decodable handle. The
//! core never sees decoder internals: it only creates handles, drives their
//! transport controls and listens to their status stream. Every operation is
//! async and individually fallible.

use crate::error::Result;
use futures::stream::BoxStream;
use std::sync::Arc;

/// Point-in-time status reported by a [`MediaHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MediaStatus {
    /// Current position in milliseconds.
    pub position_ms: u64,
    /// Total duration in milliseconds, `0` while unknown.
    pub duration_ms: u64,
    /// Whether audio is currently audible.
    pub is_playing: bool,
}

/// Periodic status notification delivered through [`MediaHandle::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusUpdate {
    pub position_ms: u64,
    pub duration_ms: u64,
    pub is_playing: bool,
    /// Set on the update that reports natural end of stream. Some engines
    /// emit more than one of these per handle.
    pub did_just_finish: bool,
}

impl StatusUpdate {
    /// Ordinary progress update.
    pub fn progress(position_ms: u64, duration_ms: u64) -> Self {
        Self {
            position_ms,
            duration_ms,
            is_playing: true,
            did_just_finish: false,
        }
    }

    /// Terminal update reporting natural completion.
    pub fn finished(duration_ms: u64) -> Self {
        Self {
            position_ms: duration_ms,
            duration_ms,
            is_playing: false,
            did_just_finish: true,
        }
    }
}

impl From<StatusUpdate> for MediaStatus {
    fn from(update: StatusUpdate) -> Self {
        Self {
            position_ms: update.position_ms,
            duration_ms: update.duration_ms,
            is_playing: update.is_playing,
        }
    }
}

/// Stream of status updates for one handle. It ends when the handle is unloaded.
pub type StatusStream = BoxStream<'static, StatusUpdate>;

/// Factory for decodable audio handles.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::media::MediaEngine;
///
/// async fn load(engine: &dyn MediaEngine) -> bridge_traits::error::Result<()> {
///     let handle = engine.create("https://cdn.example.com/teaser.mp3").await?;
///     let status = handle.status().await?;
///     println!("duration: {}ms", status.duration_ms);
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait MediaEngine: Send + Sync {
    /// Load `locator` and start playing it.
    ///
    /// # Errors
    ///
    /// Returns an error if the locator cannot be fetched or decoded.
    async fn create(&self, locator: &str) -> Result<Arc<dyn MediaHandle>>;
}

/// A single loaded audio source.
#[async_trait::async_trait]
pub trait MediaHandle: Send + Sync {
    /// Query the current status.
    async fn status(&self) -> Result<MediaStatus>;

    /// Subscribe to periodic status updates.
    fn subscribe(&self) -> StatusStream;

    /// Start or resume playback.
    async fn play(&self) -> Result<()>;

    /// Pause playback, keeping the position.
    async fn pause(&self) -> Result<()>;

    /// Seek to an absolute position in milliseconds.
    async fn set_position(&self, position_ms: u64) -> Result<()>;

    /// Stop playback.
    async fn stop(&self) -> Result<()>;

    /// Release decoder resources. The handle is unusable afterwards.
    async fn unload(&self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_update_reports_full_position() {
        let update = StatusUpdate::finished(30_000);
        assert!(update.did_just_finish);
        assert!(!update.is_playing);
        assert_eq!(update.position_ms, 30_000);
    }

    #[test]
    fn status_from_update_drops_finish_flag() {
        let status: MediaStatus = StatusUpdate::progress(1_500, 30_000).into();
        assert_eq!(
            status,
            MediaStatus {
                position_ms: 1_500,
                duration_ms: 30_000,
                is_playing: true,
            }
        );
    }
}
