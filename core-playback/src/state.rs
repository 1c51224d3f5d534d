//! Public playback state.

use crate::song::Song;
use serde::{Deserialize, Serialize};

/// Snapshot of what the controller is doing, as observers see it.
///
/// Reflects the most recently issued request's intent as soon as it is
/// issued, and its outcome once the load resolves.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub current_song: Option<Song>,
    pub is_playing: bool,
    pub position_ms: u64,
    pub duration_ms: u64,
}

impl PlaybackState {
    pub(crate) fn reset_progress(&mut self) {
        self.position_ms = 0;
        self.duration_ms = 0;
    }
}

/// Lifecycle of the single handle slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No handle and no load in flight.
    Idle,
    /// The request with this token is selecting or loading a source.
    Loading(u64),
    /// A handle created for this token is installed, playing or paused.
    Active(u64),
}

impl SessionPhase {
    pub fn token(&self) -> Option<u64> {
        match self {
            SessionPhase::Idle => None,
            SessionPhase::Loading(token) | SessionPhase::Active(token) => Some(*token),
        }
    }
}
