//! Remote mark recorder contract.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Kind of interaction being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkKind {
    /// Teaser listened to.
    Teaser,
    /// Song purchased.
    Purchase,
    /// Full play-through completed.
    Play,
}

impl MarkKind {
    /// Wire name of the mark.
    pub fn as_str(&self) -> &'static str {
        match self {
            MarkKind::Teaser => "teaser",
            MarkKind::Purchase => "purchase",
            MarkKind::Play => "play",
        }
    }

    /// Returns `true` for marks that should be recorded at most once per
    /// actor and song for the lifetime of the install.
    pub fn is_lifetime_once(&self) -> bool {
        matches!(self, MarkKind::Teaser | MarkKind::Purchase)
    }
}

impl fmt::Display for MarkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload sent to the recorder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkRequest {
    pub actor_id: String,
    /// Present only when the actor is authenticated.
    pub user_id: Option<String>,
    pub song_id: String,
    #[serde(rename = "mark")]
    pub kind: MarkKind,
}

impl MarkRequest {
    pub fn new(
        actor_id: impl Into<String>,
        user_id: Option<String>,
        song_id: impl Into<String>,
        kind: MarkKind,
    ) -> Self {
        Self {
            actor_id: actor_id.into(),
            user_id,
            song_id: song_id.into(),
            kind,
        }
    }
}

/// Aggregate counters returned by the recorder. Opaque to the core beyond logging.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkResult {
    /// Total marks recorded for the song, when reported.
    #[serde(default)]
    pub total_marks: Option<u64>,
    /// Any additional counters the backend returns.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Records interaction marks against a remote backend.
///
/// Implementations perform a single attempt; retry policy belongs to callers.
#[async_trait::async_trait]
pub trait RemoteMarkRecorder: Send + Sync {
    /// Human-readable recorder name used in logs.
    fn name(&self) -> &str;

    /// Record one mark.
    async fn record(&self, request: MarkRequest) -> Result<MarkResult>;
}
