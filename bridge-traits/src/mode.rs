//! Source mode flag.

use crate::error::Result;
use serde::{Deserialize, Serialize};

/// Which source the selector should prefer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Play the teaser when the song has one.
    TeaserPreferred,
    /// Always play the full source.
    #[default]
    FullOnly,
}

impl SourceMode {
    /// Interpret a loosely-typed host flag (`"teaser"`, `"true"`, `"1"` mean
    /// teaser preferred; anything else is full only).
    pub fn from_flag(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "teaser" | "teaser_preferred" | "true" | "1" | "yes" => SourceMode::TeaserPreferred,
            _ => SourceMode::FullOnly,
        }
    }

    pub fn from_bool(teaser_preferred: bool) -> Self {
        if teaser_preferred {
            SourceMode::TeaserPreferred
        } else {
            SourceMode::FullOnly
        }
    }

    pub fn is_teaser_preferred(&self) -> bool {
        matches!(self, SourceMode::TeaserPreferred)
    }
}

/// Externally owned mode flag, read once per play request and never cached
/// by the core.
#[async_trait::async_trait]
pub trait PlaybackModeProvider: Send + Sync {
    async fn source_mode(&self) -> Result<SourceMode>;
}
