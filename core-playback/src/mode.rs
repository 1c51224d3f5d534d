//! Mode flag providers.
//!
//! The controller reads the mode once per play request and never caches it,
//! so a settings change takes effect on the next song.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{PlaybackModeProvider, SettingsStore, SourceMode};
use std::sync::Arc;
use tracing::warn;

/// Settings key for the teaser flag.
pub const TEASER_MODE_KEY: &str = "playback.teaser_mode";

/// A fixed mode, for hosts that decide it once at startup and for tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticMode(pub SourceMode);

#[async_trait]
impl PlaybackModeProvider for StaticMode {
    async fn source_mode(&self) -> BridgeResult<SourceMode> {
        Ok(self.0)
    }
}

/// Reads the flag from [`TEASER_MODE_KEY`] on every call.
///
/// Accepts `"teaser"`, `"true"`, `"1"` and friends (see
/// [`SourceMode::from_flag`]). A missing key means `default`.
pub struct SettingsModeProvider {
    store: Arc<dyn SettingsStore>,
    default: SourceMode,
}

impl SettingsModeProvider {
    pub fn new(store: Arc<dyn SettingsStore>, default: SourceMode) -> Self {
        Self { store, default }
    }
}

#[async_trait]
impl PlaybackModeProvider for SettingsModeProvider {
    async fn source_mode(&self) -> BridgeResult<SourceMode> {
        Ok(self
            .store
            .get_string(TEASER_MODE_KEY)
            .await?
            .map(|flag| SourceMode::from_flag(&flag))
            .unwrap_or(self.default))
    }
}

/// Reads the mode, falling back to `default` if the provider fails.
pub(crate) async fn resolve_mode(
    provider: &dyn PlaybackModeProvider,
    default: SourceMode,
) -> SourceMode {
    match provider.source_mode().await {
        Ok(mode) => mode,
        Err(e) => {
            warn!(error = %e, default = ?default, "Failed to read playback mode; using default");
            default
        }
    }
}
