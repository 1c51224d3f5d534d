//! # Core Configuration
//!
//! Collects the host-provided bridges and tuning knobs the playback core
//! needs, and validates them before anything is started.
//!
//! ## Required bridges
//!
//! - [`MediaEngine`]: creates decodable handles from locators
//! - [`RemoteMarkRecorder`]: records completion/interaction marks
//! - [`SettingsStore`]: persists the mark ledger and the anonymous actor id
//!
//! ## Optional bridges
//!
//! - [`ActorIdentityProvider`]: defaults to a settings-backed anonymous identity
//! - [`PlaybackModeProvider`]: defaults to the `playback.teaser_mode` setting
//! - [`Clock`]: defaults to [`SystemClock`]
//!
//! ## Example
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .media_engine(engine)
//!     .mark_recorder(recorder)
//!     .settings_store(settings)
//!     .progress_throttle(Duration::from_millis(250))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use crate::logging::LoggingConfig;
use bridge_traits::{
    ActorIdentityProvider, Clock, MediaEngine, PlaybackModeProvider, RemoteMarkRecorder,
    SettingsStore, SourceMode, SystemClock,
};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default interval between two throttled progress notifications.
pub const DEFAULT_PROGRESS_THROTTLE: Duration = Duration::from_millis(100);

/// Upper bound accepted for [`PlaybackSettings::progress_throttle`].
pub const MAX_PROGRESS_THROTTLE: Duration = Duration::from_secs(10);

/// Tuning knobs for the playback session controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackSettings {
    /// Minimum interval between two progress updates published to observers.
    /// Finish updates are never throttled.
    pub progress_throttle: Duration,
    /// Mode used when the mode provider fails or none is configured.
    pub default_mode: SourceMode,
    /// Capacity of the event bus channel.
    pub event_buffer_size: usize,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            progress_throttle: DEFAULT_PROGRESS_THROTTLE,
            default_mode: SourceMode::FullOnly,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl PlaybackSettings {
    pub fn validate(&self) -> Result<()> {
        if self.progress_throttle.is_zero() {
            return Err(Error::Config(
                "Progress throttle must be greater than zero".to_string(),
            ));
        }

        if self.progress_throttle > MAX_PROGRESS_THROTTLE {
            return Err(Error::Config(format!(
                "Progress throttle of {:?} exceeds maximum of {:?}",
                self.progress_throttle, MAX_PROGRESS_THROTTLE
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Validated configuration for the playback core.
///
/// Built through [`CoreConfig::builder()`].
#[derive(Clone)]
pub struct CoreConfig {
    pub media_engine: Arc<dyn MediaEngine>,
    pub mark_recorder: Arc<dyn RemoteMarkRecorder>,
    pub settings_store: Arc<dyn SettingsStore>,
    /// `None` means the service installs its persistent anonymous identity.
    pub identity_provider: Option<Arc<dyn ActorIdentityProvider>>,
    /// `None` means the service reads the mode from the settings store.
    pub mode_provider: Option<Arc<dyn PlaybackModeProvider>>,
    pub clock: Arc<dyn Clock>,
    /// `None` leaves global logging untouched.
    pub logging: Option<LoggingConfig>,
    pub playback: PlaybackSettings,
}

impl fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoreConfig")
            .field("media_engine", &"<MediaEngine>")
            .field("mark_recorder", &self.mark_recorder.name())
            .field("settings_store", &"<SettingsStore>")
            .field(
                "identity_provider",
                &self.identity_provider.as_ref().map(|_| "<ActorIdentityProvider>"),
            )
            .field(
                "mode_provider",
                &self.mode_provider.as_ref().map(|_| "<PlaybackModeProvider>"),
            )
            .field("logging", &self.logging)
            .field("playback", &self.playback)
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.playback.validate()
    }
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// [`build()`](CoreConfigBuilder::build) names the first missing bridge in
/// its error so hosts know exactly what to inject.
#[derive(Default)]
pub struct CoreConfigBuilder {
    media_engine: Option<Arc<dyn MediaEngine>>,
    mark_recorder: Option<Arc<dyn RemoteMarkRecorder>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    identity_provider: Option<Arc<dyn ActorIdentityProvider>>,
    mode_provider: Option<Arc<dyn PlaybackModeProvider>>,
    clock: Option<Arc<dyn Clock>>,
    logging: Option<LoggingConfig>,
    playback: PlaybackSettings,
}

impl CoreConfigBuilder {
    pub fn media_engine(mut self, engine: Arc<dyn MediaEngine>) -> Self {
        self.media_engine = Some(engine);
        self
    }

    pub fn mark_recorder(mut self, recorder: Arc<dyn RemoteMarkRecorder>) -> Self {
        self.mark_recorder = Some(recorder);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    /// Overrides the default persistent anonymous identity.
    pub fn identity_provider(mut self, provider: Arc<dyn ActorIdentityProvider>) -> Self {
        self.identity_provider = Some(provider);
        self
    }

    /// Overrides the settings-backed mode flag.
    pub fn mode_provider(mut self, provider: Arc<dyn PlaybackModeProvider>) -> Self {
        self.mode_provider = Some(provider);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Installs global logging when the service starts.
    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    pub fn progress_throttle(mut self, interval: Duration) -> Self {
        self.playback.progress_throttle = interval;
        self
    }

    pub fn default_mode(mut self, mode: SourceMode) -> Self {
        self.playback.default_mode = mode;
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.playback.event_buffer_size = size;
        self
    }

    /// Builds the final `CoreConfig` instance.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] if a required bridge was not provided
    /// - [`Error::Config`] if a playback setting is out of range
    pub fn build(self) -> Result<CoreConfig> {
        let media_engine = self.media_engine.ok_or_else(|| {
            Error::missing(
                "MediaEngine",
                "A MediaEngine implementation is required to create audio handles. \
                 Inject the host's audio engine with .media_engine().",
            )
        })?;

        let mark_recorder = self.mark_recorder.ok_or_else(|| {
            Error::missing(
                "RemoteMarkRecorder",
                "A RemoteMarkRecorder is required to record completion marks. \
                 Desktop: use bridge_desktop::HttpMarkRecorder. \
                 Other hosts: inject a platform recorder with .mark_recorder().",
            )
        })?;

        let settings_store = self.settings_store.ok_or_else(|| {
            Error::missing(
                "SettingsStore",
                "A SettingsStore is required for the mark ledger and the anonymous actor id. \
                 Desktop: use bridge_desktop::SqliteSettingsStore. \
                 Mobile: inject platform-native settings (UserDefaults/DataStore).",
            )
        })?;

        let config = CoreConfig {
            media_engine,
            mark_recorder,
            settings_store,
            identity_provider: self.identity_provider,
            mode_provider: self.mode_provider,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            logging: self.logging,
            playback: self.playback,
        };

        config.validate()?;

        Ok(config)
    }
}
