//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (media engine, mark
//! recorder, settings) into the playback core. Hosts build a
//! [`CoreConfig`](core_runtime::config::CoreConfig), hand it to
//! [`CoreService::bootstrap`] and drive playback through
//! [`CoreService::controller`]. Desktop apps typically enable the
//! `desktop-shims` feature, which adds [`bootstrap_desktop`] on top of the
//! SQLite settings store and HTTP mark recorder from `bridge-desktop`.

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{ActorIdentityProvider, PlaybackModeProvider};
use core_marks::{MarkClient, PersistentActorIdentity};
use core_playback::{ControllerOptions, PlaybackController, SettingsModeProvider};
use core_runtime::config::{CoreConfig, PlaybackSettings};
use core_runtime::events::{CoreEvent, EventBus, Receiver};
use core_runtime::logging::init_logging;
use tracing::info;

pub use core_playback::{PlaybackState, PlaybackTicket, SessionPhase, Song, SongId};
pub use core_runtime::config;
pub use core_runtime::events;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop::{HttpMarkRecorder, SqliteSettingsStore};

/// Primary façade exposed to host applications.
///
/// Cloning is cheap; clones share the controller, mark client and event bus.
#[derive(Clone)]
pub struct CoreService {
    controller: PlaybackController,
    marks: Arc<MarkClient>,
    identity: Option<Arc<PersistentActorIdentity>>,
    events: EventBus,
    settings: PlaybackSettings,
}

impl CoreService {
    /// Wire the core from a validated configuration.
    ///
    /// Installs logging when `config.logging` is set. Missing optional
    /// bridges get settings-backed defaults: a persisted anonymous identity
    /// and the `playback.teaser_mode` flag.
    pub fn bootstrap(config: CoreConfig) -> Result<Self> {
        config.validate()?;

        if let Some(logging) = config.logging.clone() {
            init_logging(logging)?;
        }

        let events = EventBus::new(config.playback.event_buffer_size);

        let mut default_identity = None;
        let identity: Arc<dyn ActorIdentityProvider> = match config.identity_provider {
            Some(provider) => provider,
            None => {
                let persistent =
                    Arc::new(PersistentActorIdentity::new(config.settings_store.clone()));
                default_identity = Some(Arc::clone(&persistent));
                persistent
            }
        };

        let mode: Arc<dyn PlaybackModeProvider> = match config.mode_provider {
            Some(provider) => provider,
            None => Arc::new(SettingsModeProvider::new(
                config.settings_store.clone(),
                config.playback.default_mode,
            )),
        };

        let marks = Arc::new(
            MarkClient::new(
                config.mark_recorder,
                identity,
                config.settings_store,
            )
            .with_event_bus(events.clone()),
        );

        let controller = PlaybackController::with_options(
            config.media_engine,
            marks.clone(),
            mode,
            ControllerOptions {
                settings: config.playback.clone(),
                clock: config.clock,
                events: events.clone(),
            },
        );

        info!(
            recorder = %marks.recorder_name(),
            default_mode = ?config.playback.default_mode,
            progress_throttle_ms = config.playback.progress_throttle.as_millis() as u64,
            "Playback core initialized"
        );

        Ok(Self {
            controller,
            marks,
            identity: default_identity,
            events,
            settings: config.playback,
        })
    }

    /// The playback session controller.
    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    /// The mark client, for lifetime marks (`teaser`, `purchase`) raised by
    /// the host outside of playback.
    pub fn marks(&self) -> &Arc<MarkClient> {
        &self.marks
    }

    /// The built-in identity, when the host did not supply its own provider.
    pub fn identity(&self) -> Option<&Arc<PersistentActorIdentity>> {
        self.identity.as_ref()
    }

    pub fn settings(&self) -> &PlaybackSettings {
        &self.settings
    }

    /// Subscribe to playback and mark events.
    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    /// Attribute marks to `user_id`.
    ///
    /// Fails when the host supplied its own identity provider; sign-in is
    /// then the host's concern.
    pub fn sign_in(&self, user_id: impl Into<String>) -> Result<()> {
        self.built_in_identity()?.sign_in(user_id);
        Ok(())
    }

    pub fn sign_out(&self) -> Result<()> {
        self.built_in_identity()?.sign_out();
        Ok(())
    }

    fn built_in_identity(&self) -> Result<&Arc<PersistentActorIdentity>> {
        self.identity.as_ref().ok_or_else(|| {
            CoreError::InitializationFailed(
                "Identity is provided by the host; sign in there".to_string(),
            )
        })
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// Opens the SQLite settings store in the platform data directory and posts
/// marks to `mark_endpoint`.
///
/// ```ignore
/// use core_service::bootstrap_desktop;
///
/// let core = bootstrap_desktop(engine, "https://api.example.com/marks").await?;
/// core.controller().play(song);
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    media_engine: Arc<dyn bridge_traits::MediaEngine>,
    mark_endpoint: &str,
) -> Result<CoreService> {
    let settings = SqliteSettingsStore::open_default().await?;
    let recorder = HttpMarkRecorder::new(mark_endpoint)?;

    let config = CoreConfig::builder()
        .media_engine(media_engine)
        .mark_recorder(Arc::new(recorder))
        .settings_store(Arc::new(settings))
        .build()?;

    CoreService::bootstrap(config)
}
