//! # Playback Session Controller
//!
//! Owns the single live [`MediaHandle`] and turns rapidly arriving, possibly
//! overlapping user requests into one coherent playback session.
//!
//! ## Request tokens
//!
//! Every [`play`](PlaybackController::play) allocates a strictly increasing
//! token and updates [`PlaybackState`] synchronously, so observers see the
//! intent immediately. The load itself (teardown of the previous handle, mode
//! read, source selection, engine creation) runs on a spawned task. Every
//! continuation of that task compares its token with the live one before it
//! touches shared state; a superseded continuation only releases what it
//! created. The token and the state sit behind the same lock, so the
//! comparison and the commit are atomic.
//!
//! ```text
//! play(A) ─ t=1 ─ create(A) ············· resolves ─> stale: tear down A
//! play(B) ─ t=2 ─ create(B) ─ resolves ─> current: install B
//! ```
//!
//! ## Status stream
//!
//! An installed handle's status updates are consumed by a listener scoped to
//! its token. Progress updates are throttled; the finish update is never
//! dropped, releases the handle and fires the completion mark once per
//! session even if the engine reports the finish more than once.
//!
//! ## Failures
//!
//! Nothing here returns an error to the caller. A teaser that fails to load
//! is retried once against a distinct full source; any other failure is
//! logged and leaves the controller idle and not playing.

use crate::error::{PlaybackError, Result};
use crate::mode::resolve_mode;
use crate::playlist::{adjacent, Step};
use crate::selector::{fallback_source, select_source, Source};
use crate::song::Song;
use crate::state::{PlaybackState, SessionPhase};
use crate::throttle::ProgressThrottle;
use bridge_traits::{
    Clock, MarkKind, MediaEngine, MediaHandle, MediaStatus, PlaybackModeProvider, StatusStream,
    StatusUpdate, SystemClock,
};
use core_marks::{MarkClient, MarkError};
use core_runtime::config::PlaybackSettings;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, Receiver};
use core_runtime::logging::strip_query;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, trace, warn};

/// Handle to an issued play request.
///
/// Dropping it does not cancel anything; only a newer request does.
#[derive(Debug)]
pub struct PlaybackTicket {
    token: u64,
    done: oneshot::Receiver<()>,
}

impl PlaybackTicket {
    /// Token allocated to the request.
    pub fn token(&self) -> u64 {
        self.token
    }

    /// Resolves once the request's load chain has finished, whether it
    /// installed a handle, failed, or was superseded.
    pub async fn settled(self) {
        let _ = self.done.await;
    }
}

/// Optional collaborators and tuning for [`PlaybackController`].
#[derive(Clone)]
pub struct ControllerOptions {
    pub settings: PlaybackSettings,
    pub clock: Arc<dyn Clock>,
    pub events: EventBus,
}

impl Default for ControllerOptions {
    fn default() -> Self {
        let settings = PlaybackSettings::default();
        let events = EventBus::new(settings.event_buffer_size);
        Self {
            settings,
            clock: Arc::new(SystemClock),
            events,
        }
    }
}

/// A handle committed to the slot, with the listener consuming its status.
struct Installed {
    token: u64,
    song_id: String,
    handle: Arc<dyn MediaHandle>,
    listener: Option<JoinHandle<()>>,
}

struct Inner {
    /// Last issued token.
    token: u64,
    /// Token whose load chain has not resolved yet.
    loading: Option<u64>,
    slot: Option<Installed>,
    state: PlaybackState,
    /// Session whose completion mark was already sent.
    marked_token: Option<u64>,
    throttle: ProgressThrottle,
}

impl Inner {
    fn is_current(&self, token: u64) -> bool {
        self.token == token
    }

    fn installed_token(&self) -> Option<u64> {
        self.slot.as_ref().map(|installed| installed.token)
    }

    fn owns_slot(&self, token: u64) -> bool {
        self.is_current(token) && self.installed_token() == Some(token)
    }
}

struct Shared {
    engine: Arc<dyn MediaEngine>,
    marks: Arc<MarkClient>,
    mode: Arc<dyn PlaybackModeProvider>,
    clock: Arc<dyn Clock>,
    settings: PlaybackSettings,
    events: EventBus,
    state_tx: watch::Sender<PlaybackState>,
    inner: Mutex<Inner>,
}

/// The playback session controller.
///
/// Cheap to clone; clones drive the same session.
#[derive(Clone)]
pub struct PlaybackController {
    shared: Arc<Shared>,
}

impl PlaybackController {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        marks: Arc<MarkClient>,
        mode: Arc<dyn PlaybackModeProvider>,
    ) -> Self {
        Self::with_options(engine, marks, mode, ControllerOptions::default())
    }

    pub fn with_options(
        engine: Arc<dyn MediaEngine>,
        marks: Arc<MarkClient>,
        mode: Arc<dyn PlaybackModeProvider>,
        options: ControllerOptions,
    ) -> Self {
        let (state_tx, _) = watch::channel(PlaybackState::default());
        let throttle = ProgressThrottle::new(options.settings.progress_throttle);

        Self {
            shared: Arc::new(Shared {
                engine,
                marks,
                mode,
                clock: options.clock,
                settings: options.settings,
                events: options.events,
                state_tx,
                inner: Mutex::new(Inner {
                    token: 0,
                    loading: None,
                    slot: None,
                    state: PlaybackState::default(),
                    marked_token: None,
                    throttle,
                }),
            }),
        }
    }

    /// Current state snapshot.
    pub fn state(&self) -> PlaybackState {
        self.shared.inner.lock().state.clone()
    }

    /// Watch state snapshots as they change.
    pub fn subscribe_state(&self) -> watch::Receiver<PlaybackState> {
        self.shared.state_tx.subscribe()
    }

    /// Subscribe to playback and mark events.
    pub fn subscribe_events(&self) -> Receiver<CoreEvent> {
        self.shared.events.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.shared.events
    }

    /// Token of the most recently issued request (0 before the first).
    pub fn current_token(&self) -> u64 {
        self.shared.inner.lock().token
    }

    pub fn phase(&self) -> SessionPhase {
        let inner = self.shared.inner.lock();
        if let Some(token) = inner.installed_token() {
            SessionPhase::Active(token)
        } else if let Some(token) = inner.loading {
            SessionPhase::Loading(token)
        } else {
            SessionPhase::Idle
        }
    }

    /// Start playing `song`, superseding any earlier request.
    pub fn play(&self, song: Song) -> PlaybackTicket {
        self.play_request(song, None)
    }

    /// Like [`play`](Self::play), with a locator resolved upstream that may
    /// stand in for a missing full source.
    pub fn play_request(&self, song: Song, resolved: Option<String>) -> PlaybackTicket {
        let (done_tx, done_rx) = oneshot::channel();
        let song_id = song.id.to_string();

        let (token, previous) = {
            let mut inner = self.shared.inner.lock();
            inner.token += 1;
            let token = inner.token;
            inner.loading = Some(token);
            inner.state.current_song = Some(song.clone());
            inner.state.is_playing = true;
            inner.state.reset_progress();
            inner.throttle.reset();
            let previous = inner.slot.take();
            self.shared.publish_state(&inner);
            (token, previous)
        };

        debug!(song_id = %song_id, token, "Play requested");
        self.shared.emit(PlaybackEvent::Loading {
            song_id: song_id.clone(),
            token,
        });

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let shared = Arc::clone(&self.shared);
                runtime.spawn(async move {
                    shared.run_request(token, song, resolved, previous).await;
                    let _ = done_tx.send(());
                });
            }
            Err(e) => {
                if let Some(listener) = previous.and_then(|installed| installed.listener) {
                    listener.abort();
                }
                self.shared.fail_request(
                    token,
                    &song_id,
                    &PlaybackError::Internal(format!("no async runtime: {e}")),
                );
            }
        }

        PlaybackTicket {
            token,
            done: done_rx,
        }
    }

    /// Pause the live handle. Engine errors are treated as already paused.
    pub async fn pause(&self) {
        let target = {
            let mut inner = self.shared.inner.lock();
            inner.state.is_playing = false;
            self.shared.publish_state(&inner);
            inner
                .slot
                .as_ref()
                .map(|s| (Arc::clone(&s.handle), s.token, s.song_id.clone()))
        };

        let Some((handle, token, song_id)) = target else {
            return;
        };

        match handle.pause().await {
            Ok(()) => {
                let position_ms = self.shared.inner.lock().state.position_ms;
                self.shared.emit(PlaybackEvent::Paused {
                    song_id,
                    position_ms,
                });
            }
            Err(e) => {
                let err = PlaybackError::control(&e);
                debug!(song_id = %song_id, token, error = %err, "Pause failed; treating as already paused");
            }
        }
    }

    /// Resume the live handle, rolling back to not-playing if the engine
    /// refuses. With nothing loaded, replays the current song.
    pub async fn resume(&self) {
        enum Target {
            Live(Arc<dyn MediaHandle>, u64, String),
            Replay(Song),
            Nothing,
        }

        let target = {
            let mut inner = self.shared.inner.lock();
            let live = inner
                .slot
                .as_ref()
                .map(|s| (Arc::clone(&s.handle), s.token, s.song_id.clone()));

            match live {
                Some((handle, token, song_id)) => {
                    inner.state.is_playing = true;
                    self.shared.publish_state(&inner);
                    Target::Live(handle, token, song_id)
                }
                // The install picks the intent up
                None if inner.loading.is_some() => {
                    inner.state.is_playing = true;
                    self.shared.publish_state(&inner);
                    Target::Nothing
                }
                None => match inner.state.current_song.clone() {
                    Some(song) => Target::Replay(song),
                    None => Target::Nothing,
                },
            }
        };

        match target {
            Target::Live(handle, token, song_id) => match handle.play().await {
                Ok(()) => {
                    let position_ms = self.shared.inner.lock().state.position_ms;
                    self.shared.emit(PlaybackEvent::Resumed {
                        song_id,
                        position_ms,
                    });
                }
                Err(e) => {
                    let err = PlaybackError::control(&e);
                    warn!(song_id = %song_id, token, error = %err, "Resume failed; rolling back");
                    {
                        let mut inner = self.shared.inner.lock();
                        if !inner.owns_slot(token) {
                            return;
                        }
                        inner.state.is_playing = false;
                        self.shared.publish_state(&inner);
                    }
                    self.shared.emit_control_error(&song_id, &err);
                }
            },
            Target::Replay(song) => self.play(song).settled().await,
            Target::Nothing => {}
        }
    }

    /// Flip between playing and paused.
    ///
    /// A different `song` starts that song instead. With no live handle the
    /// current song is replayed.
    pub async fn toggle_play(&self, song: Option<Song>) {
        if let Some(song) = song {
            let same = self
                .shared
                .inner
                .lock()
                .state
                .current_song
                .as_ref()
                .is_some_and(|current| current.id == song.id);
            if !same {
                self.play(song).settled().await;
                return;
            }
        }

        let (live, loading, intent, current) = {
            let inner = self.shared.inner.lock();
            (
                inner.slot.as_ref().map(|s| (Arc::clone(&s.handle), s.token)),
                inner.loading.is_some(),
                inner.state.is_playing,
                inner.state.current_song.clone(),
            )
        };

        match (live, current) {
            (Some((handle, token)), _) => {
                let playing = match handle.status().await {
                    Ok(status) => status.is_playing,
                    Err(e) => {
                        let err = PlaybackError::control(&e);
                        debug!(token, error = %err, "Status query failed; toggling from local state");
                        intent
                    }
                };
                if !self.shared.inner.lock().owns_slot(token) {
                    debug!(token, "Toggle superseded while querying status");
                    return;
                }
                if playing {
                    self.pause().await;
                } else {
                    self.resume().await;
                }
            }
            (None, _) if loading => {
                if intent {
                    self.pause().await;
                } else {
                    self.resume().await;
                }
            }
            (None, Some(current)) => self.play(current).settled().await,
            (None, None) => debug!("Nothing to toggle"),
        }
    }

    /// Stop and release the live handle. Does not issue a new token.
    pub async fn stop(&self) {
        let (installed, song_id) = {
            let mut inner = self.shared.inner.lock();
            inner.state.is_playing = false;
            inner.state.reset_progress();
            let installed = inner.slot.take();
            self.shared.publish_state(&inner);
            let song_id = inner.state.current_song.as_ref().map(|s| s.id.to_string());
            (installed, song_id)
        };

        self.shared.emit(PlaybackEvent::Stopped { song_id });

        if let Some(installed) = installed {
            release(installed).await;
        }
    }

    /// Move the live handle to `position_ms`.
    pub async fn seek(&self, position_ms: u64) {
        let target = {
            let inner = self.shared.inner.lock();
            inner
                .slot
                .as_ref()
                .map(|s| (Arc::clone(&s.handle), s.token, s.song_id.clone()))
        };

        let Some((handle, token, song_id)) = target else {
            debug!(position_ms, error = %PlaybackError::NoActiveHandle, "Seek ignored");
            return;
        };

        match handle.set_position(position_ms).await {
            Ok(()) => {
                let mut inner = self.shared.inner.lock();
                if inner.owns_slot(token) {
                    inner.state.position_ms = position_ms;
                    self.shared.publish_state(&inner);
                }
            }
            Err(e) => {
                let err = PlaybackError::control(&e);
                warn!(song_id = %song_id, token, position_ms, error = %err, "Seek failed");
                if self.shared.inner.lock().owns_slot(token) {
                    self.shared.emit_control_error(&song_id, &err);
                }
            }
        }
    }

    /// Play the song after the current one in `playlist`, wrapping around.
    pub fn next(&self, playlist: &[Song]) -> Option<PlaybackTicket> {
        self.step(playlist, Step::Next)
    }

    /// Play the song before the current one in `playlist`, wrapping around.
    pub fn prev(&self, playlist: &[Song]) -> Option<PlaybackTicket> {
        self.step(playlist, Step::Prev)
    }

    fn step(&self, playlist: &[Song], step: Step) -> Option<PlaybackTicket> {
        let current = self
            .shared
            .inner
            .lock()
            .state
            .current_song
            .as_ref()
            .map(|song| song.id.clone())?;

        match adjacent(playlist, &current, step) {
            Some(song) => Some(self.play(song.clone())),
            None => {
                debug!(song_id = %current, ?step, "Current song not in playlist; ignoring");
                None
            }
        }
    }
}

impl Shared {
    fn publish_state(&self, inner: &Inner) {
        self.state_tx.send_replace(inner.state.clone());
    }

    fn emit(&self, event: PlaybackEvent) {
        self.events.publish(CoreEvent::Playback(event));
    }

    fn is_current(&self, token: u64) -> bool {
        self.inner.lock().is_current(token)
    }

    /// The handle stays installed, so the session can still be retried.
    fn emit_control_error(&self, song_id: &str, err: &PlaybackError) {
        self.emit(PlaybackEvent::Error {
            song_id: Some(song_id.to_string()),
            message: err.to_string(),
            recoverable: true,
        });
    }

    #[instrument(skip(self, song, resolved, previous), fields(song_id = %song.id))]
    async fn run_request(
        self: &Arc<Self>,
        token: u64,
        song: Song,
        resolved: Option<String>,
        previous: Option<Installed>,
    ) {
        let song_id = song.id.to_string();

        if let Some(previous) = previous {
            release(previous).await;
        }

        let mode = resolve_mode(self.mode.as_ref(), self.settings.default_mode).await;

        let Some(source) = select_source(&song, mode, resolved.as_deref()) else {
            self.finish_without_source(token, &song_id);
            return;
        };

        if !self.is_current(token) {
            debug!("Request superseded before load");
            return;
        }

        match self
            .load(token, &song, &song_id, source, resolved.as_deref())
            .await
        {
            Ok((handle, source)) => self.install(token, &song_id, handle, source).await,
            Err(e) => self.fail_request(token, &song_id, &e),
        }
    }

    /// Create a handle for `source`, retrying once with the full source if a
    /// teaser fails.
    async fn load(
        &self,
        token: u64,
        song: &Song,
        song_id: &str,
        source: Source,
        resolved: Option<&str>,
    ) -> Result<(Arc<dyn MediaHandle>, Source)> {
        let error = match self.engine.create(&source.locator).await {
            Ok(handle) => return Ok((handle, source)),
            Err(e) => e,
        };

        let Some(full) = fallback_source(song, &source, resolved) else {
            return Err(PlaybackError::EngineLoad {
                locator: source.locator,
                message: error.to_string(),
            });
        };

        if !self.is_current(token) {
            return Err(PlaybackError::EngineLoad {
                locator: source.locator,
                message: error.to_string(),
            });
        }

        let attempted_uri = strip_query(&source.locator).to_string();
        warn!(
            song_id = %song_id,
            token,
            attempted_uri = %attempted_uri,
            error = %error,
            "Teaser failed to load; retrying with full source"
        );
        self.emit(PlaybackEvent::FallbackAttempted {
            song_id: song_id.to_string(),
            attempted_uri,
        });

        match self.engine.create(&full.locator).await {
            Ok(handle) => Ok((handle, full)),
            Err(e) => Err(PlaybackError::EngineLoad {
                locator: full.locator,
                message: e.to_string(),
            }),
        }
    }

    async fn install(
        self: &Arc<Self>,
        token: u64,
        song_id: &str,
        handle: Arc<dyn MediaHandle>,
        source: Source,
    ) {
        let initial = match handle.status().await {
            Ok(status) => status,
            Err(e) => {
                debug!(song_id = %song_id, token, error = %e, "Initial status unavailable");
                MediaStatus::default()
            }
        };

        let committed = {
            let mut inner = self.inner.lock();
            if inner.is_current(token) {
                let listener = tokio::spawn(listen(
                    Arc::downgrade(self),
                    token,
                    song_id.to_string(),
                    handle.subscribe(),
                ));
                inner.loading = None;
                inner.state.position_ms = initial.position_ms;
                inner.state.duration_ms = initial.duration_ms;
                inner.throttle.reset();
                inner.slot = Some(Installed {
                    token,
                    song_id: song_id.to_string(),
                    handle: Arc::clone(&handle),
                    listener: Some(listener),
                });
                self.publish_state(&inner);
                Some(!inner.state.is_playing)
            } else {
                None
            }
        };

        let Some(paused_while_loading) = committed else {
            debug!(
                song_id = %song_id,
                token,
                locator = %strip_query(&source.locator),
                "Discarding handle of superseded request"
            );
            release_handle(handle.as_ref(), token).await;
            return;
        };

        info!(
            song_id = %song_id,
            token,
            source_kind = %source.kind,
            locator = %strip_query(&source.locator),
            "Playback started"
        );
        self.emit(PlaybackEvent::Started {
            song_id: song_id.to_string(),
            source_kind: source.kind.to_string(),
            locator: strip_query(&source.locator).to_string(),
        });

        if paused_while_loading {
            debug!(song_id = %song_id, token, "Paused while loading; pausing new handle");
            if let Err(e) = handle.pause().await {
                debug!(song_id = %song_id, token, error = %e, "Pause after load failed");
            }
        }
    }

    fn finish_without_source(&self, token: u64, song_id: &str) {
        {
            let mut inner = self.inner.lock();
            if !inner.is_current(token) {
                debug!(song_id = %song_id, token, "Superseded request had no source");
                return;
            }
            inner.loading = None;
            inner.state.current_song = None;
            inner.state.is_playing = false;
            inner.state.reset_progress();
            self.publish_state(&inner);
        }

        let err = PlaybackError::NoPlayableSource(song_id.to_string());
        info!(song_id = %song_id, token, reason = %err, "Nothing to play");
        self.emit(PlaybackEvent::Stopped {
            song_id: Some(song_id.to_string()),
        });
    }

    fn fail_request(&self, token: u64, song_id: &str, err: &PlaybackError) {
        {
            let mut inner = self.inner.lock();
            if !inner.is_current(token) {
                debug!(song_id = %song_id, token, error = %err, "Superseded request failed; ignoring");
                return;
            }
            inner.loading = None;
            inner.state.is_playing = false;
            inner.state.reset_progress();
            self.publish_state(&inner);
        }

        let attempted_uri = match err {
            PlaybackError::EngineLoad { locator, .. } => strip_query(locator).to_string(),
            _ => String::new(),
        };
        error!(
            song_id = %song_id,
            token,
            attempted_uri = %attempted_uri,
            error = %err,
            "Failed to load source"
        );
        self.emit(PlaybackEvent::Error {
            song_id: Some(song_id.to_string()),
            message: err.to_string(),
            recoverable: err.is_engine_error(),
        });
    }

    fn on_progress(&self, token: u64, song_id: &str, update: StatusUpdate) {
        {
            let mut inner = self.inner.lock();
            if !inner.owns_slot(token) {
                trace!(token, "Ignoring status from superseded handle");
                return;
            }
            if !inner.throttle.should_emit(self.clock.unix_timestamp_millis()) {
                return;
            }
            inner.state.position_ms = update.position_ms;
            inner.state.duration_ms = update.duration_ms;
            self.publish_state(&inner);
        }

        self.emit(PlaybackEvent::PositionChanged {
            song_id: song_id.to_string(),
            position_ms: update.position_ms,
            duration_ms: update.duration_ms,
        });
    }

    async fn on_finished(&self, token: u64, song_id: &str, update: StatusUpdate) {
        let installed = {
            let mut inner = self.inner.lock();
            if inner.marked_token == Some(token) {
                debug!(song_id = %song_id, token, "Duplicate finish; completion already marked");
                return;
            }
            // A stopped session keeps its token but no longer owns the slot
            if !inner.owns_slot(token) {
                debug!(song_id = %song_id, token, "Ignoring finish from stopped or superseded handle");
                return;
            }
            inner.state.position_ms = update.position_ms;
            inner.state.duration_ms = update.duration_ms;
            inner.state.is_playing = false;
            inner.marked_token = Some(token);
            let installed = inner.slot.take();
            self.publish_state(&inner);
            installed
        };

        if let Some(mut installed) = installed {
            // This task is the listener; detach instead of aborting it
            installed.listener = None;
            release(installed).await;
        }

        info!(song_id = %song_id, token, "Track completed");
        self.emit(PlaybackEvent::Completed {
            song_id: song_id.to_string(),
        });
        self.record_completion(song_id).await;
    }

    async fn record_completion(&self, song_id: &str) {
        match self.marks.mark_for_current_actor(song_id, MarkKind::Play).await {
            Ok(outcome) => {
                debug!(song_id = %song_id, recorded = outcome.recorded, "Completion mark sent");
            }
            // Already logged by the mark client
            Err(e @ MarkError::Recorder { .. }) => {
                debug!(song_id = %song_id, error = %e, "Completion mark failed");
            }
            Err(e) => {
                warn!(
                    song_id = %song_id,
                    recorder = %self.marks.recorder_name(),
                    error = %e,
                    "Completion mark failed"
                );
            }
        }
    }
}

async fn listen(shared: Weak<Shared>, token: u64, song_id: String, mut updates: StatusStream) {
    while let Some(update) = updates.next().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };

        if update.did_just_finish {
            shared.on_finished(token, &song_id, update).await;
        } else {
            shared.on_progress(token, &song_id, update);
        }
    }
    trace!(token, "Status stream ended");
}

/// Stop listening to an installed handle and release it.
async fn release(installed: Installed) {
    if let Some(listener) = installed.listener {
        listener.abort();
    }
    release_handle(installed.handle.as_ref(), installed.token).await;
}

/// Best-effort stop and unload. Errors never block the next request.
async fn release_handle(handle: &dyn MediaHandle, token: u64) {
    if let Err(e) = handle.stop().await {
        debug!(token, error = %e, "Stopping handle failed");
    }
    if let Err(e) = handle.unload().await {
        debug!(token, error = %e, "Unloading handle failed");
    }
}
