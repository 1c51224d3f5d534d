//! Playback session controller tests.
//!
//! Run on the current-thread runtime: spawned load chains and listeners only
//! progress when the test yields, which keeps interleavings deterministic.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    ActorIdentityProvider, BridgeError, Clock, MarkKind, MarkRequest, MarkResult, MediaEngine,
    MediaHandle, MediaStatus, PlaybackModeProvider, RemoteMarkRecorder, SettingsStore,
    SourceMode, StatusStream, StatusUpdate,
};
use chrono::{DateTime, TimeZone, Utc};
use core_marks::MarkClient;
use core_playback::{
    ControllerOptions, PlaybackController, SessionPhase, Song, SongId, StaticMode,
};
use core_runtime::config::PlaybackSettings;
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, Receiver};
use futures::channel::mpsc;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

const DURATION_MS: u64 = 30_000;

// ============================================================================
// Fake media engine
// ============================================================================

struct FakeHandle {
    locator: String,
    status: Mutex<MediaStatus>,
    tx: mpsc::UnboundedSender<StatusUpdate>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<StatusUpdate>>>,
    plays: AtomicUsize,
    pauses: AtomicUsize,
    stops: AtomicUsize,
    unloads: AtomicUsize,
    seeks: Mutex<Vec<u64>>,
    fail_control: AtomicBool,
    fail_teardown: AtomicBool,
}

impl FakeHandle {
    fn new(locator: &str) -> Self {
        let (tx, rx) = mpsc::unbounded();
        Self {
            locator: locator.to_string(),
            status: Mutex::new(MediaStatus {
                position_ms: 0,
                duration_ms: DURATION_MS,
                is_playing: true,
            }),
            tx,
            rx: Mutex::new(Some(rx)),
            plays: AtomicUsize::new(0),
            pauses: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
            unloads: AtomicUsize::new(0),
            seeks: Mutex::new(Vec::new()),
            fail_control: AtomicBool::new(false),
            fail_teardown: AtomicBool::new(false),
        }
    }

    fn emit(&self, update: StatusUpdate) {
        let _ = self.tx.unbounded_send(update);
    }

    fn released(&self) -> bool {
        self.stops.load(Ordering::SeqCst) > 0 && self.unloads.load(Ordering::SeqCst) > 0
    }

    fn control_result(&self) -> BridgeResult<()> {
        if self.fail_control.load(Ordering::SeqCst) {
            Err(BridgeError::Engine(format!("{} refused", self.locator)))
        } else {
            Ok(())
        }
    }

    fn teardown_result(&self) -> BridgeResult<()> {
        if self.fail_teardown.load(Ordering::SeqCst) {
            Err(BridgeError::Engine(format!("{} already gone", self.locator)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MediaHandle for FakeHandle {
    async fn status(&self) -> BridgeResult<MediaStatus> {
        Ok(*self.status.lock())
    }

    fn subscribe(&self) -> StatusStream {
        match self.rx.lock().take() {
            Some(rx) => rx.boxed(),
            None => futures::stream::empty().boxed(),
        }
    }

    async fn play(&self) -> BridgeResult<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        self.control_result()?;
        self.status.lock().is_playing = true;
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.pauses.fetch_add(1, Ordering::SeqCst);
        self.control_result()?;
        self.status.lock().is_playing = false;
        Ok(())
    }

    async fn set_position(&self, position_ms: u64) -> BridgeResult<()> {
        self.control_result()?;
        self.seeks.lock().push(position_ms);
        self.status.lock().position_ms = position_ms;
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.teardown_result()
    }

    async fn unload(&self) -> BridgeResult<()> {
        self.unloads.fetch_add(1, Ordering::SeqCst);
        self.tx.close_channel();
        self.teardown_result()
    }
}

#[derive(Default)]
struct FakeEngine {
    failing: Mutex<HashSet<String>>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    created: Mutex<Vec<String>>,
    handles: Mutex<Vec<Arc<FakeHandle>>>,
}

impl FakeEngine {
    fn fail(&self, locator: &str) {
        self.failing.lock().insert(locator.to_string());
    }

    /// Hold creation of `locator` until the returned sender fires.
    fn gate(&self, locator: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().insert(locator.to_string(), rx);
        tx
    }

    fn created(&self) -> Vec<String> {
        self.created.lock().clone()
    }

    fn handle(&self, locator: &str) -> Arc<FakeHandle> {
        self.handles
            .lock()
            .iter()
            .rev()
            .find(|handle| handle.locator == locator)
            .cloned()
            .unwrap_or_else(|| panic!("no handle created for {locator}"))
    }
}

#[async_trait]
impl MediaEngine for FakeEngine {
    async fn create(&self, locator: &str) -> BridgeResult<Arc<dyn MediaHandle>> {
        self.created.lock().push(locator.to_string());

        let gate = self.gates.lock().remove(locator);
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if self.failing.lock().contains(locator) {
            return Err(BridgeError::Engine(format!("cannot decode {locator}")));
        }

        let handle = Arc::new(FakeHandle::new(locator));
        self.handles.lock().push(Arc::clone(&handle));
        Ok(handle)
    }
}

// ============================================================================
// Other collaborators
// ============================================================================

#[derive(Default)]
struct CountingRecorder {
    requests: Mutex<Vec<MarkRequest>>,
    fail: AtomicBool,
}

impl CountingRecorder {
    fn count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl RemoteMarkRecorder for CountingRecorder {
    fn name(&self) -> &str {
        "counting"
    }

    async fn record(&self, request: MarkRequest) -> BridgeResult<MarkResult> {
        self.requests.lock().push(request);
        if self.fail.load(Ordering::SeqCst) {
            return Err(BridgeError::Remote("503 Service Unavailable".to_string()));
        }
        Ok(MarkResult {
            total_marks: Some(1),
            ..Default::default()
        })
    }
}

struct FixedIdentity;

#[async_trait]
impl ActorIdentityProvider for FixedIdentity {
    async fn actor_id(&self) -> BridgeResult<String> {
        Ok("anon-test".to_string())
    }
}

#[derive(Default)]
struct MemorySettings {
    values: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn set_string(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get_string(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.values.lock().get(key).cloned())
    }

    async fn set_bool(&self, key: &str, value: bool) -> BridgeResult<()> {
        self.set_string(key, if value { "true" } else { "false" }).await
    }

    async fn get_bool(&self, key: &str) -> BridgeResult<Option<bool>> {
        Ok(self.get_string(key).await?.map(|v| v == "true"))
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.values.lock().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.values.lock().keys().cloned().collect())
    }

    async fn clear_all(&self) -> BridgeResult<()> {
        self.values.lock().clear();
        Ok(())
    }
}

struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    fn set(&self, millis: i64) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.millis.load(Ordering::SeqCst))
            .single()
            .unwrap_or_default()
    }
}

/// Mode flag the test can flip between requests.
struct SwitchableMode {
    teaser: AtomicBool,
    reads: AtomicUsize,
}

#[async_trait]
impl PlaybackModeProvider for SwitchableMode {
    async fn source_mode(&self) -> BridgeResult<SourceMode> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(SourceMode::from_bool(self.teaser.load(Ordering::SeqCst)))
    }
}

// ============================================================================
// Harness
// ============================================================================

struct Harness {
    controller: PlaybackController,
    engine: Arc<FakeEngine>,
    recorder: Arc<CountingRecorder>,
    clock: Arc<ManualClock>,
    events: Receiver<CoreEvent>,
}

fn harness_with_mode(mode: Arc<dyn PlaybackModeProvider>) -> Harness {
    let engine = Arc::new(FakeEngine::default());
    let recorder = Arc::new(CountingRecorder::default());
    let clock = Arc::new(ManualClock {
        millis: AtomicI64::new(1_000_000),
    });
    let marks = Arc::new(MarkClient::new(
        recorder.clone(),
        Arc::new(FixedIdentity),
        Arc::new(MemorySettings::default()),
    ));
    let bus = EventBus::new(256);
    let events = bus.subscribe();

    let controller = PlaybackController::with_options(
        engine.clone(),
        marks,
        mode,
        ControllerOptions {
            settings: PlaybackSettings::default(),
            clock: clock.clone(),
            events: bus,
        },
    );

    Harness {
        controller,
        engine,
        recorder,
        clock,
        events,
    }
}

fn harness(mode: SourceMode) -> Harness {
    harness_with_mode(Arc::new(StaticMode(mode)))
}

fn song(id: u64, teaser: Option<&str>, full: Option<&str>) -> Song {
    let mut song = Song::new(id, format!("Song {id}"), "Artist");
    song.teaser_source = teaser.map(String::from);
    song.full_source = full.map(String::from);
    song
}

fn full_song(id: u64) -> Song {
    song(id, None, Some(&format!("https://x/{id}/full.mp3")))
}

/// Yield until `cond` holds; spawned tasks run while we yield.
async fn settle_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..1_000 {
        if cond() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition not reached");
}

/// Give spawned tasks a chance to run everything that is ready.
async fn drain() {
    for _ in 0..100 {
        tokio::task::yield_now().await;
    }
}

fn playback_events(rx: &mut Receiver<CoreEvent>) -> Vec<PlaybackEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let CoreEvent::Playback(event) = event {
            events.push(event);
        }
    }
    events
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_play_updates_state_optimistically() {
    let h = harness(SourceMode::FullOnly);
    let s = full_song(1);

    let ticket = h.controller.play(s.clone());

    let state = h.controller.state();
    assert_eq!(state.current_song, Some(s));
    assert!(state.is_playing);
    assert_eq!(ticket.token(), 1);
    assert_eq!(h.controller.phase(), SessionPhase::Loading(1));

    ticket.settled().await;
    assert_eq!(h.controller.phase(), SessionPhase::Active(1));
    assert_eq!(h.controller.state().duration_ms, DURATION_MS);
}

#[tokio::test]
async fn test_tokens_strictly_increase() {
    let h = harness(SourceMode::FullOnly);

    let tokens: Vec<u64> = (1..=3)
        .map(|id| h.controller.play(full_song(id)).token())
        .collect();

    assert_eq!(tokens, vec![1, 2, 3]);
    assert_eq!(h.controller.current_token(), 3);
}

#[tokio::test]
async fn test_request_supersession() {
    let h = harness(SourceMode::FullOnly);
    let a = song(1, None, Some("A"));
    let b = song(2, None, Some("B"));
    let release_a = h.engine.gate("A");

    let ticket_a = h.controller.play(a);
    settle_until(|| h.engine.created().contains(&"A".to_string())).await;

    let ticket_b = h.controller.play(b.clone());
    ticket_b.settled().await;
    assert_eq!(h.controller.state().current_song, Some(b.clone()));
    assert_eq!(h.controller.phase(), SessionPhase::Active(2));

    release_a.send(()).unwrap();
    ticket_a.settled().await;

    let handle_a = h.engine.handle("A");
    assert!(handle_a.released());
    assert!(!h.engine.handle("B").released());

    let state = h.controller.state();
    assert_eq!(state.current_song, Some(b));
    assert!(state.is_playing);
    assert_eq!(h.controller.phase(), SessionPhase::Active(2));
}

#[tokio::test]
async fn test_burst_of_requests_only_loads_last() {
    let h = harness(SourceMode::FullOnly);

    let mut tickets: Vec<_> = (1..=4).map(|id| h.controller.play(full_song(id))).collect();
    let last = tickets.pop().unwrap();
    last.settled().await;
    for ticket in tickets {
        ticket.settled().await;
    }

    // Superseded before their chains ran, so the engine never saw them
    assert_eq!(h.engine.created(), vec!["https://x/4/full.mp3".to_string()]);
    assert_eq!(h.controller.phase(), SessionPhase::Active(4));
}

#[tokio::test]
async fn test_rapid_requests_converge_on_last() {
    let h = harness(SourceMode::FullOnly);
    let mut gates = Vec::new();
    let mut tickets = Vec::new();

    for id in 1..=3 {
        let locator = format!("https://x/{id}/full.mp3");
        gates.push(h.engine.gate(&locator));
        tickets.push(h.controller.play(full_song(id)));
        settle_until(|| h.engine.created().contains(&locator)).await;
    }
    h.controller.play(full_song(4)).settled().await;
    assert_eq!(h.controller.phase(), SessionPhase::Active(4));

    // Stale loads resolve after the last one installed, out of order
    let mut gates = gates.into_iter();
    let first = gates.next().unwrap();
    for gate in gates.rev() {
        gate.send(()).unwrap();
    }
    first.send(()).unwrap();
    for ticket in tickets {
        ticket.settled().await;
    }

    let state = h.controller.state();
    assert_eq!(state.current_song.unwrap().id, SongId::Numeric(4));
    assert!(state.is_playing);
    assert_eq!(h.controller.phase(), SessionPhase::Active(4));
    for id in 1..=3 {
        assert!(h.engine.handle(&format!("https://x/{id}/full.mp3")).released());
    }
    assert!(!h.engine.handle("https://x/4/full.mp3").released());
}

#[tokio::test]
async fn test_at_most_one_completion_mark() {
    let mut h = harness(SourceMode::FullOnly);
    h.controller.play(full_song(7)).settled().await;
    let handle = h.engine.handle("https://x/7/full.mp3");

    handle.emit(StatusUpdate::finished(DURATION_MS));
    handle.emit(StatusUpdate::finished(DURATION_MS));

    settle_until(|| h.recorder.count() == 1 && handle.released()).await;
    drain().await;

    assert_eq!(h.recorder.count(), 1);
    let request = h.recorder.requests.lock()[0].clone();
    assert_eq!(request.song_id, "7");
    assert_eq!(request.kind, MarkKind::Play);

    let state = h.controller.state();
    assert!(!state.is_playing);
    assert_eq!(state.position_ms, DURATION_MS);
    assert_eq!(h.controller.phase(), SessionPhase::Idle);

    let completed = playback_events(&mut h.events)
        .into_iter()
        .filter(|e| matches!(e, PlaybackEvent::Completed { .. }))
        .count();
    assert_eq!(completed, 1);
}

#[tokio::test]
async fn test_each_play_through_gets_its_own_mark() {
    let h = harness(SourceMode::FullOnly);

    for _ in 0..2 {
        h.controller.play(full_song(7)).settled().await;
        let handle = h.engine.handle("https://x/7/full.mp3");
        handle.emit(StatusUpdate::finished(DURATION_MS));
        settle_until(|| handle.released()).await;
    }

    settle_until(|| h.recorder.count() == 2).await;
}

#[tokio::test]
async fn test_retry_once_teaser_to_full() {
    let mut h = harness(SourceMode::TeaserPreferred);
    h.engine.fail("T");

    h.controller.play(song(5, Some("T"), Some("F"))).settled().await;

    assert_eq!(h.engine.created(), vec!["T".to_string(), "F".to_string()]);
    assert!(h.controller.state().is_playing);
    assert_eq!(h.controller.phase(), SessionPhase::Active(1));

    let events = playback_events(&mut h.events);
    assert!(events.contains(&PlaybackEvent::FallbackAttempted {
        song_id: "5".to_string(),
        attempted_uri: "T".to_string(),
    }));
    assert!(events.contains(&PlaybackEvent::Started {
        song_id: "5".to_string(),
        source_kind: "full".to_string(),
        locator: "F".to_string(),
    }));
}

#[tokio::test]
async fn test_retry_once_no_further_retries() {
    let mut h = harness(SourceMode::TeaserPreferred);
    h.engine.fail("T");
    h.engine.fail("F");

    h.controller.play(song(5, Some("T"), Some("F"))).settled().await;

    assert_eq!(h.engine.created(), vec!["T".to_string(), "F".to_string()]);
    let state = h.controller.state();
    assert!(!state.is_playing);
    assert_eq!(h.controller.phase(), SessionPhase::Idle);

    let errors: Vec<_> = playback_events(&mut h.events)
        .into_iter()
        .filter(|e| matches!(e, PlaybackEvent::Error { .. }))
        .collect();
    assert_eq!(errors.len(), 1);
}

#[tokio::test]
async fn test_full_source_failure_is_not_retried() {
    let h = harness(SourceMode::FullOnly);
    h.engine.fail("F");

    h.controller.play(song(5, Some("T"), Some("F"))).settled().await;

    assert_eq!(h.engine.created(), vec!["F".to_string()]);
    assert!(!h.controller.state().is_playing);
}

#[tokio::test]
async fn test_teaser_without_distinct_full_is_not_retried() {
    let h = harness(SourceMode::TeaserPreferred);
    h.engine.fail("T");

    h.controller.play(song(5, Some("T"), Some("T"))).settled().await;

    assert_eq!(h.engine.created(), vec!["T".to_string()]);
    assert!(!h.controller.state().is_playing);
}

#[tokio::test]
async fn test_example_song_42() {
    let mut h = harness(SourceMode::TeaserPreferred);
    h.engine.fail("https://x/teaser.mp3");
    let s = song(42, Some("https://x/teaser.mp3"), Some("https://x/full.mp3"));

    h.controller.play(s).settled().await;
    assert_eq!(
        h.engine.created(),
        vec![
            "https://x/teaser.mp3".to_string(),
            "https://x/full.mp3".to_string()
        ]
    );
    assert!(playback_events(&mut h.events).contains(&PlaybackEvent::FallbackAttempted {
        song_id: "42".to_string(),
        attempted_uri: "https://x/teaser.mp3".to_string(),
    }));

    let handle = h.engine.handle("https://x/full.mp3");
    handle.emit(StatusUpdate::progress(29_900, DURATION_MS));
    handle.emit(StatusUpdate::finished(DURATION_MS));
    settle_until(|| h.recorder.count() == 1).await;
    drain().await;

    let requests = h.recorder.requests.lock().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].song_id, "42");
    assert_eq!(requests[0].kind, MarkKind::Play);
    assert_eq!(requests[0].actor_id, "anon-test");
}

#[tokio::test]
async fn test_no_source_clears_state() {
    let h = harness(SourceMode::TeaserPreferred);

    h.controller.play(song(3, Some(" "), None)).settled().await;

    let state = h.controller.state();
    assert_eq!(state.current_song, None);
    assert!(!state.is_playing);
    assert_eq!((state.position_ms, state.duration_ms), (0, 0));
    assert!(h.engine.created().is_empty());
    assert_eq!(h.controller.phase(), SessionPhase::Idle);
}

#[tokio::test]
async fn test_resolved_locator_plays_as_full_source() {
    let h = harness(SourceMode::FullOnly);
    let s = song(3, Some("T"), None);

    h.controller
        .play_request(s.clone(), Some("R".to_string()))
        .settled()
        .await;
    assert_eq!(h.engine.created(), vec!["R".to_string()]);

    h.controller
        .play_request(s, Some("T".to_string()))
        .settled()
        .await;
    assert_eq!(h.engine.created(), vec!["R".to_string()]);
    assert_eq!(h.controller.state().current_song, None);
}

#[tokio::test]
async fn test_mode_read_once_per_play() {
    let mode = Arc::new(SwitchableMode {
        teaser: AtomicBool::new(true),
        reads: AtomicUsize::new(0),
    });
    let h = harness_with_mode(mode.clone());
    let s = song(9, Some("T"), Some("F"));

    h.controller.play(s.clone()).settled().await;
    mode.teaser.store(false, Ordering::SeqCst);
    h.controller.play(s).settled().await;

    assert_eq!(h.engine.created(), vec!["T".to_string(), "F".to_string()]);
    assert_eq!(mode.reads.load(Ordering::SeqCst), 2);
    assert!(h.engine.handle("T").released());
}

#[tokio::test]
async fn test_progress_is_throttled_but_finish_is_not() {
    let h = harness(SourceMode::FullOnly);
    h.clock.set(10_000);
    h.controller.play(full_song(1)).settled().await;
    let handle = h.engine.handle("https://x/1/full.mp3");

    handle.emit(StatusUpdate::progress(1_000, DURATION_MS));
    settle_until(|| h.controller.state().position_ms == 1_000).await;

    h.clock.set(10_050);
    handle.emit(StatusUpdate::progress(1_500, DURATION_MS));
    drain().await;
    assert_eq!(h.controller.state().position_ms, 1_000);

    h.clock.set(10_100);
    handle.emit(StatusUpdate::progress(2_000, DURATION_MS));
    settle_until(|| h.controller.state().position_ms == 2_000).await;

    h.clock.set(10_110);
    handle.emit(StatusUpdate::finished(DURATION_MS));
    settle_until(|| !h.controller.state().is_playing).await;
    assert_eq!(h.controller.state().position_ms, DURATION_MS);
}

#[tokio::test]
async fn test_state_watch_sees_updates() {
    let h = harness(SourceMode::FullOnly);
    let mut watch = h.controller.subscribe_state();

    h.controller.play(full_song(1)).settled().await;

    assert!(watch.has_changed().unwrap());
    let state = watch.borrow_and_update().clone();
    assert_eq!(state.current_song.unwrap().id, SongId::Numeric(1));
    assert_eq!(state.duration_ms, DURATION_MS);
}

#[tokio::test]
async fn test_pause_and_resume() {
    let h = harness(SourceMode::FullOnly);
    h.controller.play(full_song(1)).settled().await;
    let handle = h.engine.handle("https://x/1/full.mp3");

    h.controller.pause().await;
    assert!(!h.controller.state().is_playing);
    assert_eq!(handle.pauses.load(Ordering::SeqCst), 1);

    h.controller.resume().await;
    assert!(h.controller.state().is_playing);
    assert_eq!(handle.plays.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_pause_failure_treated_as_paused() {
    let h = harness(SourceMode::FullOnly);
    h.controller.play(full_song(1)).settled().await;
    let handle = h.engine.handle("https://x/1/full.mp3");
    handle.fail_control.store(true, Ordering::SeqCst);

    h.controller.pause().await;

    assert!(!h.controller.state().is_playing);
    assert_eq!(h.controller.phase(), SessionPhase::Active(1));
}

#[tokio::test]
async fn test_resume_failure_rolls_back() {
    let mut h = harness(SourceMode::FullOnly);
    h.controller.play(full_song(1)).settled().await;
    let handle = h.engine.handle("https://x/1/full.mp3");
    h.controller.pause().await;
    handle.fail_control.store(true, Ordering::SeqCst);
    playback_events(&mut h.events);

    h.controller.resume().await;

    assert!(!h.controller.state().is_playing);
    assert_eq!(h.controller.phase(), SessionPhase::Active(1));
    let events = playback_events(&mut h.events);
    assert!(events.iter().any(|event| matches!(
        event,
        PlaybackEvent::Error { song_id: Some(id), message, recoverable: true }
            if id == "1" && message.starts_with("Engine control failed:")
    )));
}

#[tokio::test]
async fn test_resume_without_handle_replays_current_song() {
    let h = harness(SourceMode::FullOnly);
    h.controller.play(full_song(1)).settled().await;
    let handle = h.engine.handle("https://x/1/full.mp3");
    handle.emit(StatusUpdate::finished(DURATION_MS));
    settle_until(|| h.controller.phase() == SessionPhase::Idle).await;

    h.controller.resume().await;

    assert_eq!(h.engine.created().len(), 2);
    assert!(h.controller.state().is_playing);
    assert_eq!(h.controller.phase(), SessionPhase::Active(2));
}

#[tokio::test]
async fn test_toggle_play_flips_from_engine_status() {
    let h = harness(SourceMode::FullOnly);
    h.controller.play(full_song(1)).settled().await;
    let handle = h.engine.handle("https://x/1/full.mp3");

    h.controller.toggle_play(None).await;
    assert!(!h.controller.state().is_playing);
    assert_eq!(handle.pauses.load(Ordering::SeqCst), 1);

    h.controller.toggle_play(Some(full_song(1))).await;
    assert!(h.controller.state().is_playing);
    assert_eq!(handle.plays.load(Ordering::SeqCst), 1);
    assert_eq!(h.controller.current_token(), 1);
}

#[tokio::test]
async fn test_toggle_play_with_other_song_plays_it() {
    let h = harness(SourceMode::FullOnly);
    h.controller.play(full_song(1)).settled().await;

    h.controller.toggle_play(Some(full_song(2))).await;

    assert_eq!(h.controller.current_token(), 2);
    assert_eq!(
        h.controller.state().current_song.unwrap().id,
        SongId::Numeric(2)
    );
    assert!(h.engine.handle("https://x/1/full.mp3").released());
}

#[tokio::test]
async fn test_toggle_play_without_handle_replays_current() {
    let h = harness(SourceMode::FullOnly);
    h.controller.play(full_song(1)).settled().await;
    h.controller.stop().await;

    h.controller.toggle_play(None).await;

    assert_eq!(h.controller.current_token(), 2);
    assert!(h.controller.state().is_playing);
}

#[tokio::test]
async fn test_toggle_with_nothing_is_noop() {
    let h = harness(SourceMode::FullOnly);
    h.controller.toggle_play(None).await;
    assert_eq!(h.controller.current_token(), 0);
    assert!(h.engine.created().is_empty());
}

#[tokio::test]
async fn test_stop_releases_handle_without_new_token() {
    let h = harness(SourceMode::FullOnly);
    h.controller.play(full_song(1)).settled().await;
    let handle = h.engine.handle("https://x/1/full.mp3");
    h.controller.seek(12_000).await;

    h.controller.stop().await;

    let state = h.controller.state();
    assert!(!state.is_playing);
    assert_eq!((state.position_ms, state.duration_ms), (0, 0));
    assert!(handle.released());
    assert_eq!(h.controller.current_token(), 1);
    assert_eq!(h.controller.phase(), SessionPhase::Idle);
}

#[tokio::test]
async fn test_pause_while_loading_is_honored_on_install() {
    let h = harness(SourceMode::FullOnly);
    let gate = h.engine.gate("https://x/1/full.mp3");

    let ticket = h.controller.play(full_song(1));
    h.controller.pause().await;
    gate.send(()).unwrap();
    ticket.settled().await;

    let handle = h.engine.handle("https://x/1/full.mp3");
    assert_eq!(handle.pauses.load(Ordering::SeqCst), 1);
    assert!(!h.controller.state().is_playing);
    assert_eq!(h.controller.phase(), SessionPhase::Active(1));
}

#[tokio::test]
async fn test_seek_updates_position_on_success_only() {
    let mut h = harness(SourceMode::FullOnly);
    h.controller.play(full_song(1)).settled().await;
    let handle = h.engine.handle("https://x/1/full.mp3");

    h.controller.seek(15_000).await;
    assert_eq!(h.controller.state().position_ms, 15_000);
    assert_eq!(*handle.seeks.lock(), vec![15_000]);

    handle.fail_control.store(true, Ordering::SeqCst);
    playback_events(&mut h.events);
    h.controller.seek(20_000).await;
    assert_eq!(h.controller.state().position_ms, 15_000);
    assert!(h.controller.state().is_playing);
    let events = playback_events(&mut h.events);
    assert!(events.iter().any(|event| matches!(
        event,
        PlaybackEvent::Error { message, recoverable: true, .. }
            if message.contains("refused")
    )));
}

#[tokio::test]
async fn test_next_and_prev_wrap_around() {
    let h = harness(SourceMode::FullOnly);
    let playlist: Vec<Song> = (1..=3).map(full_song).collect();

    assert!(h.controller.next(&playlist).is_none());

    h.controller.play(playlist[2].clone()).settled().await;
    h.controller.next(&playlist).unwrap().settled().await;
    assert_eq!(
        h.controller.state().current_song.unwrap().id,
        SongId::Numeric(1)
    );

    h.controller.prev(&playlist).unwrap().settled().await;
    assert_eq!(
        h.controller.state().current_song.unwrap().id,
        SongId::Numeric(3)
    );

    assert!(h.controller.next(&[]).is_none());
}

#[tokio::test]
async fn test_next_and_prev_ignore_song_outside_playlist() {
    let h = harness(SourceMode::FullOnly);
    let playlist: Vec<Song> = (1..=3).map(full_song).collect();
    h.controller.play(full_song(9)).settled().await;

    assert!(h.controller.next(&playlist).is_none());
    assert!(h.controller.prev(&playlist).is_none());

    assert_eq!(h.controller.current_token(), 1);
    assert_eq!(
        h.controller.state().current_song.unwrap().id,
        SongId::Numeric(9)
    );
    assert_eq!(h.controller.phase(), SessionPhase::Active(1));
    assert_eq!(h.engine.created(), vec!["https://x/9/full.mp3".to_string()]);
}

#[tokio::test]
async fn test_mark_failure_does_not_affect_playback() {
    let h = harness(SourceMode::FullOnly);
    h.recorder.fail.store(true, Ordering::SeqCst);
    h.controller.play(full_song(1)).settled().await;
    let handle = h.engine.handle("https://x/1/full.mp3");

    handle.emit(StatusUpdate::finished(DURATION_MS));
    settle_until(|| h.recorder.count() == 1).await;
    drain().await;

    assert_eq!(h.recorder.count(), 1);
    assert!(!h.controller.state().is_playing);

    h.controller.play(full_song(2)).settled().await;
    assert!(h.controller.state().is_playing);
    assert_eq!(h.controller.phase(), SessionPhase::Active(2));
}

#[tokio::test]
async fn test_failed_teardown_does_not_block_next_request() {
    let h = harness(SourceMode::FullOnly);
    h.controller.play(full_song(1)).settled().await;
    let first = h.engine.handle("https://x/1/full.mp3");
    first.fail_teardown.store(true, Ordering::SeqCst);

    h.controller.play(full_song(2)).settled().await;

    assert_eq!(first.unloads.load(Ordering::SeqCst), 1);
    assert!(h.controller.state().is_playing);
    assert_eq!(h.controller.phase(), SessionPhase::Active(2));
}

#[tokio::test]
async fn test_status_from_superseded_handle_is_ignored() {
    let h = harness(SourceMode::FullOnly);
    h.controller.play(full_song(1)).settled().await;
    let old = h.engine.handle("https://x/1/full.mp3");
    let gate = h.engine.gate("https://x/2/full.mp3");

    let ticket = h.controller.play(full_song(2));
    old.emit(StatusUpdate::progress(5_000, DURATION_MS));
    old.emit(StatusUpdate::finished(DURATION_MS));
    drain().await;

    assert_eq!(h.recorder.count(), 0);
    assert_eq!(h.controller.state().position_ms, 0);
    assert!(h.controller.state().is_playing);

    gate.send(()).unwrap();
    ticket.settled().await;
    assert_eq!(h.controller.phase(), SessionPhase::Active(2));
}
