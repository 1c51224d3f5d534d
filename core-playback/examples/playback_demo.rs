//! # Playback Controller Walkthrough
//!
//! Drives a [`PlaybackController`] against a scripted in-memory engine: the
//! teaser locator fails to decode, the controller falls back to the full
//! source, the track plays to the end and a completion mark is recorded.
//!
//! Run with: `cargo run --example playback_demo --package core-playback`

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    ActorIdentityProvider, BridgeError, LogLevel, MarkRequest, MarkResult, MediaEngine,
    MediaHandle, MediaStatus, RemoteMarkRecorder, SettingsStore, SourceMode, StatusStream,
    StatusUpdate,
};
use core_marks::MarkClient;
use core_playback::{PlaybackController, Song, StaticMode};
use core_runtime::events::CoreEvent;
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Scripted engine
// ============================================================================

/// Plays a track of `duration_ms` in ten progress steps. Locators containing
/// "teaser" fail to load.
struct ScriptedEngine {
    duration_ms: u64,
}

#[async_trait]
impl MediaEngine for ScriptedEngine {
    async fn create(&self, locator: &str) -> BridgeResult<Arc<dyn MediaHandle>> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        if locator.contains("teaser") {
            return Err(BridgeError::Engine(format!("unsupported codec in {locator}")));
        }
        Ok(Arc::new(ScriptedHandle {
            duration_ms: self.duration_ms,
            status: Mutex::new(MediaStatus {
                position_ms: 0,
                duration_ms: self.duration_ms,
                is_playing: true,
            }),
        }))
    }
}

struct ScriptedHandle {
    duration_ms: u64,
    status: Mutex<MediaStatus>,
}

#[async_trait]
impl MediaHandle for ScriptedHandle {
    async fn status(&self) -> BridgeResult<MediaStatus> {
        Ok(*self.status.lock())
    }

    fn subscribe(&self) -> StatusStream {
        let duration_ms = self.duration_ms;
        let step = duration_ms / 10;
        futures::stream::iter(1..=10u64)
            .then(move |i| async move {
                tokio::time::sleep(Duration::from_millis(60)).await;
                if i == 10 {
                    StatusUpdate::finished(duration_ms)
                } else {
                    StatusUpdate::progress(i * step, duration_ms)
                }
            })
            .boxed()
    }

    async fn play(&self) -> BridgeResult<()> {
        self.status.lock().is_playing = true;
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        self.status.lock().is_playing = false;
        Ok(())
    }

    async fn set_position(&self, position_ms: u64) -> BridgeResult<()> {
        self.status.lock().position_ms = position_ms;
        Ok(())
    }

    async fn stop(&self) -> BridgeResult<()> {
        self.status.lock().is_playing = false;
        Ok(())
    }

    async fn unload(&self) -> BridgeResult<()> {
        Ok(())
    }
}

// ============================================================================
// Marks backend
// ============================================================================

struct PrintingRecorder;

#[async_trait]
impl RemoteMarkRecorder for PrintingRecorder {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn record(&self, request: MarkRequest) -> BridgeResult<MarkResult> {
        println!(
            "  -> mark {} for song {} by {}",
            request.kind, request.song_id, request.actor_id
        );
        Ok(MarkResult {
            total_marks: Some(1),
            ..Default::default()
        })
    }
}

struct DemoActor;

#[async_trait]
impl ActorIdentityProvider for DemoActor {
    async fn actor_id(&self) -> BridgeResult<String> {
        Ok("anon-demo".to_string())
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
        self.set_string(key, &value.to_string()).await
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

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    init_logging(
        LoggingConfig::default()
            .with_format(LogFormat::Compact)
            .with_level(LogLevel::Info),
    )
    .ok();

    println!("=== Playback Controller Demo ===\n");

    let marks = Arc::new(MarkClient::new(
        Arc::new(PrintingRecorder),
        Arc::new(DemoActor),
        Arc::new(MemorySettings::default()),
    ));
    let controller = PlaybackController::new(
        Arc::new(ScriptedEngine { duration_ms: 3_000 }),
        marks,
        Arc::new(StaticMode(SourceMode::TeaserPreferred)),
    );

    let mut events = controller.subscribe_events();
    let printer = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if let CoreEvent::Playback(event) = &event {
                println!("[event] {:?}", event);
            }
        }
    });

    let song = Song::new(42u64, "Night Drive", "The Examples")
        .with_teaser_source("https://cdn.example.com/42/teaser.mp3")
        .with_full_source("https://cdn.example.com/42/full.mp3?sig=abc");

    println!("Playing '{}' (teaser preferred)", song.title);
    controller.play(song).settled().await;

    let state = controller.state();
    println!(
        "Now playing: {:?}, playing={}, duration={}ms\n",
        state.current_song.as_ref().map(|s| &s.title),
        state.is_playing,
        state.duration_ms
    );

    let mut watch = controller.subscribe_state();
    while watch.changed().await.is_ok() {
        if !watch.borrow().is_playing {
            break;
        }
    }

    // Let the completion mark go out
    tokio::time::sleep(Duration::from_millis(100)).await;

    let state = controller.state();
    println!(
        "\nFinished at {}/{}ms, playing={}",
        state.position_ms, state.duration_ms, state.is_playing
    );

    printer.abort();
    println!("\n=== Demo Complete ===");
}
