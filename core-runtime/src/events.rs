//! # Event Bus System
//!
//! Broadcasts playback and mark events to any number of observers using
//! `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The controller owns the authoritative `PlaybackState` snapshot; this bus
//! carries the *transitions* (started, paused, completed, fallback attempted,
//! mark recorded) so UI layers and analytics can react without polling.
//!
//! ```text
//! ┌────────────┐   emit    ┌───────────┐   subscribe   ┌────────────┐
//! │ Controller ├──────────>│           ├──────────────>│ Now-playing│
//! └────────────┘           │ EventBus  │               └────────────┘
//! ┌────────────┐   emit    │ (broadcast│   subscribe   ┌────────────┐
//! │ MarkClient ├──────────>│  channel) ├──────────────>│ Analytics  │
//! └────────────┘           └───────────┘               └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(16);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(CoreEvent::Playback(PlaybackEvent::Completed {
//!     song_id: "42".to_string(),
//! }))
//! .ok();
//!
//! let event = stream.recv().await.unwrap();
//! assert_eq!(event.description(), "Track completed");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber fell behind and missed `n`
//!   events. Position updates are throttled upstream, so lagging usually means
//!   the subscriber stopped polling.
//! - **`RecvError::Closed`**: every sender was dropped; treat as shutdown.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playback session events
    Playback(PlaybackEvent),
    /// Completion/interaction mark events
    Mark(MarkEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Mark(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Mark(MarkEvent::Failed { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::FallbackAttempted { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::Started { .. })
            | CoreEvent::Playback(PlaybackEvent::Completed { .. })
            | CoreEvent::Mark(MarkEvent::Recorded { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events emitted by the playback session controller.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A play request was accepted and its load chain started.
    Loading {
        song_id: String,
        /// Request token of the load.
        token: u64,
    },
    /// A handle was installed and is playing.
    Started {
        song_id: String,
        /// `"teaser"` or `"full"`.
        source_kind: String,
        locator: String,
    },
    /// Playback paused.
    Paused { song_id: String, position_ms: u64 },
    /// Playback resumed after pause.
    Resumed { song_id: String, position_ms: u64 },
    /// Playback stopped by the caller.
    Stopped { song_id: Option<String> },
    /// Track finished playing naturally.
    Completed { song_id: String },
    /// Throttled progress notification.
    PositionChanged {
        song_id: String,
        position_ms: u64,
        duration_ms: u64,
    },
    /// The teaser failed to load and the full source is being tried.
    FallbackAttempted {
        song_id: String,
        attempted_uri: String,
    },
    /// Playback error occurred.
    Error {
        song_id: Option<String>,
        message: String,
        /// Whether retrying the request could succeed.
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Loading { .. } => "Loading source",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::PositionChanged { .. } => "Playback position changed",
            PlaybackEvent::FallbackAttempted { .. } => "Falling back to full source",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Mark Events
// ============================================================================

/// Events emitted by the mark client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum MarkEvent {
    /// The recorder accepted the mark.
    Recorded { song_id: String, kind: String },
    /// The ledger already held this mark; no remote call was made.
    Skipped { song_id: String, kind: String },
    /// The recorder rejected the mark or was unreachable.
    Failed {
        song_id: String,
        kind: String,
        message: String,
    },
}

impl MarkEvent {
    fn description(&self) -> &str {
        match self {
            MarkEvent::Recorded { .. } => "Mark recorded",
            MarkEvent::Skipped { .. } => "Mark already recorded",
            MarkEvent::Failed { .. } => "Mark recording failed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; every clone publishes to the same
/// subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero. [`CoreConfig`](crate::config::CoreConfig)
    /// rejects a zero buffer size before it gets here.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an error
    /// if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Publishes an event, ignoring the absence of subscribers.
    pub fn publish(&self, event: CoreEvent) {
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}
