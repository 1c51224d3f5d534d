//! # Host Bridge Traits
//!
//! Collaborator contracts that the playback core consumes but never implements
//! itself.
//!
//! ## Overview
//!
//! The playback core owns request sequencing, source selection and completion
//! marking. Everything that touches the outside world goes through a trait in
//! this crate so hosts (desktop, mobile, tests) can inject their own adapters.
//!
//! ## Traits
//!
//! ### Playback
//! - [`MediaEngine`](media::MediaEngine) - Creates decodable audio handles from locators
//! - [`MediaHandle`](media::MediaHandle) - Controls one loaded source and streams status updates
//! - [`PlaybackModeProvider`](mode::PlaybackModeProvider) - Teaser-preferred vs. full-only flag
//!
//! ### Marks & Identity
//! - [`RemoteMarkRecorder`](marks::RemoteMarkRecorder) - Records play/teaser/purchase marks remotely
//! - [`ActorIdentityProvider`](identity::ActorIdentityProvider) - Stable anonymous or authenticated actor id
//!
//! ### Storage
//! - [`SettingsStore`](storage::SettingsStore) - Key-value persistence (ledger, anonymous id, mode flag)
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic throttle tests
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Adapters should
//! convert platform errors into it and keep the message actionable (include
//! the locator, key or endpoint involved).
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so adapters can be shared across
//! the tasks the controller spawns for each play request.

pub mod error;
pub mod identity;
pub mod marks;
pub mod media;
pub mod mode;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use identity::ActorIdentityProvider;
pub use marks::{MarkKind, MarkRequest, MarkResult, RemoteMarkRecorder};
pub use media::{MediaEngine, MediaHandle, MediaStatus, StatusStream, StatusUpdate};
pub use mode::{PlaybackModeProvider, SourceMode};
pub use storage::SettingsStore;
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
