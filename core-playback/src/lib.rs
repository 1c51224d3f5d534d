//! # Playback Orchestration Core
//!
//! Loads, switches and tears down a single active audio source in response
//! to rapidly arriving, possibly overlapping requests.
//!
//! ## Overview
//!
//! This crate handles:
//! - Source selection between a song's teaser and full locator ([`selector`])
//! - The playback session controller with request tokens, the teaser→full
//!   retry, throttled progress and the one-shot completion mark ([`controller`])
//! - Playlist navigation ([`playlist`]) and mode flag providers ([`mode`])
//!
//! Engine, recorder and identity are host bridges from `bridge-traits`.

pub mod controller;
pub mod error;
pub mod mode;
pub mod playlist;
pub mod selector;
pub mod song;
pub mod state;
pub mod throttle;

pub use controller::{ControllerOptions, PlaybackController, PlaybackTicket};
pub use error::{PlaybackError, Result};
pub use mode::{SettingsModeProvider, StaticMode, TEASER_MODE_KEY};
pub use playlist::Step;
pub use selector::{fallback_source, select_source, Source, SourceKind};
pub use song::{Song, SongId};
pub use state::{PlaybackState, SessionPhase};
pub use throttle::ProgressThrottle;
