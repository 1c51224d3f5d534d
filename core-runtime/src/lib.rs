//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the playback core:
//! - Logging and tracing infrastructure
//! - Configuration management
//! - Event bus system
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the `core-*` crates depend on.
//! It establishes logging conventions, the fail-fast configuration builder and
//! the broadcast channel observers use to follow playback.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
