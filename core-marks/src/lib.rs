//! # Mark Client
//!
//! Records interaction marks (`teaser`, `purchase`, `play`) against a remote
//! recorder with idempotent-per-entity semantics.
//!
//! ## Overview
//!
//! - [`MarkLedger`] remembers which lifetime marks were already accepted,
//!   persisted in the host [`SettingsStore`](bridge_traits::SettingsStore)
//! - [`MarkClient`] consults the ledger before calling the recorder
//! - [`PersistentActorIdentity`] supplies a stable anonymous actor id that
//!   survives restarts, or the signed-in user id
//!
//! The per-playback one-shot guard for `play` marks lives in the controller,
//! not here.

pub mod client;
pub mod error;
pub mod identity;
pub mod ledger;

pub use client::{MarkClient, MarkOutcome};
pub use error::{MarkError, Result};
pub use identity::{PersistentActorIdentity, ANONYMOUS_ACTOR_KEY};
pub use ledger::{MarkLedger, LEDGER_KEY};
