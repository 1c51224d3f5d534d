//! Mark client.
//!
//! Wraps a [`RemoteMarkRecorder`] with two entry points:
//!
//! - [`MarkClient::record_mark_if_needed`]: consults the persisted
//!   [`MarkLedger`] first and only calls the recorder when the
//!   `(actor, song, kind)` triple has never been accepted before. Used for
//!   lifetime-once marks such as `teaser` and `purchase`.
//! - [`MarkClient::record_mark`]: calls the recorder unconditionally. The
//!   playback controller uses it for `play` marks, which are guarded by its
//!   own per-session flag instead of the ledger.
//!
//! Recorder failures are returned to the caller and never written to the
//! ledger, so a later attempt for the same triple still reaches the recorder.
//! The client itself never retries.

use crate::error::{MarkError, Result};
use crate::ledger::MarkLedger;
use bridge_traits::{
    ActorIdentityProvider, MarkKind, MarkRequest, MarkResult, RemoteMarkRecorder, SettingsStore,
};
use core_runtime::events::{CoreEvent, EventBus, MarkEvent};
use core_runtime::logging::redact_if_sensitive;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Outcome of a ledger-guarded mark call.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkOutcome {
    /// `false` when the ledger already held the mark and no call was made.
    pub recorded: bool,
    /// Recorder response, present only when `recorded` is `true`.
    pub result: Option<MarkResult>,
}

impl MarkOutcome {
    pub fn recorded(result: MarkResult) -> Self {
        Self {
            recorded: true,
            result: Some(result),
        }
    }

    pub fn skipped() -> Self {
        Self {
            recorded: false,
            result: None,
        }
    }
}

pub struct MarkClient {
    recorder: Arc<dyn RemoteMarkRecorder>,
    identity: Arc<dyn ActorIdentityProvider>,
    ledger: MarkLedger,
    events: Option<EventBus>,
    // Serializes check-call-insert so concurrent identical requests hit the recorder once
    lifetime_guard: Mutex<()>,
}

impl MarkClient {
    pub fn new(
        recorder: Arc<dyn RemoteMarkRecorder>,
        identity: Arc<dyn ActorIdentityProvider>,
        settings: Arc<dyn SettingsStore>,
    ) -> Self {
        Self {
            recorder,
            identity,
            ledger: MarkLedger::new(settings),
            events: None,
            lifetime_guard: Mutex::new(()),
        }
    }

    /// Publish [`MarkEvent`]s on `bus`.
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    pub fn recorder_name(&self) -> &str {
        self.recorder.name()
    }

    pub fn ledger(&self) -> &MarkLedger {
        &self.ledger
    }

    /// Records `kind` for the pair unless the ledger already holds it.
    pub async fn record_mark_if_needed(
        &self,
        actor_id: &str,
        song_id: &str,
        kind: MarkKind,
    ) -> Result<MarkOutcome> {
        let _guard = self.lifetime_guard.lock().await;

        if self.ledger.contains(actor_id, song_id, kind).await? {
            debug!(song_id = %song_id, kind = %kind, "Mark already recorded; skipping");
            self.publish(MarkEvent::Skipped {
                song_id: song_id.to_string(),
                kind: kind.to_string(),
            });
            return Ok(MarkOutcome::skipped());
        }

        let result = self.record_mark(actor_id, song_id, kind).await?;
        self.ledger.insert(actor_id, song_id, kind).await?;

        Ok(MarkOutcome::recorded(result))
    }

    /// Calls the recorder without consulting the ledger.
    pub async fn record_mark(
        &self,
        actor_id: &str,
        song_id: &str,
        kind: MarkKind,
    ) -> Result<MarkResult> {
        let user_id = self
            .identity
            .user_id()
            .await
            .map_err(|e| MarkError::Identity(e.to_string()))?;

        let request = MarkRequest::new(actor_id, user_id, song_id, kind);
        let user_label = request
            .user_id
            .as_deref()
            .map(|u| redact_if_sensitive("user_id", u))
            .unwrap_or_else(|| "none".to_string());

        match self.recorder.record(request).await {
            Ok(result) => {
                info!(
                    song_id = %song_id,
                    kind = %kind,
                    actor_id = %actor_id,
                    user_id = %user_label,
                    total_marks = ?result.total_marks,
                    recorder = %self.recorder.name(),
                    "Mark recorded"
                );
                self.publish(MarkEvent::Recorded {
                    song_id: song_id.to_string(),
                    kind: kind.to_string(),
                });
                Ok(result)
            }
            Err(e) => {
                warn!(
                    song_id = %song_id,
                    kind = %kind,
                    recorder = %self.recorder.name(),
                    error = %e,
                    "Mark recording failed"
                );
                self.publish(MarkEvent::Failed {
                    song_id: song_id.to_string(),
                    kind: kind.to_string(),
                    message: e.to_string(),
                });
                Err(MarkError::Recorder {
                    recorder: self.recorder.name().to_string(),
                    message: e.to_string(),
                })
            }
        }
    }

    /// Records `kind` for the current actor.
    ///
    /// Lifetime-once kinds go through the ledger; `play` is recorded
    /// unconditionally.
    pub async fn mark_for_current_actor(
        &self,
        song_id: &str,
        kind: MarkKind,
    ) -> Result<MarkOutcome> {
        let actor_id = self
            .identity
            .actor_id()
            .await
            .map_err(|e| MarkError::Identity(e.to_string()))?;

        if kind.is_lifetime_once() {
            self.record_mark_if_needed(&actor_id, song_id, kind).await
        } else {
            self.record_mark(&actor_id, song_id, kind)
                .await
                .map(MarkOutcome::recorded)
        }
    }

    fn publish(&self, event: MarkEvent) {
        if let Some(bus) = &self.events {
            bus.publish(CoreEvent::Mark(event));
        }
    }
}
