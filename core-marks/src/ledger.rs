//! Persisted at-most-once ledger of lifetime marks.
//!
//! The ledger is a nested map `actor_id -> song_id -> {kinds}` serialized as
//! JSON under [`LEDGER_KEY`] in the host settings store:
//!
//! ```json
//! { "anon-6f1c...": { "42": ["teaser"], "77": ["teaser", "purchase"] } }
//! ```
//!
//! It is read from the store once, on first use, and cached for the lifetime
//! of the process. Entries are never removed here; expiry is the host's call.

use crate::error::{MarkError, Result};
use bridge_traits::{MarkKind, SettingsStore};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Settings key holding the serialized ledger.
pub const LEDGER_KEY: &str = "marks.ledger";

type LedgerMap = BTreeMap<String, BTreeMap<String, BTreeSet<MarkKind>>>;

/// Cross-session record of which marks were already accepted remotely.
pub struct MarkLedger {
    store: Arc<dyn SettingsStore>,
    entries: Mutex<Option<LedgerMap>>,
}

impl MarkLedger {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            entries: Mutex::new(None),
        }
    }

    /// Returns `true` if `kind` is already recorded for the pair.
    pub async fn contains(&self, actor_id: &str, song_id: &str, kind: MarkKind) -> Result<bool> {
        let mut guard = self.entries.lock().await;
        let entries = self.loaded(&mut guard).await?;

        Ok(entries
            .get(actor_id)
            .and_then(|songs| songs.get(song_id))
            .is_some_and(|kinds| kinds.contains(&kind)))
    }

    /// Kinds recorded for the pair, in stable order.
    pub async fn kinds(&self, actor_id: &str, song_id: &str) -> Result<Vec<MarkKind>> {
        let mut guard = self.entries.lock().await;
        let entries = self.loaded(&mut guard).await?;

        Ok(entries
            .get(actor_id)
            .and_then(|songs| songs.get(song_id))
            .map(|kinds| kinds.iter().copied().collect())
            .unwrap_or_default())
    }

    /// Records `kind` for the pair and writes the ledger back to the store.
    ///
    /// Returns `false` if the entry already existed. A failed write is logged
    /// and the in-memory entry is kept: the remote side already accepted the
    /// mark, so forgetting it would only cause a duplicate later.
    pub async fn insert(&self, actor_id: &str, song_id: &str, kind: MarkKind) -> Result<bool> {
        let mut guard = self.entries.lock().await;
        let entries = self.loaded(&mut guard).await?;

        let inserted = entries
            .entry(actor_id.to_string())
            .or_default()
            .entry(song_id.to_string())
            .or_default()
            .insert(kind);

        if !inserted {
            return Ok(false);
        }

        match serde_json::to_string(&*entries) {
            Ok(json) => {
                if let Err(e) = self.store.set_string(LEDGER_KEY, &json).await {
                    warn!(
                        song_id = %song_id,
                        kind = %kind,
                        error = %e,
                        "Failed to persist mark ledger; entry kept in memory"
                    );
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to serialize mark ledger");
            }
        }

        Ok(true)
    }

    async fn loaded<'a>(&self, slot: &'a mut Option<LedgerMap>) -> Result<&'a mut LedgerMap> {
        if slot.is_none() {
            let raw = self
                .store
                .get_string(LEDGER_KEY)
                .await
                .map_err(|e| MarkError::Ledger(format!("failed to read {LEDGER_KEY}: {e}")))?;

            let map = match raw {
                Some(json) => serde_json::from_str::<LedgerMap>(&json).unwrap_or_else(|e| {
                    warn!(error = %e, "Mark ledger is corrupted; starting from an empty ledger");
                    LedgerMap::new()
                }),
                None => LedgerMap::new(),
            };

            debug!(actors = map.len(), "Mark ledger loaded");
            *slot = Some(map);
        }

        slot.as_mut()
            .ok_or_else(|| MarkError::Ledger("ledger not loaded".to_string()))
    }
}
