//! Settings-backed actor identity.
//!
//! Anonymous listeners get an `anon-<uuid>` id that is generated once and
//! persisted under [`ANONYMOUS_ACTOR_KEY`], so marks recorded before and after
//! an app restart are attributed to the same actor. Signing in switches the
//! actor id to the user id until [`PersistentActorIdentity::sign_out`].

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{ActorIdentityProvider, SettingsStore};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Settings key holding the anonymous actor id.
pub const ANONYMOUS_ACTOR_KEY: &str = "identity.anonymous_actor_id";

const ANONYMOUS_PREFIX: &str = "anon-";

/// [`ActorIdentityProvider`] that persists its anonymous id in a [`SettingsStore`].
pub struct PersistentActorIdentity {
    store: Arc<dyn SettingsStore>,
    anonymous_id: Mutex<Option<String>>,
    user_id: RwLock<Option<String>>,
}

impl PersistentActorIdentity {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self {
            store,
            anonymous_id: Mutex::new(None),
            user_id: RwLock::new(None),
        }
    }

    /// Attribute subsequent marks to an authenticated user.
    pub fn sign_in(&self, user_id: impl Into<String>) {
        *self.user_id.write() = Some(user_id.into());
        info!("Actor identity switched to authenticated user");
    }

    /// Revert to the persisted anonymous id.
    pub fn sign_out(&self) {
        *self.user_id.write() = None;
        info!("Actor identity reverted to anonymous");
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.read().is_some()
    }

    /// The persisted anonymous id, generating and storing one on first use.
    pub async fn anonymous_id(&self) -> BridgeResult<String> {
        let mut cached = self.anonymous_id.lock().await;
        if let Some(id) = cached.as_ref() {
            return Ok(id.clone());
        }

        let stored = self
            .store
            .get_string(ANONYMOUS_ACTOR_KEY)
            .await?
            .filter(|id| !id.trim().is_empty());

        let id = match stored {
            Some(id) => {
                debug!(actor_id = %id, "Loaded anonymous actor id");
                id
            }
            None => {
                let id = format!("{}{}", ANONYMOUS_PREFIX, Uuid::new_v4());
                if let Err(e) = self.store.set_string(ANONYMOUS_ACTOR_KEY, &id).await {
                    // Still stable for this process; a new id is minted after restart
                    warn!(error = %e, "Failed to persist anonymous actor id");
                } else {
                    info!(actor_id = %id, "Generated anonymous actor id");
                }
                id
            }
        };

        *cached = Some(id.clone());
        Ok(id)
    }
}

#[async_trait]
impl ActorIdentityProvider for PersistentActorIdentity {
    async fn actor_id(&self) -> BridgeResult<String> {
        let user = self.user_id.read().clone();
        if let Some(user) = user {
            return Ok(user);
        }
        self.anonymous_id().await
    }

    async fn user_id(&self) -> BridgeResult<Option<String>> {
        Ok(self.user_id.read().clone())
    }
}
