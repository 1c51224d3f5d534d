//! Actor identity contract.

use crate::error::Result;

/// Supplies the identifier marks are attributed to.
///
/// The actor id must be stable across calls within a process. Anonymous ids
/// should survive restarts; authenticated ids are the signed-in user's id.
#[async_trait::async_trait]
pub trait ActorIdentityProvider: Send + Sync {
    /// Current actor identifier.
    async fn actor_id(&self) -> Result<String>;

    /// Authenticated user id, `None` for anonymous actors.
    async fn user_id(&self) -> Result<Option<String>> {
        Ok(None)
    }
}
