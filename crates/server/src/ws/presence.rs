//! Presence registry
//!
//! Maps live connection identity to authenticated user and derives the
//! current online-user list. Pure in-memory index: no external side effects.

use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct PresenceEntry {
    connection_id: Uuid,
    user_id: Uuid,
    username: String,
}

/// Registration-ordered index of live connections
///
/// One entry per connection: a user with multiple connections contributes
/// one snapshot entry per connection, without de-duplication.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    entries: RwLock<Vec<PresenceEntry>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection
    pub async fn register(&self, connection_id: Uuid, user_id: Uuid, username: &str) {
        let mut entries = self.entries.write().await;
        entries.push(PresenceEntry {
            connection_id,
            user_id,
            username: username.to_string(),
        });

        tracing::debug!(
            connection_id = %connection_id,
            user_id = %user_id,
            online = entries.len(),
            "Presence registered"
        );
    }

    /// Unregister a connection, returning the removed username if it was known
    ///
    /// Unknown connection ids are a no-op: a disconnect may race with an
    /// authentication failure that never registered.
    pub async fn unregister(&self, connection_id: Uuid) -> Option<String> {
        let mut entries = self.entries.write().await;
        let index = entries
            .iter()
            .position(|e| e.connection_id == connection_id)?;
        let removed = entries.remove(index);

        tracing::debug!(
            connection_id = %connection_id,
            user_id = %removed.user_id,
            online = entries.len(),
            "Presence unregistered"
        );

        Some(removed.username)
    }

    /// Snapshot of all registered usernames, in registration order
    pub async fn snapshot(&self) -> Vec<String> {
        let entries = self.entries.read().await;
        entries.iter().map(|e| e.username.clone()).collect()
    }

    /// Number of registered connections
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
