//! Typing tracker
//!
//! Per-user debounced "is typing" state with automatic expiry. Timers never
//! touch the shared map directly: each armed timer posts a generation-tagged
//! expiry command over a channel, and the hub applies it through [`TypingTracker::expire`],
//! which discards commands from superseded timers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Expiry command posted by a typing timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypingExpired {
    pub user_id: Uuid,
    pub generation: u64,
}

#[derive(Debug)]
struct TypingEntry {
    generation: u64,
    connection_id: Uuid,
    username: String,
    timer: JoinHandle<()>,
}

/// Tracks which users are currently typing
///
/// Invariant: an entry exists iff the user is considered typing. At most one
/// entry (and one live timer) per user; re-arming replaces the previous timer.
pub struct TypingTracker {
    entries: Mutex<HashMap<Uuid, TypingEntry>>,
    expiry: Duration,
    expired_tx: mpsc::UnboundedSender<TypingExpired>,
    generation: AtomicU64,
}

impl TypingTracker {
    /// Create a tracker and the receiver the hub drains for expiry commands
    pub fn new(expiry: Duration) -> (Self, mpsc::UnboundedReceiver<TypingExpired>) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        (
            Self {
                entries: Mutex::new(HashMap::new()),
                expiry,
                expired_tx,
                generation: AtomicU64::new(0),
            },
            expired_rx,
        )
    }

    /// Mark a user as typing, replacing any pending expiry timer (debounce)
    pub async fn start(&self, user_id: Uuid, connection_id: Uuid, username: &str) {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let tx = self.expired_tx.clone();
        let expiry = self.expiry;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(expiry).await;
            // Receiver gone means the hub is shutting down
            let _ = tx.send(TypingExpired {
                user_id,
                generation,
            });
        });

        let mut entries = self.entries.lock().await;
        if let Some(previous) = entries.insert(
            user_id,
            TypingEntry {
                generation,
                connection_id,
                username: username.to_string(),
                timer,
            },
        ) {
            previous.timer.abort();
        }
    }

    /// Explicit stop: cancel the pending timer and remove the entry
    ///
    /// Returns whether the user was typing.
    pub async fn stop(&self, user_id: Uuid) -> bool {
        let mut entries = self.entries.lock().await;
        match entries.remove(&user_id) {
            Some(entry) => {
                entry.timer.abort();
                true
            }
            None => false,
        }
    }

    /// Clear the entry if it belongs to this connection
    ///
    /// Used on message send and on disconnect; neither emits a stop
    /// broadcast. A second connection's typing state is left untouched.
    pub async fn clear_connection(&self, user_id: Uuid, connection_id: Uuid) {
        let mut entries = self.entries.lock().await;
        let owned = entries
            .get(&user_id)
            .is_some_and(|e| e.connection_id == connection_id);
        if owned {
            if let Some(entry) = entries.remove(&user_id) {
                entry.timer.abort();
            }
        }
    }

    /// Apply a timer expiry command
    ///
    /// A stale command (the user re-typed, stopped, or sent a message since
    /// the timer was armed) is a no-op. On a live expiry, returns the
    /// originating connection and username for the stop broadcast.
    pub async fn expire(&self, user_id: Uuid, generation: u64) -> Option<(Uuid, String)> {
        let mut entries = self.entries.lock().await;
        let live = entries
            .get(&user_id)
            .is_some_and(|e| e.generation == generation);
        if !live {
            return None;
        }
        entries
            .remove(&user_id)
            .map(|e| (e.connection_id, e.username))
    }

    /// Whether the user is currently considered typing
    pub async fn is_typing(&self, user_id: Uuid) -> bool {
        self.entries.lock().await.contains_key(&user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPIRY: Duration = Duration::from_millis(3000);

    #[tokio::test(start_paused = true)]
    async fn test_timer_expiry_reports_user() {
        let (tracker, mut rx) = TypingTracker::new(EXPIRY);
        let user = Uuid::new_v4();
        let conn = Uuid::new_v4();

        tracker.start(user, conn, "alice").await;
        assert!(tracker.is_typing(user).await);

        let expired = rx.recv().await.unwrap();
        assert_eq!(expired.user_id, user);

        let stopped = tracker.expire(expired.user_id, expired.generation).await;
        assert_eq!(stopped, Some((conn, "alice".to_string())));
        assert!(!tracker.is_typing(user).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_replaces_timer() {
        let (tracker, mut rx) = TypingTracker::new(EXPIRY);
        let user = Uuid::new_v4();
        let conn = Uuid::new_v4();

        tracker.start(user, conn, "alice").await;
        tokio::time::sleep(Duration::from_millis(2000)).await;
        tracker.start(user, conn, "alice").await;

        // Only the refreshed timer fires; the superseded one was cancelled
        let expired = rx.recv().await.unwrap();
        assert!(tracker.expire(expired.user_id, expired.generation).await.is_some());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_stop_cancels_timer() {
        let (tracker, mut rx) = TypingTracker::new(EXPIRY);
        let user = Uuid::new_v4();

        tracker.start(user, Uuid::new_v4(), "alice").await;
        assert!(tracker.stop(user).await);
        assert!(!tracker.is_typing(user).await);

        // Past the original deadline: nothing fires
        tokio::time::sleep(EXPIRY + Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());

        // Stopping again is a no-op
        assert!(!tracker.stop(user).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_generation_is_noop() {
        let (tracker, _rx) = TypingTracker::new(EXPIRY);
        let user = Uuid::new_v4();

        tracker.start(user, Uuid::new_v4(), "alice").await;
        let stale = 0; // generations start at 1
        assert!(tracker.expire(user, stale).await.is_none());
        assert!(tracker.is_typing(user).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_connection_respects_owner() {
        let (tracker, _rx) = TypingTracker::new(EXPIRY);
        let user = Uuid::new_v4();
        let conn_a = Uuid::new_v4();
        let conn_b = Uuid::new_v4();

        tracker.start(user, conn_a, "alice").await;

        tracker.clear_connection(user, conn_b).await;
        assert!(tracker.is_typing(user).await);

        tracker.clear_connection(user, conn_a).await;
        assert!(!tracker.is_typing(user).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_expiry_after_clear_is_harmless() {
        let (tracker, mut rx) = TypingTracker::new(EXPIRY);
        let user = Uuid::new_v4();
        let conn = Uuid::new_v4();

        tracker.start(user, conn, "alice").await;
        // Simulate the expiry command racing a disconnect cleanup
        let expired = rx.recv().await.unwrap();
        tracker.clear_connection(user, conn).await;

        assert!(tracker.expire(expired.user_id, expired.generation).await.is_none());
    }
}
