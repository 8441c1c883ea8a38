//! Process-wide auth signals.
//!
//! Route guards and other listeners subscribe here to learn that a session
//! could not be refreshed and the user has to sign in again.

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 32;

/// Session lifecycle events published by the refresher and session service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    LoggedIn {
        tenant: String,
    },
    Refreshed {
        tenant: String,
        expires_at: Option<DateTime<Utc>>,
    },
    /// The stored session was cleared; re-authentication is required.
    RefreshFailed {
        tenant: String,
        reason: String,
    },
    LoggedOut {
        tenant: String,
    },
}

/// Broadcast bus for [`AuthEvent`]s. Cloning shares the same channel.
#[derive(Debug, Clone)]
pub struct AuthEventBus {
    tx: broadcast::Sender<AuthEvent>,
}

impl Default for AuthEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthEventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event. Having no subscribers is fine.
    pub fn publish(&self, event: AuthEvent) {
        tracing::debug!(?event, "auth event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
