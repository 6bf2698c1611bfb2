//! Session lifecycle events
//!
//! The gateway never navigates or resets application state itself. It
//! broadcasts what happened and the application layer decides what to do.

use tokio::sync::broadcast;
use vetdesk_core::UserProfile;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Something that changed the stored session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Login or registration stored a new session
    LoggedIn { user: Option<UserProfile> },
    /// The token pair was renewed
    Refreshed,
    /// The user logged out
    LoggedOut,
    /// Renewal failed and credentials were cleared; the user must log in again
    Expired { reason: String },
}

/// Broadcast handle shared by every clone of a client
#[derive(Debug, Clone)]
pub struct SessionEvents {
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        if self.sender.send(event).is_err() {
            trace!("Session event dropped, no subscribers");
        }
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
