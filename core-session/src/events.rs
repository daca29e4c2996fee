//! Session event broadcasting.
//!
//! A `tokio::sync::broadcast` based bus publishing typed [`SessionEvent`]s
//! so hosts can observe auth state transitions (UI badges, credential
//! persistence, re-auth prompts) without polling. Emission is
//! fire-and-forget: a bus with no subscribers drops events silently and
//! never fails an operation.
//!
//! Subscribers that fall behind receive `RecvError::Lagged` and keep
//! receiving newer events; `RecvError::Closed` signals shutdown.

use crate::types::AuthKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default per-subscriber buffer. Sessions transition rarely; a small
/// buffer suffices.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 64;

/// Auth state transitions observable by hosts.
///
/// Events carry identifiers and timestamps only, never tokens.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// A session was issued by any sign-in/sign-up/exchange flow.
    SignedIn { local_id: String, kind: AuthKind },
    /// A session's tokens were renewed.
    Refreshed {
        local_id: String,
        expires_at: DateTime<Utc>,
    },
    /// A provider credential was attached to the account.
    ProviderLinked { local_id: String, kind: AuthKind },
    /// A provider credential was detached from the account.
    ProviderUnlinked { local_id: String, kind: AuthKind },
    /// Display name / photo URL changed.
    ProfileUpdated { local_id: String },
    /// The account password changed.
    PasswordChanged { local_id: String },
    /// The remote account was deleted. Outstanding sessions for it are no
    /// longer valid.
    AccountDeleted,
    /// A non-fatal failure hosts may want to surface.
    Failure { message: String, recoverable: bool },
}

impl SessionEvent {
    /// Human-readable description for logging.
    pub fn description(&self) -> &'static str {
        match self {
            SessionEvent::SignedIn { .. } => "session issued",
            SessionEvent::Refreshed { .. } => "session refreshed",
            SessionEvent::ProviderLinked { .. } => "provider linked",
            SessionEvent::ProviderUnlinked { .. } => "provider unlinked",
            SessionEvent::ProfileUpdated { .. } => "profile updated",
            SessionEvent::PasswordChanged { .. } => "password changed",
            SessionEvent::AccountDeleted => "account deleted",
            SessionEvent::Failure { .. } => "auth failure",
        }
    }
}

/// Broadcast channel for [`SessionEvent`]s.
///
/// Cheap to clone; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SessionEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Returns how many subscribers received it; errors only when there are
    /// none, which callers routinely ignore.
    pub fn emit(&self, event: SessionEvent) -> Result<usize, SendError<SessionEvent>> {
        self.sender.send(event)
    }

    /// Create an independent receiver for all future events. Past events
    /// are not replayed.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}
