//! Session event log: every identity and key-exchange action emits a
//! structured event. Events never carry plaintext or key material beyond
//! public-key fingerprints.

use crate::types::PeerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

// ---------------------------------------------------------------------------
// Session events
// ---------------------------------------------------------------------------

/// What happened.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionAction {
    IdentityRestored,
    IdentityGenerated,
    /// Stored identity could not be unwrapped and was replaced.
    IdentityRegenerated,
    /// Stored identity could not be unwrapped and the strict policy refused.
    IdentityRejected,
    IdentityPublished,
    PublishFailed,
    /// Store unreachable; identity lives in memory only for this session.
    StorageFallback,
    KeysExchanged,
    PeerKeyChanged { previous: String, current: String },
    EncryptDegraded,
    DecryptDegraded,
    DecryptFailed,
    KeysCleared,
}

/// A structured session event.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionEvent {
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Local user the session belongs to.
    pub user: PeerId,
    /// Peer involved, if any.
    pub peer: Option<PeerId>,
    /// What happened.
    pub action: SessionAction,
    /// Success or failure.
    pub success: bool,
    /// Additional context.
    pub detail: Option<String>,
}

impl SessionEvent {
    /// Event about the local identity.
    pub fn identity_event(user: &PeerId, action: SessionAction) -> Self {
        Self {
            timestamp: Utc::now(),
            user: user.clone(),
            peer: None,
            action,
            success: true,
            detail: None,
        }
    }

    /// Event about a specific peer.
    pub fn peer_event(user: &PeerId, peer: &PeerId, action: SessionAction) -> Self {
        Self {
            peer: Some(peer.clone()),
            ..Self::identity_event(user, action)
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.success = false;
        self
    }
}

// ---------------------------------------------------------------------------
// Event sink trait
// ---------------------------------------------------------------------------

/// Where session events go. Synchronous; sinks must not block for long.
pub trait EventSink: Send + Sync {
    fn record(&self, event: SessionEvent);
}

// ---------------------------------------------------------------------------
// Built-in sinks
// ---------------------------------------------------------------------------

/// Logs events via the `tracing` crate.
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: SessionEvent) {
        if event.success {
            tracing::info!(
                user = %event.user,
                peer = ?event.peer.as_ref().map(PeerId::as_str),
                action = ?event.action,
                detail = ?event.detail,
                "session event"
            );
        } else {
            tracing::warn!(
                user = %event.user,
                peer = ?event.peer.as_ref().map(PeerId::as_str),
                action = ?event.action,
                detail = ?event.detail,
                "session event"
            );
        }
    }
}

/// Collects events in memory (tests, UI banners).
#[derive(Default)]
pub struct InMemoryEventSink {
    events: Mutex<Vec<SessionEvent>>,
}

impl InMemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn actions(&self) -> Vec<SessionAction> {
        self.events().into_iter().map(|e| e.action).collect()
    }

    pub fn events_for_peer(&self, peer: &PeerId) -> Vec<SessionEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.peer.as_ref() == Some(peer))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for InMemoryEventSink {
    fn record(&self, event: SessionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
