//! Session events and lifecycle state
//!
//! `InboundEvent` is the normalized output of the packet translator and the
//! only channel through which raw mesh traffic reaches the client. Events
//! are delivered over a `tokio::sync::broadcast` channel and are not
//! persisted by the core; the client writes history back through storage if
//! it wants any.

use std::fmt;

/// Lifecycle state of a mesh session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No radio or engine is held
    #[default]
    Stopped,
    /// `start()` is in progress
    Starting,
    /// Radio and run loop are up
    Running,
    /// Running with one or more subsystems in a reduced-functionality fallback
    Degraded,
    /// `stop()` is in progress
    Stopping,
}

impl SessionState {
    /// Whether the session can accept send requests
    pub fn is_online(&self) -> bool {
        matches!(self, SessionState::Running | SessionState::Degraded)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Stopped => write!(f, "Stopped"),
            SessionState::Starting => write!(f, "Starting"),
            SessionState::Running => write!(f, "Running"),
            SessionState::Degraded => write!(f, "Degraded"),
            SessionState::Stopping => write!(f, "Stopping"),
        }
    }
}

/// A normalized application event produced from inbound mesh traffic
///
/// Consumed exactly once per subscriber by the client layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A message on a joined channel
    ChannelMessage {
        /// Channel name as embedded in the decrypted payload
        channel: String,
        /// Sender display name as embedded in the decrypted payload
        sender_name: String,
        /// Message text
        text: String,
        /// Sender-supplied Unix timestamp, if present
        timestamp: Option<i64>,
    },
    /// A direct message addressed to this node
    DirectMessage {
        /// Resolved sender name, or `unknown-XX` when the source hash
        /// matches no known contact
        sender_name: String,
        /// Resolved sender public key as hex; empty when unresolved
        sender_key: String,
        /// Message text
        text: String,
    },
    /// A new contact discovered via an advertisement broadcast
    ContactDiscovered {
        /// Announced public key as hex
        public_key: String,
        /// Announced node name
        name: String,
    },
    /// A structural failure, reported exactly once per occurrence
    SystemError {
        /// Human-readable description
        message: String,
    },
}
