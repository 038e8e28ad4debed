//! Protocol engine abstraction
//!
//! The mesh protocol engine (packet framing, encryption, routing, link
//! retries) is an external collaborator. This module fixes the contract it
//! must satisfy and provides the degraded no-op implementation used when
//! no engine is wired in: the session stays usable, sends fail gracefully,
//! receives never occur.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tracing::warn;

use crate::channels::ChannelAdapter;
use crate::config::Config;
use crate::directory::ContactDirectory;
use crate::error::MeshError;
use crate::events::InboundEvent;
use crate::identity::NodeIdentity;
use crate::packet::InboundPacket;
use crate::radio::Radio;

/// Result of a single send attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOutcome {
    /// Whether the engine accepted and transmitted the message
    pub success: bool,
}

impl SendOutcome {
    /// A successful outcome
    pub fn ok() -> Self {
        Self { success: true }
    }

    /// A failed outcome
    pub fn failed() -> Self {
        Self { success: false }
    }
}

/// Callback invoked by the engine for every inbound packet it processed
pub type PacketCallback = Box<dyn Fn(InboundPacket) + Send + Sync>;

/// Contract the external protocol engine must satisfy
#[async_trait]
pub trait ProtocolEngine: Send + Sync {
    /// Register the callback invoked after a handler has processed a packet
    fn set_packet_callback(&self, callback: PacketCallback);

    /// Run the engine's RX/TX loop; suspends for the lifetime of the session
    async fn run(&self) -> Result<(), MeshError>;

    /// Send a text message to a channel
    async fn send_group_text(&self, channel: &str, text: &str) -> SendOutcome;

    /// Send a direct text message to a named contact
    async fn send_text(&self, contact: &str, text: &str) -> SendOutcome;

    /// Broadcast a self-advertisement announcing this node
    async fn send_advert(&self, node_name: &str) -> SendOutcome;
}

/// Everything an engine needs at construction time
///
/// The contact and channel adapters are shared by reference; the engine
/// reads them, while the directory and the channel registry remain their
/// only writers.
pub struct EngineContext {
    /// The active radio, real or simulated
    pub radio: Arc<dyn Radio>,
    /// The node's identity keypair
    pub identity: NodeIdentity,
    /// Snapshot of the runtime configuration
    pub config: Config,
    /// Contact adapter (lookup + auto-add)
    pub contacts: Arc<ContactDirectory>,
    /// Live channel adapter
    pub channels: Arc<ChannelAdapter>,
    /// Sink for engine-originated events (errors, link notices)
    pub events: broadcast::Sender<InboundEvent>,
}

/// Injection seam for constructing the protocol engine
///
/// Returning `MeshError::EngineUnavailable` puts the session into the
/// engine-less degraded mode instead of failing startup.
pub trait EngineBuilder: Send + Sync {
    /// Construct an engine over the given context
    fn build(&self, ctx: EngineContext) -> Result<Arc<dyn ProtocolEngine>, MeshError>;
}

/// Degraded stand-in used when no protocol engine is available
///
/// Sends report failure, the run loop parks until cancelled, and no packet
/// is ever delivered to the callback.
#[derive(Default)]
pub struct NoopEngine {
    callback: Mutex<Option<PacketCallback>>,
}

impl NoopEngine {
    /// Create a no-op engine
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProtocolEngine for NoopEngine {
    fn set_packet_callback(&self, callback: PacketCallback) {
        *self.callback.lock() = Some(callback);
    }

    async fn run(&self) -> Result<(), MeshError> {
        // Nothing to pump; park until the session cancels us
        std::future::pending::<()>().await;
        Ok(())
    }

    async fn send_group_text(&self, channel: &str, _text: &str) -> SendOutcome {
        warn!(channel, "No protocol engine, channel send dropped");
        SendOutcome::failed()
    }

    async fn send_text(&self, contact: &str, _text: &str) -> SendOutcome {
        warn!(contact, "No protocol engine, direct send dropped");
        SendOutcome::failed()
    }

    async fn send_advert(&self, _node_name: &str) -> SendOutcome {
        warn!("No protocol engine, advert dropped");
        SendOutcome::failed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_noop_engine_sends_fail() {
        let engine = NoopEngine::new();
        assert!(!engine.send_group_text("Public", "hello").await.success);
        assert!(!engine.send_text("alice", "hello").await.success);
        assert!(!engine.send_advert("node").await.success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_noop_engine_run_parks() {
        let engine = NoopEngine::new();
        let parked = tokio::time::timeout(Duration::from_secs(3600), engine.run());
        assert!(parked.await.is_err());
    }
}
