//! Mesh session controller
//!
//! `MeshService` owns the session lifecycle: it resolves identity, selects
//! the radio, constructs the protocol engine over the shared adapters, and
//! supervises the engine's run loop as a single cancellable background
//! task. The Session (state, radio handle, engine handle) is exclusively
//! owned here and never shared.
//!
//! Failure policy: structural failures at startup either abort (corrupt
//! identity seed) or degrade (radio init, missing engine) with exactly one
//! `SystemError` event each; a crash escaping the run loop demotes the
//! session to `Degraded` and is never auto-restarted.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::channels::{ChannelAdapter, ChannelRegistry};
use crate::config::ConfigStore;
use crate::directory::ContactDirectory;
use crate::engine::{EngineBuilder, EngineContext, NoopEngine, ProtocolEngine};
use crate::error::{MeshError, MeshResult};
use crate::events::{InboundEvent, SessionState};
use crate::identity::{self, NodeIdentity};
use crate::radio::{Radio, RadioBuilder};
use crate::sim::SimRadio;
use crate::storage::Storage;
use crate::translate::PacketTranslator;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// High-level service owning radio, identity, engine, and event wiring
pub struct MeshService {
    config: Arc<ConfigStore>,
    storage: Arc<Storage>,
    directory: Arc<ContactDirectory>,
    channel_adapter: Arc<ChannelAdapter>,
    /// Shared with `ChannelRegistry` to gate the live-adapter resync step
    engine_running: Arc<AtomicBool>,
    /// Shared with the run-loop task so a crash can demote the session
    state: Arc<RwLock<SessionState>>,
    event_tx: broadcast::Sender<InboundEvent>,
    identity_path: PathBuf,
    identity: Option<NodeIdentity>,
    radio: Option<Arc<dyn Radio>>,
    sim_radio: Option<Arc<SimRadio>>,
    engine: Option<Arc<dyn ProtocolEngine>>,
    run_task: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
    radio_builder: Option<Box<dyn RadioBuilder>>,
    engine_builder: Option<Box<dyn EngineBuilder>>,
}

impl MeshService {
    /// Create a service over the given configuration and storage
    ///
    /// The contact directory is loaded from storage and the live channel
    /// adapter is seeded from the configuration so a freshly constructed
    /// engine sees the channel list even before any resync.
    pub fn new(
        config: Arc<ConfigStore>,
        storage: Arc<Storage>,
        identity_path: impl Into<PathBuf>,
    ) -> MeshResult<Self> {
        let directory = Arc::new(ContactDirectory::load(storage.clone())?);
        let channel_adapter = Arc::new(ChannelAdapter::new(config.channels()));
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            storage,
            directory,
            channel_adapter,
            engine_running: Arc::new(AtomicBool::new(false)),
            state: Arc::new(RwLock::new(SessionState::Stopped)),
            event_tx,
            identity_path: identity_path.into(),
            identity: None,
            radio: None,
            sim_radio: None,
            engine: None,
            run_task: None,
            cancel: None,
            radio_builder: None,
            engine_builder: None,
        })
    }

    /// Wire in a hardware radio driver
    pub fn with_radio_builder(mut self, builder: Box<dyn RadioBuilder>) -> Self {
        self.radio_builder = Some(builder);
        self
    }

    /// Wire in a protocol engine implementation
    pub fn with_engine_builder(mut self, builder: Box<dyn EngineBuilder>) -> Self {
        self.engine_builder = Some(builder);
        self
    }

    // ─── lifecycle ─────────────────────────────────────────────────────────

    /// Bring the session up
    ///
    /// Loads or creates the identity, selects the radio (falling back to a
    /// silent simulated radio when hardware init fails), constructs the
    /// protocol engine (falling back to the no-op engine when unavailable),
    /// and spawns the run loop.
    ///
    /// # Errors
    ///
    /// Only a corrupt identity seed fails startup. Every other failure
    /// degrades the session and emits a `SystemError` event instead.
    pub async fn start(&mut self) -> MeshResult<()> {
        if self.state().is_online() {
            debug!("Session already started");
            return Ok(());
        }
        *self.state.write() = SessionState::Starting;
        let mut degraded = false;

        // 1. Identity
        let seed = match identity::load_or_create_seed(&self.identity_path) {
            Ok(seed) => seed,
            Err(e) => {
                *self.state.write() = SessionState::Stopped;
                return Err(e);
            }
        };
        let node_identity = NodeIdentity::from_seed(&seed);
        info!(identity = %node_identity.summary(), "Identity ready");

        // 2. Radio
        let (radio, sim_radio): (Arc<dyn Radio>, Option<Arc<SimRadio>>) =
            if self.config.is_simulated() {
                let sim = Arc::new(SimRadio::new(true));
                sim.begin();
                sim.start_traffic();
                info!("Using simulated radio");
                (sim.clone(), Some(sim))
            } else {
                let snapshot = self.config.snapshot();
                let built = self
                    .radio_builder
                    .as_ref()
                    .ok_or_else(|| MeshError::RadioInit("no radio driver wired in".to_string()))
                    .and_then(|b| b.build(&snapshot.radio, &snapshot.hardware));
                match built {
                    Ok(radio) => {
                        radio.begin();
                        info!("Hardware radio initialised");
                        (radio, None)
                    }
                    Err(e) => {
                        error!(error = %e, "Radio init failed, falling back to simulated radio");
                        degraded = true;
                        let _ = self.event_tx.send(InboundEvent::SystemError {
                            message: e.to_string(),
                        });
                        let sim = Arc::new(SimRadio::new(false));
                        sim.begin();
                        (sim.clone(), Some(sim))
                    }
                }
            };

        // 3. Protocol engine
        let ctx = EngineContext {
            radio: radio.clone(),
            identity: node_identity.clone(),
            config: self.config.snapshot(),
            contacts: self.directory.clone(),
            channels: self.channel_adapter.clone(),
            events: self.event_tx.clone(),
        };
        let engine: Arc<dyn ProtocolEngine> = match &self.engine_builder {
            Some(builder) => match builder.build(ctx) {
                Ok(engine) => engine,
                Err(MeshError::EngineUnavailable) => {
                    warn!("Protocol engine unavailable, running engine-less");
                    Arc::new(NoopEngine::new())
                }
                Err(e) => {
                    error!(error = %e, "Engine construction failed, running engine-less");
                    let _ = self.event_tx.send(InboundEvent::SystemError {
                        message: e.to_string(),
                    });
                    Arc::new(NoopEngine::new())
                }
            },
            None => {
                warn!("No protocol engine wired in, running engine-less");
                Arc::new(NoopEngine::new())
            }
        };

        // 4. Run loop
        let translator = PacketTranslator::new(self.directory.clone());
        let packet_tx = self.event_tx.clone();
        engine.set_packet_callback(Box::new(move |packet| {
            if let Some(event) = translator.translate(&packet) {
                let _ = packet_tx.send(event);
            }
        }));

        let cancel = CancellationToken::new();
        let run_cancel = cancel.clone();
        let run_engine = engine.clone();
        let run_state = self.state.clone();
        let run_tx = self.event_tx.clone();
        let engine_running = self.engine_running.clone();
        engine_running.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = run_cancel.cancelled() => {
                    debug!("Run loop cancelled");
                }
                result = run_engine.run() => match result {
                    Ok(()) => info!("Engine run loop ended"),
                    Err(e) => {
                        error!(error = %e, "Engine run loop crashed");
                        *run_state.write() = SessionState::Degraded;
                        let _ = run_tx.send(InboundEvent::SystemError {
                            message: format!("Engine run loop crashed: {}", e),
                        });
                    }
                },
            }
            engine_running.store(false, Ordering::SeqCst);
        });

        self.identity = Some(node_identity);
        self.radio = Some(radio);
        self.sim_radio = sim_radio;
        self.engine = Some(engine);
        self.run_task = Some(handle);
        self.cancel = Some(cancel);
        *self.state.write() = if degraded {
            SessionState::Degraded
        } else {
            SessionState::Running
        };
        info!(state = %self.state(), "Mesh session started");
        Ok(())
    }

    /// Tear the session down
    ///
    /// Idempotent: stopping an already-stopped session is a no-op. Waits
    /// for the run-loop task to acknowledge cancellation; cancellation is
    /// cooperative and carries no deadline.
    pub async fn stop(&mut self) {
        if self.state() == SessionState::Stopped {
            debug!("Session already stopped");
            return;
        }
        *self.state.write() = SessionState::Stopping;

        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(handle) = self.run_task.take() {
            let _ = handle.await;
        }
        if let Some(sim) = &self.sim_radio {
            sim.stop_traffic();
        }

        self.engine = None;
        self.radio = None;
        self.sim_radio = None;
        self.engine_running.store(false, Ordering::SeqCst);
        *self.state.write() = SessionState::Stopped;
        info!("Mesh session stopped");
    }

    // ─── messaging ─────────────────────────────────────────────────────────

    /// Send a text message to a channel; `false` on any failure
    pub async fn send_channel_message(&self, channel: &str, text: &str) -> bool {
        match &self.engine {
            Some(engine) => engine.send_group_text(channel, text).await.success,
            None => {
                warn!(channel, "Cannot send, session not started");
                false
            }
        }
    }

    /// Send a direct message to a named contact; `false` on any failure
    pub async fn send_direct_message(&self, contact: &str, text: &str) -> bool {
        match &self.engine {
            Some(engine) => engine.send_text(contact, text).await.success,
            None => {
                warn!(contact, "Cannot send, session not started");
                false
            }
        }
    }

    /// Broadcast a self-advertisement announcing this node; `false` on failure
    pub async fn send_advert(&self) -> bool {
        match &self.engine {
            Some(engine) => {
                let name = self.config.node_name();
                engine.send_advert(&name).await.success
            }
            None => {
                warn!("Cannot send advert, session not started");
                false
            }
        }
    }

    // ─── accessors ─────────────────────────────────────────────────────────

    /// Subscribe to inbound application events
    pub fn subscribe(&self) -> broadcast::Receiver<InboundEvent> {
        self.event_tx.subscribe()
    }

    /// Current lifecycle state
    pub fn state(&self) -> SessionState {
        *self.state.read()
    }

    /// Whether the session accepts sends
    pub fn online(&self) -> bool {
        self.state().is_online()
    }

    /// Short identity summary for display, empty before the first start
    pub fn identity_summary(&self) -> String {
        self.identity
            .as_ref()
            .map(|i| i.summary())
            .unwrap_or_default()
    }

    /// Whether the active radio is the simulated harness
    pub fn is_simulated(&self) -> bool {
        self.sim_radio.is_some()
    }

    /// The simulated radio, when one is active (used by tests and demos)
    pub fn simulated_radio(&self) -> Option<Arc<SimRadio>> {
        self.sim_radio.clone()
    }

    /// The contact directory shared with the engine
    pub fn directory(&self) -> Arc<ContactDirectory> {
        self.directory.clone()
    }

    /// The backing storage
    pub fn storage(&self) -> Arc<Storage> {
        self.storage.clone()
    }

    /// The configuration store
    pub fn config(&self) -> Arc<ConfigStore> {
        self.config.clone()
    }

    /// A channel registry over this session's three channel views
    ///
    /// Callers serialize `resync` on their own control path; the registry
    /// takes no locks of its own.
    pub fn channel_registry(&self) -> ChannelRegistry {
        ChannelRegistry::new(
            self.storage.clone(),
            self.config.clone(),
            self.channel_adapter.clone(),
            self.engine_running.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SIMULATED_PRESET};
    use tempfile::TempDir;

    fn simulated_service(temp: &TempDir) -> MeshService {
        let config = Arc::new(ConfigStore::new(temp.path().join("config.json")));
        config.update(|c: &mut Config| {
            c.node_name = "test-node".to_string();
            c.hardware_preset = SIMULATED_PRESET.to_string();
        });
        let storage = Arc::new(Storage::new(temp.path().join("test.redb")).unwrap());
        MeshService::new(config, storage, temp.path().join("identity.key")).unwrap()
    }

    #[tokio::test]
    async fn test_start_without_engine_is_running_and_sends_fail() {
        let temp = TempDir::new().unwrap();
        let mut service = simulated_service(&temp);

        service.start().await.unwrap();
        assert_eq!(service.state(), SessionState::Running);
        assert!(service.online());
        assert!(service.is_simulated());
        assert!(!service.identity_summary().is_empty());

        assert!(!service.send_channel_message("Public", "hello").await);
        assert!(!service.send_direct_message("alice", "hello").await);
        assert!(!service.send_advert().await);

        service.stop().await;
        assert_eq!(service.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_twice_is_a_noop() {
        let temp = TempDir::new().unwrap();
        let mut service = simulated_service(&temp);

        service.start().await.unwrap();
        service.stop().await;
        service.stop().await;
        assert_eq!(service.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_a_noop() {
        let temp = TempDir::new().unwrap();
        let mut service = simulated_service(&temp);
        service.stop().await;
        assert_eq!(service.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn test_hardware_without_driver_degrades_with_one_error() {
        let temp = TempDir::new().unwrap();
        let config = Arc::new(ConfigStore::new(temp.path().join("config.json")));
        config.update(|c: &mut Config| {
            c.hardware_preset = "Waveshare HAT".to_string();
        });
        let storage = Arc::new(Storage::new(temp.path().join("test.redb")).unwrap());
        let mut service =
            MeshService::new(config, storage, temp.path().join("identity.key")).unwrap();

        let mut events = service.subscribe();
        service.start().await.unwrap();

        assert_eq!(service.state(), SessionState::Degraded);
        assert!(service.online());
        // Fallback radio is the silent simulated one
        assert!(service.is_simulated());

        let event = events.try_recv().unwrap();
        assert!(matches!(event, InboundEvent::SystemError { .. }));
        assert!(events.try_recv().is_err());

        service.stop().await;
    }

    #[tokio::test]
    async fn test_corrupt_seed_fails_startup() {
        let temp = TempDir::new().unwrap();
        let identity_path = temp.path().join("identity.key");
        std::fs::write(&identity_path, [0u8; 7]).unwrap();

        let mut service = simulated_service(&temp);
        let err = service.start().await.unwrap_err();
        assert!(matches!(err, MeshError::Identity(_)));
        assert_eq!(service.state(), SessionState::Stopped);
    }

    #[tokio::test]
    async fn test_start_twice_is_a_noop() {
        let temp = TempDir::new().unwrap();
        let mut service = simulated_service(&temp);

        service.start().await.unwrap();
        service.start().await.unwrap();
        assert_eq!(service.state(), SessionState::Running);
        service.stop().await;
    }

    #[tokio::test]
    async fn test_restart_after_stop() {
        let temp = TempDir::new().unwrap();
        let mut service = simulated_service(&temp);

        service.start().await.unwrap();
        let summary_first = service.identity_summary();
        service.stop().await;

        service.start().await.unwrap();
        assert_eq!(service.state(), SessionState::Running);
        // Same seed file, same identity
        assert_eq!(service.identity_summary(), summary_first);
        service.stop().await;
    }
}
