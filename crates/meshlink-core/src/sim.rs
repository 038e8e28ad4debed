//! Simulated radio harness
//!
//! A deterministic stand-in for the physical radio, used when no hardware
//! is configured or when hardware init fails. Sends are logged and always
//! acknowledged after a short simulated delay; receives come from a
//! bounded queue fed either by the synthetic traffic timer or by
//! `inject`, which is the primary mechanism for deterministic protocol
//! tests.

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::{Rng, RngCore};
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::radio::{Radio, RadioAck};

/// Capacity of the receive queue
const RX_QUEUE_CAPACITY: usize = 64;

/// Simulated per-send airtime
const SEND_DELAY: Duration = Duration::from_millis(50);

/// Default interval between synthetic packets
pub const DEFAULT_TRAFFIC_INTERVAL: Duration = Duration::from_secs(15);

/// Simulated LoRa radio
pub struct SimRadio {
    running: AtomicBool,
    last_rssi: AtomicI32,
    /// f32 bits; atomics keep the trait getters lock-free
    last_snr_bits: AtomicU32,
    tx_log: parking_lot::Mutex<Vec<Vec<u8>>>,
    rx_tx: mpsc::Sender<Vec<u8>>,
    rx_rx: AsyncMutex<mpsc::Receiver<Vec<u8>>>,
    generate_traffic: bool,
    traffic_interval: Duration,
    traffic_cancel: parking_lot::Mutex<Option<CancellationToken>>,
}

impl SimRadio {
    /// Create a simulated radio; `generate_traffic` arms the synthetic timer
    pub fn new(generate_traffic: bool) -> Self {
        Self::with_interval(generate_traffic, DEFAULT_TRAFFIC_INTERVAL)
    }

    /// Create a simulated radio with a custom traffic interval
    pub fn with_interval(generate_traffic: bool, traffic_interval: Duration) -> Self {
        let (rx_tx, rx_rx) = mpsc::channel(RX_QUEUE_CAPACITY);
        Self {
            running: AtomicBool::new(false),
            last_rssi: AtomicI32::new(-80),
            last_snr_bits: AtomicU32::new(8.5f32.to_bits()),
            tx_log: parking_lot::Mutex::new(Vec::new()),
            rx_tx,
            rx_rx: AsyncMutex::new(rx_rx),
            generate_traffic,
            traffic_interval,
            traffic_cancel: parking_lot::Mutex::new(None),
        }
    }

    /// Push a crafted packet directly into the receive queue
    ///
    /// Bypasses the traffic timer; packets are delivered to `wait_for_rx`
    /// in injection order.
    pub fn inject(&self, data: impl Into<Vec<u8>>) {
        let _ = self.rx_tx.try_send(data.into());
    }

    /// Everything transmitted so far, in send order
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.tx_log.lock().clone()
    }

    /// Start the synthetic traffic timer, if armed and not already running
    pub fn start_traffic(&self) {
        if !self.generate_traffic {
            return;
        }
        let mut slot = self.traffic_cancel.lock();
        if slot.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        *slot = Some(cancel.clone());

        let rx_tx = self.rx_tx.clone();
        let interval = self.traffic_interval;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(interval) => {
                        let mut packet = vec![0u8; 32];
                        rand::rng().fill_bytes(&mut packet);
                        if rx_tx.send(packet).await.is_err() {
                            break;
                        }
                    }
                }
            }
            debug!("Synthetic traffic timer stopped");
        });
    }

    /// Stop the synthetic traffic timer
    pub fn stop_traffic(&self) {
        if let Some(cancel) = self.traffic_cancel.lock().take() {
            cancel.cancel();
        }
    }
}

#[async_trait]
impl Radio for SimRadio {
    fn begin(&self) {
        info!("Simulated radio initialised");
        self.running.store(true, Ordering::SeqCst);
    }

    async fn send(&self, data: &[u8]) -> Option<RadioAck> {
        debug!(bytes = data.len(), head = %hex::encode(&data[..data.len().min(20)]), "Simulated TX");
        self.tx_log.lock().push(data.to_vec());
        tokio::time::sleep(SEND_DELAY).await;
        Some(RadioAck)
    }

    async fn wait_for_rx(&self) -> Option<Vec<u8>> {
        if !self.running.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(1)).await;
            return None;
        }
        let data = self.rx_rx.lock().await.recv().await?;
        let (rssi, snr) = {
            let mut rng = rand::rng();
            (rng.random_range(-120..=-40), rng.random_range(-5.0f32..15.0f32))
        };
        self.last_rssi.store(rssi, Ordering::SeqCst);
        self.last_snr_bits.store(snr.to_bits(), Ordering::SeqCst);
        Some(data)
    }

    fn last_rssi(&self) -> i32 {
        self.last_rssi.load(Ordering::SeqCst)
    }

    fn last_snr(&self) -> f32 {
        f32::from_bits(self.last_snr_bits.load(Ordering::SeqCst))
    }
}
