//! Radio contract shared by hardware drivers and the simulated harness
//!
//! The session controller is indifferent to which implementation is
//! active; everything above this trait sees the same three operations plus
//! the link-quality readings of the last received packet.

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{HardwareParams, RadioParams};
use crate::error::MeshError;

/// Acknowledgement of a completed transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RadioAck;

/// Contract every radio must satisfy
#[async_trait]
pub trait Radio: Send + Sync {
    /// Mark the radio ready; called once before any send/receive
    fn begin(&self);

    /// Transmit raw packet bytes; `None` means the send was not acknowledged
    async fn send(&self, data: &[u8]) -> Option<RadioAck>;

    /// Suspend until an inbound packet is available
    ///
    /// `None` means the radio is no longer receiving (stopped or closed).
    async fn wait_for_rx(&self) -> Option<Vec<u8>>;

    /// RSSI of the last received packet, in dBm
    fn last_rssi(&self) -> i32;

    /// SNR of the last received packet, in dB
    fn last_snr(&self) -> f32;
}

/// Injection seam for constructing a hardware radio from configuration
///
/// The actual driver lives outside this crate. When no builder is wired in
/// (or building fails) the session controller falls back to a silent
/// simulated radio and degrades the session instead of aborting startup.
pub trait RadioBuilder: Send + Sync {
    /// Construct and initialise a radio from modulation and wiring parameters
    fn build(
        &self,
        radio: &RadioParams,
        hardware: &HardwareParams,
    ) -> Result<Arc<dyn Radio>, MeshError>;
}
