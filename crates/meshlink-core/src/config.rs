//! Runtime configuration with hardware and regional presets
//!
//! The configuration is one of the three views that must agree on the
//! channel list (persistent store, this config, and the engine's live
//! channel adapter). It is persisted as JSON next to the identity seed and
//! the database.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::MeshError;
use crate::types::ChannelEntry;

/// Preset name selecting the simulated radio instead of hardware
pub const SIMULATED_PRESET: &str = "Simulated";

/// LoRa modulation parameters for a region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioParams {
    /// Carrier frequency in Hz
    pub frequency: u64,
    /// Transmit power in dBm
    pub tx_power: u8,
    /// LoRa spreading factor
    pub spreading_factor: u8,
    /// Bandwidth in Hz
    pub bandwidth: u32,
    /// Coding rate denominator (4/x)
    pub coding_rate: u8,
    /// Preamble length in symbols
    pub preamble_length: u16,
    /// LoRa sync word
    pub sync_word: u16,
    /// Whether payload CRC is enabled
    pub crc_enabled: bool,
}

impl Default for RadioParams {
    fn default() -> Self {
        // EU/UK narrow settings
        Self {
            frequency: 869_618_000,
            tx_power: 22,
            spreading_factor: 8,
            bandwidth: 62_500,
            coding_rate: 8,
            preamble_length: 17,
            sync_word: 13380,
            crc_enabled: true,
        }
    }
}

impl RadioParams {
    fn regional(freq_hz: u64, sf: u8, bw_hz: u32, cr: u8) -> Self {
        Self {
            frequency: freq_hz,
            spreading_factor: sf,
            bandwidth: bw_hz,
            coding_rate: cr,
            ..Self::default()
        }
    }
}

/// SX1262 wiring parameters for a hardware build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardwareParams {
    /// SPI bus id
    pub bus_id: u8,
    /// SPI chip-select id
    pub cs_id: u8,
    /// Chip-select GPIO, -1 when handled by the bus
    pub cs_pin: i8,
    /// Reset GPIO
    pub reset_pin: i8,
    /// Busy GPIO
    pub busy_pin: i8,
    /// IRQ GPIO
    pub irq_pin: i8,
    /// TX-enable GPIO, -1 when unused
    pub txen_pin: i8,
    /// RX-enable GPIO, -1 when unused
    pub rxen_pin: i8,
    /// Whether DIO3 drives the TCXO
    pub use_dio3_tcxo: bool,
    /// Whether DIO2 drives the RF switch
    pub use_dio2_rf: bool,
}

/// Hardware presets for known boards
pub fn hardware_presets() -> Vec<(&'static str, HardwareParams)> {
    vec![
        (
            "uConsole AIOv2",
            HardwareParams {
                bus_id: 1,
                cs_id: 0,
                cs_pin: -1,
                reset_pin: 25,
                busy_pin: 24,
                irq_pin: 26,
                txen_pin: -1,
                rxen_pin: -1,
                use_dio3_tcxo: true,
                use_dio2_rf: true,
            },
        ),
        (
            "Waveshare HAT",
            HardwareParams {
                bus_id: 0,
                cs_id: 0,
                cs_pin: 21,
                reset_pin: 18,
                busy_pin: 20,
                irq_pin: 16,
                txen_pin: 13,
                rxen_pin: 12,
                use_dio3_tcxo: false,
                use_dio2_rf: false,
            },
        ),
        (SIMULATED_PRESET, HardwareParams::default()),
    ]
}

/// Regional modulation presets
pub fn region_presets() -> Vec<(&'static str, RadioParams)> {
    vec![
        ("EU/UK (Narrow)", RadioParams::regional(869_618_000, 8, 62_500, 8)),
        ("EU/UK (Medium Range)", RadioParams::regional(869_525_000, 10, 250_000, 5)),
        ("EU/UK (Long Range)", RadioParams::regional(869_525_000, 11, 250_000, 5)),
        ("EU 433MHz (Long Range)", RadioParams::regional(433_650_000, 11, 250_000, 5)),
        ("USA/Canada (Recommended)", RadioParams::regional(910_525_000, 7, 62_500, 5)),
        ("USA/Canada (Alternate)", RadioParams::regional(910_525_000, 11, 250_000, 5)),
        ("Australia", RadioParams::regional(915_800_000, 10, 250_000, 5)),
        ("New Zealand", RadioParams::regional(917_375_000, 11, 250_000, 5)),
    ]
}

/// Persisted node configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Node display name, announced in adverts
    pub node_name: String,
    /// Selected hardware preset name
    pub hardware_preset: String,
    /// Selected regional preset name
    pub region_preset: String,
    /// Modulation parameters
    #[serde(default)]
    pub radio: RadioParams,
    /// SX1262 wiring parameters
    #[serde(default)]
    pub hardware: HardwareParams,
    /// Joined channels with resolved secrets
    #[serde(default)]
    pub channels: Vec<ChannelEntry>,
}

impl Config {
    /// Whether the session should use the simulated radio harness
    pub fn is_simulated(&self) -> bool {
        self.hardware_preset == SIMULATED_PRESET
    }

    /// Apply a named hardware preset
    pub fn apply_hardware_preset(&mut self, name: &str) -> Result<(), MeshError> {
        let (preset_name, params) = hardware_presets()
            .into_iter()
            .find(|(n, _)| *n == name)
            .ok_or_else(|| MeshError::Config(format!("unknown hardware preset: {}", name)))?;
        self.hardware_preset = preset_name.to_string();
        self.hardware = params;
        Ok(())
    }

    /// Apply a named regional preset
    pub fn apply_region_preset(&mut self, name: &str) -> Result<(), MeshError> {
        let (preset_name, params) = region_presets()
            .into_iter()
            .find(|(n, _)| *n == name)
            .ok_or_else(|| MeshError::Config(format!("unknown region preset: {}", name)))?;
        self.region_preset = preset_name.to_string();
        self.radio = params;
        Ok(())
    }
}

/// Configuration store bound to a JSON file on disk
///
/// The channel list inside is only rewritten through
/// `ChannelRegistry::resync`; everything else is set by the client before
/// session start.
pub struct ConfigStore {
    path: PathBuf,
    data: RwLock<Config>,
}

impl ConfigStore {
    /// Create a store bound to `path` without touching the filesystem
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: RwLock::new(Config::default()),
        }
    }

    /// Whether a configuration file exists on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the configuration from disk, replacing the in-memory copy
    ///
    /// A missing file loads as the default configuration.
    pub fn load(&self) -> Result<(), MeshError> {
        if !self.path.exists() {
            *self.data.write() = Config::default();
            return Ok(());
        }
        let bytes = fs::read(&self.path)?;
        let config: Config = serde_json::from_slice(&bytes)
            .map_err(|e| MeshError::Serialization(e.to_string()))?;
        *self.data.write() = config;
        Ok(())
    }

    /// Persist the in-memory configuration to disk
    pub fn save(&self) -> Result<(), MeshError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = self.data.read().clone();
        let bytes = serde_json::to_vec_pretty(&data)
            .map_err(|e| MeshError::Serialization(e.to_string()))?;
        fs::write(&self.path, bytes)?;
        info!(path = ?self.path, "Config saved");
        Ok(())
    }

    /// Snapshot of the current configuration
    pub fn snapshot(&self) -> Config {
        self.data.read().clone()
    }

    /// Replace the whole configuration in memory
    pub fn replace(&self, config: Config) {
        *self.data.write() = config;
    }

    /// Node display name
    pub fn node_name(&self) -> String {
        self.data.read().node_name.clone()
    }

    /// Whether the simulated radio is selected
    pub fn is_simulated(&self) -> bool {
        self.data.read().is_simulated()
    }

    /// Current channel list
    pub fn channels(&self) -> Vec<ChannelEntry> {
        self.data.read().channels.clone()
    }

    /// Overwrite the channel list in memory
    pub fn set_channels(&self, channels: Vec<ChannelEntry>) {
        self.data.write().channels = channels;
    }

    /// Apply mutations to the in-memory configuration
    pub fn update(&self, f: impl FnOnce(&mut Config)) {
        f(&mut self.data.write());
    }
}
