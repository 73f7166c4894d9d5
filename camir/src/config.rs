//! Port and timing configuration for both devices.
//!
//! Stored as JSON in `~/.camir/config.json` by default. Every field has a
//! default, so a partial file (or no file at all) is valid.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::transport::SerialPortLink;

const CONFIG_DIR: &str = ".camir";
const CONFIG_FILE: &str = "config.json";

/// PelcoD mount port settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MountConfig {
    pub port: String,
    /// Receiver address (set by DIP switches on the receiver)
    pub address: u8,
    pub baud_rate: u32,
    pub timeout_ms: u64,
}

impl Default for MountConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB0".to_string(),
            address: 1,
            baud_rate: 9600,
            timeout_ms: 1000,
        }
    }
}

impl MountConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Serial link described by these settings. Not opened yet.
    pub fn link(&self) -> SerialPortLink {
        SerialPortLink::new(&self.port, self.baud_rate, self.timeout())
    }
}

/// FLIR camera port and pacing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThermalConfig {
    pub port: String,
    /// Rate the camera powers up with
    pub baud_rate: u32,
    /// Rate negotiated at session start
    pub fast_baud_rate: u32,
    pub timeout_ms: u64,
    /// Pause between the commands of a range change
    pub settle_delay_ms: u64,
    /// Pause between a block request and its read
    pub block_delay_ms: u64,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            port: "/dev/ttyUSB1".to_string(),
            baud_rate: 19200,
            fast_baud_rate: 115200,
            timeout_ms: 100,
            settle_delay_ms: 100,
            block_delay_ms: 100,
        }
    }
}

impl ThermalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn block_delay(&self) -> Duration {
        Duration::from_millis(self.block_delay_ms)
    }

    /// Serial link at the power-up rate. Not opened yet.
    pub fn link(&self) -> SerialPortLink {
        SerialPortLink::new(&self.port, self.baud_rate, self.timeout())
    }
}

/// Complete camir configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CamIrConfig {
    pub mount: MountConfig,
    pub thermal: ThermalConfig,
}

impl CamIrConfig {
    /// Default location, `~/.camir/config.json`.
    pub fn default_path() -> std::io::Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::NotFound, "HOME not set"))?;
        Ok(PathBuf::from(home).join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from JSON file
    pub fn load_from_file(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        serde_json::from_str(&json)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Load `path`, or defaults if it does not exist.
    ///
    /// A file that exists but does not parse is still an error.
    pub fn load_or_default(path: &Path) -> std::io::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    /// Save as pretty-printed JSON, creating the parent directory.
    pub fn save_to_file(&self, path: &Path) -> std::io::Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)
    }
}
