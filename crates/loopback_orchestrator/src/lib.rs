//! Loopback tester configuration and backend factory.
//!
//! Reads a TOML file declaring the devices the tester can address and builds
//! the matching digital port backend for the device named on the command line.
//!
//! Supported device types:
//! - `sim`: SimBackend, an in-memory board with configurable wiring and faults
//! - `modbus_tcp`: ModbusBackend over TCP (remote digital I/O module)
//! - `modbus_rtu`: ModbusBackend over a serial line

use loopback_hal::config::PortMapping;
use loopback_hal::sim::{DEFAULT_WIRING, SimBackend, SimFault};
use loopback_hal::traits::{DigitalPortBackend, HalError};
use loopback_modbus::ModbusBackend;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "LOOPBACK_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/loopback.toml";

/// Top-level config, deserialized from TOML.
#[derive(Debug, Deserialize)]
pub struct LoopbackConfig {
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub devices: BTreeMap<String, DeviceConfig>,
}

#[derive(Debug, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            settle_ms: default_settle_ms(),
        }
    }
}

fn default_settle_ms() -> u64 {
    1
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceConfig {
    Sim {
        #[serde(default = "default_wiring")]
        wiring: Vec<(u8, u8)>,
        #[serde(default)]
        faults: Vec<SimFault>,
    },
    ModbusTcp {
        #[serde(default = "default_host")]
        host: String,
        #[serde(default = "default_port")]
        port: u16,
        #[serde(default = "default_slave_id")]
        slave_id: u8,
        #[serde(default = "default_timeout")]
        timeout_ms: u64,
        ports: PortMapping,
    },
    ModbusRtu {
        serial_port: String,
        #[serde(default = "default_baud_rate")]
        baud_rate: u32,
        #[serde(default = "default_slave_id")]
        slave_id: u8,
        #[serde(default = "default_timeout")]
        timeout_ms: u64,
        ports: PortMapping,
    },
}

fn default_wiring() -> Vec<(u8, u8)> {
    DEFAULT_WIRING.to_vec()
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    502
}
fn default_slave_id() -> u8 {
    1
}
fn default_timeout() -> u64 {
    1000
}
fn default_baud_rate() -> u32 {
    9600
}

impl LoopbackConfig {
    /// Parse from TOML string.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Parse from TOML file path.
    pub fn from_file(path: &Path) -> Result<Self, OrchestratorError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| OrchestratorError::ConfigError(format!("{}: {e}", path.display())))?;
        Self::from_toml(&content)
            .map_err(|e| OrchestratorError::ConfigError(format!("{}: {e}", path.display())))
    }

    /// Look up the `[devices.<name>]` entry.
    pub fn device(&self, name: &str) -> Result<&DeviceConfig, OrchestratorError> {
        self.devices
            .get(name)
            .ok_or_else(|| OrchestratorError::HalError(HalError::DeviceNotFound(name.to_string())))
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.run.settle_ms)
    }
}

/// `$LOOPBACK_CONFIG` if set, otherwise [`DEFAULT_CONFIG_PATH`].
pub fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Create the backend for `device` from its config entry.
pub fn create_backend(
    config: &LoopbackConfig,
    device: &str,
) -> Result<Box<dyn DigitalPortBackend>, OrchestratorError> {
    match config.device(device)? {
        DeviceConfig::Sim { wiring, faults } => {
            let mut sim = SimBackend::with_wiring(device, wiring);
            for fault in faults {
                sim.inject(fault.clone());
            }
            log::info!(
                "Simulated board {device}: {} wired pairs, {} injected faults",
                wiring.len(),
                faults.len()
            );
            Ok(Box::new(sim))
        }
        DeviceConfig::ModbusTcp {
            host,
            port,
            slave_id,
            timeout_ms,
            ports,
        } => {
            let addr = format!("{host}:{port}")
                .parse()
                .map_err(|e| OrchestratorError::ConfigError(format!("invalid address: {e}")))?;
            let backend = ModbusBackend::connect(
                addr,
                *slave_id,
                device,
                ports,
                Duration::from_millis(*timeout_ms),
            )?;
            Ok(Box::new(backend))
        }
        DeviceConfig::ModbusRtu {
            serial_port,
            baud_rate,
            slave_id,
            timeout_ms,
            ports,
        } => {
            let backend = ModbusBackend::connect_rtu(
                serial_port,
                *baud_rate,
                *slave_id,
                device,
                ports,
                Duration::from_millis(*timeout_ms),
            )?;
            Ok(Box::new(backend))
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("config error: {0}")]
    ConfigError(String),
    #[error("HAL error: {0}")]
    HalError(#[from] HalError),
}
