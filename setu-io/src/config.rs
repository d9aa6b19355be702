//! Configuration for the SetuIO daemon
//!
//! Loaded from a TOML file. Every section is optional and falls back to the
//! reference board settings (ports 1000/1001/1002, 32-block ring, loopback
//! device).

use crate::core::types::{DEFAULT_RING_BLOCKS, SUB_BLOCK_SIZE};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Listening sockets
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkConfig {
    /// Interface to bind all three channels on
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Command channel (10-byte register frames)
    #[serde(default = "default_control_port")]
    pub control_port: u16,

    /// TCP data channel
    #[serde(default = "default_data_tcp_port")]
    pub data_tcp_port: u16,

    /// UDP data channel
    #[serde(default = "default_data_udp_port")]
    pub data_udp_port: u16,
}

/// Data path settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BridgeConfig {
    /// TCP path mode at startup (see `bridge::path::TcpPath`)
    #[serde(default = "default_tcp_path")]
    pub tcp_path: u8,

    /// UDP path mode at startup (see `bridge::path::UdpPath`)
    #[serde(default = "default_udp_path")]
    pub udp_path: u8,

    /// Circular buffer size in blocks
    #[serde(default = "default_ring_blocks")]
    pub ring_blocks: usize,

    /// Outbound queue capacity per TCP connection, in bytes
    #[serde(default = "default_tx_queue_bytes")]
    pub tx_queue_bytes: usize,

    /// Period of the send-only driver tick
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

/// Block transfer device
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeviceConfig {
    /// Backend name; only `loopback` is built in
    #[serde(rename = "type", default = "default_device_type")]
    pub device_type: String,

    /// Completion wait per block transfer
    #[serde(default = "default_transfer_timeout_ms")]
    pub transfer_timeout_ms: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter (trace, debug, info, warn, error); `RUST_LOG` wins
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_control_port() -> u16 {
    1000
}
fn default_data_tcp_port() -> u16 {
    1001
}
fn default_data_udp_port() -> u16 {
    1002
}
fn default_tcp_path() -> u8 {
    0x01
}
fn default_udp_path() -> u8 {
    0x03
}
fn default_ring_blocks() -> usize {
    DEFAULT_RING_BLOCKS
}
fn default_tx_queue_bytes() -> usize {
    64 * 1024
}
fn default_tick_interval_ms() -> u64 {
    1
}
fn default_device_type() -> String {
    "loopback".to_string()
}
fn default_transfer_timeout_ms() -> u64 {
    100
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            control_port: default_control_port(),
            data_tcp_port: default_data_tcp_port(),
            data_udp_port: default_data_udp_port(),
        }
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tcp_path: default_tcp_path(),
            udp_path: default_udp_path(),
            ring_blocks: default_ring_blocks(),
            tx_queue_bytes: default_tx_queue_bytes(),
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_type: default_device_type(),
            transfer_timeout_ms: default_transfer_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl NetworkConfig {
    /// `bind_address:control_port`
    pub fn control_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.control_port)
    }

    /// `bind_address:data_tcp_port`
    pub fn data_tcp_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.data_tcp_port)
    }

    /// `bind_address:data_udp_port`
    pub fn data_udp_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.data_udp_port)
    }
}

impl BridgeConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }
}

impl DeviceConfig {
    pub fn transfer_timeout(&self) -> Duration {
        Duration::from_millis(self.transfer_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Example
    /// ```no_run
    /// use setu_io::Config;
    ///
    /// let config = Config::load("/etc/setuio.toml")?;
    /// # Ok::<(), setu_io::Error>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the bridge cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.bridge.ring_blocks < 2 {
            return Err(Error::Config(format!(
                "bridge.ring_blocks must be at least 2, got {}",
                self.bridge.ring_blocks
            )));
        }
        // A reply frame must always fit in an idle queue
        if self.bridge.tx_queue_bytes < SUB_BLOCK_SIZE {
            return Err(Error::Config(format!(
                "bridge.tx_queue_bytes must be at least {}, got {}",
                SUB_BLOCK_SIZE, self.bridge.tx_queue_bytes
            )));
        }
        if self.device.transfer_timeout_ms == 0 {
            return Err(Error::Config(
                "device.transfer_timeout_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}
