use serde::{Deserialize, Serialize};

use crate::domain::device::Device;

/// Aircom configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AircomConfig {
    /// Global configuration
    pub global: GlobalConfig,
    /// Statically configured devices (for networks without mDNS)
    #[serde(default)]
    pub devices: Vec<StaticDeviceConfig>,
}

/// Global configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Receive buffer capacity in bytes per session
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Transport connect timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Keepalive defaults applied to new sessions
    #[serde(default)]
    pub keepalive: KeepaliveDefaults,
}

/// Application-level keepalive settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeepaliveDefaults {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_keepalive_interval")]
    pub interval_ms: u64,
    #[serde(default = "default_keepalive_timeout")]
    pub timeout_ms: u64,
}

/// Statically configured device entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticDeviceConfig {
    /// Device name
    pub name: String,
    /// Host name or IP address
    pub host: String,
    /// TCP port of the serial bridge service for port 1
    #[serde(default = "default_bridge_port")]
    pub port: u16,
    /// Number of physical serial ports
    #[serde(default = "default_port_count")]
    pub port_count: u8,
}

impl StaticDeviceConfig {
    /// Build the Device this entry describes
    pub fn to_device(&self) -> Device {
        let mut device = Device::with_ip(&self.name, &self.host, self.port);
        device.port_count = self.port_count.max(1);
        device
    }
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_buffer_capacity() -> usize {
    65536
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_keepalive_interval() -> u64 {
    5000
}

fn default_keepalive_timeout() -> u64 {
    15000
}

fn default_bridge_port() -> u16 {
    3696
}

fn default_port_count() -> u8 {
    1
}

impl Default for AircomConfig {
    fn default() -> Self {
        Self {
            global: GlobalConfig::default(),
            devices: Vec::new(),
        }
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            buffer_capacity: default_buffer_capacity(),
            connect_timeout_ms: default_connect_timeout(),
            keepalive: KeepaliveDefaults::default(),
        }
    }
}

impl Default for KeepaliveDefaults {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_ms: default_keepalive_interval(),
            timeout_ms: default_keepalive_timeout(),
        }
    }
}
