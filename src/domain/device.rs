use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Device type string reported by standard console bridges
pub const DEVICE_TYPE_AIRCONSOLE: &str = "airconsole";

/// Transport used to reach a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// No preference / not yet known (placeholder devices)
    Any,
    /// IP network, discovered via mDNS or configured statically
    Ip,
    /// Bluetooth Low Energy
    Ble,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Any => write!(f, "any"),
            TransportKind::Ip => write!(f, "ip"),
            TransportKind::Ble => write!(f, "ble"),
        }
    }
}

/// Transport-specific address of a device
///
/// The address is the identity of a device: two discovery events carrying
/// the same address refer to the same device regardless of metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum DeviceAddress {
    Ip { host: String, port: u16 },
    Ble { peripheral_id: String },
}

impl DeviceAddress {
    pub fn kind(&self) -> TransportKind {
        match self {
            DeviceAddress::Ip { .. } => TransportKind::Ip,
            DeviceAddress::Ble { .. } => TransportKind::Ble,
        }
    }
}

impl std::fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceAddress::Ip { host, port } => write!(f, "{}:{}", host, port),
            DeviceAddress::Ble { peripheral_id } => write!(f, "ble:{}", peripheral_id),
        }
    }
}

/// A discovered (or statically configured) console bridge device
///
/// Identity is `transport + address`; the remaining fields are metadata that
/// may be refined in place as later discovery callbacks supply more detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    /// Hostname of the device, e.g. "Airconsole-4F"
    pub name: String,
    /// Transport this device was discovered on
    pub transport: TransportKind,
    /// Transport-specific address
    pub address: DeviceAddress,
    /// Device type string, e.g. "airconsole"
    pub device_type: String,
    /// Firmware version, empty until reported
    pub firmware_version: String,
    /// Hardware version, empty until reported
    pub hardware_version: String,
    /// Number of physical serial ports on the device
    pub port_count: u8,
    /// Customer-supplied names per port number (IP transport only)
    pub port_names: HashMap<u8, String>,
}

impl Device {
    /// Placeholder device returned when nothing has been discovered.
    ///
    /// Never used as a registry entry; it exists so `default_device` always
    /// has something to hand back.
    pub fn placeholder() -> Self {
        Self {
            name: String::new(),
            transport: TransportKind::Any,
            address: DeviceAddress::Ip {
                host: String::new(),
                port: 0,
            },
            device_type: String::new(),
            firmware_version: String::new(),
            hardware_version: String::new(),
            port_count: 1,
            port_names: HashMap::new(),
        }
    }

    /// Device at a known static IP address, for environments where mDNS
    /// discovery does not function.
    pub fn with_ip(name: &str, host: &str, port: u16) -> Self {
        Self {
            name: name.to_string(),
            transport: TransportKind::Ip,
            address: DeviceAddress::Ip {
                host: host.to_string(),
                port,
            },
            device_type: DEVICE_TYPE_AIRCONSOLE.to_string(),
            firmware_version: String::new(),
            hardware_version: String::new(),
            port_count: 1,
            port_names: HashMap::new(),
        }
    }

    /// Device backed by a BLE peripheral handle.
    pub fn with_ble(name: &str, peripheral_id: &str) -> Self {
        Self {
            name: name.to_string(),
            transport: TransportKind::Ble,
            address: DeviceAddress::Ble {
                peripheral_id: peripheral_id.to_string(),
            },
            device_type: DEVICE_TYPE_AIRCONSOLE.to_string(),
            firmware_version: String::new(),
            hardware_version: String::new(),
            port_count: 1,
            port_names: HashMap::new(),
        }
    }

    /// IP address of the device (IP transport only)
    pub fn ip_address(&self) -> Option<&str> {
        match &self.address {
            DeviceAddress::Ip { host, .. } => Some(host.as_str()),
            DeviceAddress::Ble { .. } => None,
        }
    }

    /// TCP port of the serial bridge service (IP transport only)
    pub fn ip_port(&self) -> Option<u16> {
        match &self.address {
            DeviceAddress::Ip { port, .. } => Some(*port),
            DeviceAddress::Ble { .. } => None,
        }
    }

    /// BLE peripheral handle (BLE transport only)
    pub fn ble_peripheral_id(&self) -> Option<&str> {
        match &self.address {
            DeviceAddress::Ble { peripheral_id } => Some(peripheral_id.as_str()),
            DeviceAddress::Ip { .. } => None,
        }
    }

    /// Customer-supplied name for a port, or "" if none is configured.
    /// `port_number` ranges from 1 to `port_count`.
    pub fn port_name(&self, port_number: u8) -> &str {
        self.port_names
            .get(&port_number)
            .map(String::as_str)
            .unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_device() {
        let device = Device::placeholder();
        assert!(device.name.is_empty());
        assert_eq!(device.transport, TransportKind::Any);
        assert_eq!(device.port_count, 1);
    }

    #[test]
    fn test_address_identity() {
        let a = DeviceAddress::Ip {
            host: "10.0.0.5".to_string(),
            port: 3696,
        };
        let b = DeviceAddress::Ip {
            host: "10.0.0.5".to_string(),
            port: 3696,
        };
        assert_eq!(a, b);
        assert_eq!(a.kind(), TransportKind::Ip);
    }

    #[test]
    fn test_port_name_lookup() {
        let mut device = Device::with_ip("Airconsole-4F", "10.0.0.5", 3696);
        device.port_count = 2;
        device.port_names.insert(2, "router".to_string());
        assert_eq!(device.port_name(1), "");
        assert_eq!(device.port_name(2), "router");
    }

    #[test]
    fn test_transport_accessors() {
        let ip = Device::with_ip("a", "10.0.0.5", 3696);
        assert_eq!(ip.ip_address(), Some("10.0.0.5"));
        assert_eq!(ip.ip_port(), Some(3696));
        assert_eq!(ip.ble_peripheral_id(), None);

        let ble = Device::with_ble("b", "peripheral-1");
        assert_eq!(ble.ble_peripheral_id(), Some("peripheral-1"));
        assert_eq!(ble.ip_address(), None);
    }
}
