use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;

use crate::domain::config::AircomConfig;
use crate::domain::device::{Device, DeviceAddress, TransportKind, DEVICE_TYPE_AIRCONSOLE};
use crate::domain::error::AircomResult;

/// Metadata carried by a discovery announcement.
///
/// Empty / zero fields mean "unknown"; the registry refines a known device
/// only with the fields a later announcement actually provides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceMetadata {
    pub name: String,
    pub device_type: String,
    pub firmware_version: String,
    pub hardware_version: String,
    pub port_count: u8,
    pub port_names: HashMap<u8, String>,
}

impl DeviceMetadata {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// Raw event from a discovery collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum DiscoveryEvent {
    Found {
        address: DeviceAddress,
        metadata: DeviceMetadata,
    },
    Lost {
        address: DeviceAddress,
    },
}

/// A discovery collaborator for one transport kind.
///
/// Implementations wrap an mDNS browser, a BLE central, or any other
/// source of device announcements; they push `found`/`lost` events into the
/// sink for as long as scanning is active. `start` may be called again
/// after `stop`; re-announcing known devices is fine, the registry
/// deduplicates.
#[async_trait]
pub trait DeviceScanner: Send {
    fn transport(&self) -> TransportKind;

    async fn start(&mut self, sink: mpsc::UnboundedSender<DiscoveryEvent>) -> AircomResult<()>;

    async fn stop(&mut self);
}

/// Scanner announcing statically configured devices.
///
/// Covers networks where mDNS does not function: entries from the
/// configuration file appear in the registry as ordinary IP devices the
/// moment scanning starts.
pub struct StaticScanner {
    devices: Vec<Device>,
}

impl StaticScanner {
    pub fn new(devices: Vec<Device>) -> Self {
        Self { devices }
    }

    pub fn from_config(config: &AircomConfig) -> Self {
        Self::new(config.devices.iter().map(|entry| entry.to_device()).collect())
    }
}

#[async_trait]
impl DeviceScanner for StaticScanner {
    fn transport(&self) -> TransportKind {
        TransportKind::Ip
    }

    async fn start(&mut self, sink: mpsc::UnboundedSender<DiscoveryEvent>) -> AircomResult<()> {
        for device in &self.devices {
            debug!(device = %device.address, "announcing static device");
            let metadata = DeviceMetadata {
                name: device.name.clone(),
                device_type: DEVICE_TYPE_AIRCONSOLE.to_string(),
                firmware_version: device.firmware_version.clone(),
                hardware_version: device.hardware_version.clone(),
                port_count: device.port_count,
                port_names: device.port_names.clone(),
            };
            let _ = sink.send(DiscoveryEvent::Found {
                address: device.address.clone(),
                metadata,
            });
        }
        Ok(())
    }

    async fn stop(&mut self) {}
}
