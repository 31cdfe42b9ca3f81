use tracing::debug;

use crate::core::discovery::scanner::{DeviceMetadata, DiscoveryEvent};
use crate::domain::device::{Device, DeviceAddress, TransportKind, DEVICE_TYPE_AIRCONSOLE};

/// Lifecycle notification for the merged device list
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    Added(Device),
    Removed(Device),
}

/// Merged view of the devices announced by all discovery collaborators.
///
/// Keyed by transport address: announcements for a known address refine the
/// existing entry in place instead of duplicating it, regardless of which
/// collaborator produced them. Insertion order is preserved for snapshots.
pub struct DeviceRegistry {
    devices: Vec<Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self {
            devices: Vec::new(),
        }
    }

    /// Apply a raw discovery event, returning the application-visible
    /// lifecycle event it produced, if any.
    pub fn apply(&mut self, event: DiscoveryEvent) -> Option<DeviceEvent> {
        match event {
            DiscoveryEvent::Found { address, metadata } => self.found(address, metadata),
            DiscoveryEvent::Lost { address } => self.lost(&address),
        }
    }

    fn found(&mut self, address: DeviceAddress, metadata: DeviceMetadata) -> Option<DeviceEvent> {
        if let Some(existing) = self.devices.iter_mut().find(|d| d.address == address) {
            refine(existing, metadata);
            debug!(device = %address, "refreshed known device");
            return None;
        }

        let mut device = Device {
            name: metadata.name,
            transport: address.kind(),
            address,
            device_type: if metadata.device_type.is_empty() {
                DEVICE_TYPE_AIRCONSOLE.to_string()
            } else {
                metadata.device_type
            },
            firmware_version: metadata.firmware_version,
            hardware_version: metadata.hardware_version,
            port_count: metadata.port_count.max(1),
            port_names: metadata.port_names,
        };
        // Port names only make sense on the IP transport
        if device.transport != TransportKind::Ip {
            device.port_names.clear();
        }
        debug!(device = %device.address, name = %device.name, "device added");
        self.devices.push(device.clone());
        Some(DeviceEvent::Added(device))
    }

    fn lost(&mut self, address: &DeviceAddress) -> Option<DeviceEvent> {
        let index = self.devices.iter().position(|d| &d.address == address)?;
        let device = self.devices.remove(index);
        debug!(device = %device.address, name = %device.name, "device removed");
        Some(DeviceEvent::Removed(device))
    }

    /// Best device to connect to: the first IP device if any exist, else
    /// the first BLE device, else a placeholder (never `None`).
    pub fn default_device(&self) -> Device {
        self.devices
            .iter()
            .find(|d| d.transport == TransportKind::Ip)
            .or_else(|| {
                self.devices
                    .iter()
                    .find(|d| d.transport == TransportKind::Ble)
            })
            .cloned()
            .unwrap_or_else(Device::placeholder)
    }

    /// Point-in-time snapshot of all devices in insertion order
    pub fn device_list(&self) -> Vec<Device> {
        self.devices.clone()
    }

    /// Snapshot filtered by transport kind; `Any` returns everything
    pub fn device_list_of_type(&self, kind: TransportKind) -> Vec<Device> {
        self.devices
            .iter()
            .filter(|d| kind == TransportKind::Any || d.transport == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold later discovery detail into a known device, field by field
fn refine(device: &mut Device, metadata: DeviceMetadata) {
    if !metadata.name.is_empty() {
        device.name = metadata.name;
    }
    if !metadata.device_type.is_empty() {
        device.device_type = metadata.device_type;
    }
    if !metadata.firmware_version.is_empty() {
        device.firmware_version = metadata.firmware_version;
    }
    if !metadata.hardware_version.is_empty() {
        device.hardware_version = metadata.hardware_version;
    }
    if metadata.port_count > 0 {
        device.port_count = metadata.port_count;
    }
    if device.transport == TransportKind::Ip {
        device.port_names.extend(metadata.port_names);
    }
}
