use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::core::discovery::registry::{DeviceEvent, DeviceRegistry};
use crate::core::discovery::scanner::{DeviceScanner, DiscoveryEvent};
use crate::domain::device::{Device, TransportKind};
use crate::domain::error::{AircomError, AircomResult};

/// Discovery front door: owns the registered scanners, merges their raw
/// events into one registry and delivers add/remove notifications through
/// a single-consumer queue.
///
/// Must be created within a tokio runtime; the merge task is spawned on it.
pub struct DeviceManager {
    registry: Arc<Mutex<DeviceRegistry>>,
    scanners: tokio::sync::Mutex<Vec<Box<dyn DeviceScanner>>>,
    discovery_tx: mpsc::UnboundedSender<DiscoveryEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<DeviceEvent>>>,
    scan_wifi: AtomicBool,
    scan_bluetooth: AtomicBool,
    scanning: AtomicBool,
    merge_task: tokio::task::JoinHandle<()>,
}

impl DeviceManager {
    pub fn new() -> Self {
        let registry = Arc::new(Mutex::new(DeviceRegistry::new()));
        let (discovery_tx, mut discovery_rx) = mpsc::unbounded_channel::<DiscoveryEvent>();
        let (device_tx, device_rx) = mpsc::unbounded_channel::<DeviceEvent>();

        let merge_registry = Arc::clone(&registry);
        let merge_task = tokio::spawn(async move {
            while let Some(event) = discovery_rx.recv().await {
                let lifecycle = merge_registry.lock().apply(event);
                if let Some(event) = lifecycle {
                    let _ = device_tx.send(event);
                }
            }
        });

        Self {
            registry,
            scanners: tokio::sync::Mutex::new(Vec::new()),
            discovery_tx,
            events_rx: Mutex::new(Some(device_rx)),
            scan_wifi: AtomicBool::new(true),
            scan_bluetooth: AtomicBool::new(true),
            scanning: AtomicBool::new(false),
            merge_task,
        }
    }

    /// SDK version string, e.g. "0.1.0"
    pub fn sdk_version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }

    /// Take the device event queue. Yields `Some` exactly once.
    pub fn take_events(&self) -> Option<mpsc::UnboundedReceiver<DeviceEvent>> {
        self.events_rx.lock().take()
    }

    /// Whether `scan_for_devices` starts IP/mDNS scanners (default true).
    /// Set before calling `scan_for_devices`.
    pub fn set_scan_wifi(&self, enabled: bool) {
        self.scan_wifi.store(enabled, Ordering::Relaxed);
    }

    /// Whether `scan_for_devices` starts BLE scanners (default true).
    /// Set before calling `scan_for_devices`.
    pub fn set_scan_bluetooth(&self, enabled: bool) {
        self.scan_bluetooth.store(enabled, Ordering::Relaxed);
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Relaxed)
    }

    /// Register a discovery collaborator. Scanners registered while a scan
    /// is running join on the next `scan_for_devices`.
    pub async fn register_scanner(&self, scanner: Box<dyn DeviceScanner>) {
        self.scanners.lock().await.push(scanner);
    }

    /// Start all registered scanners whose transport is enabled.
    pub async fn scan_for_devices(&self) -> AircomResult<()> {
        let scan_wifi = self.scan_wifi.load(Ordering::Relaxed);
        let scan_bluetooth = self.scan_bluetooth.load(Ordering::Relaxed);
        let mut errors = Vec::new();

        let mut scanners = self.scanners.lock().await;
        for scanner in scanners.iter_mut() {
            let enabled = match scanner.transport() {
                TransportKind::Ip => scan_wifi,
                TransportKind::Ble => scan_bluetooth,
                TransportKind::Any => true,
            };
            if !enabled {
                continue;
            }
            if let Err(error) = scanner.start(self.discovery_tx.clone()).await {
                warn!(transport = %scanner.transport(), %error, "scanner failed to start");
                errors.push(error.to_string());
            }
        }
        drop(scanners);

        self.scanning.store(true, Ordering::Relaxed);
        info!("device scan started");

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AircomError::Session {
                message: format!("scanners failed to start: {}", errors.join(", ")),
            })
        }
    }

    /// Stop all scanners. Discovered devices stay in the registry.
    pub async fn stop_scanning(&self) {
        let mut scanners = self.scanners.lock().await;
        for scanner in scanners.iter_mut() {
            scanner.stop().await;
        }
        drop(scanners);
        self.scanning.store(false, Ordering::Relaxed);
        info!("device scan stopped");
    }

    /// Best device to connect to; a placeholder when none were discovered
    pub fn default_device(&self) -> Device {
        self.registry.lock().default_device()
    }

    /// Snapshot of all discovered devices in discovery order
    pub fn device_list(&self) -> Vec<Device> {
        self.registry.lock().device_list()
    }

    /// Snapshot filtered by transport kind
    pub fn device_list_of_type(&self, kind: TransportKind) -> Vec<Device> {
        self.registry.lock().device_list_of_type(kind)
    }
}

impl Default for DeviceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DeviceManager {
    fn drop(&mut self) {
        self.merge_task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::discovery::scanner::DeviceMetadata;
    use crate::domain::device::DeviceAddress;
    use async_trait::async_trait;
    use std::time::Duration;
    use tokio::time::timeout;

    /// Scanner scripted with a fixed list of events
    struct ScriptedScanner {
        transport: TransportKind,
        events: Vec<DiscoveryEvent>,
    }

    #[async_trait]
    impl DeviceScanner for ScriptedScanner {
        fn transport(&self) -> TransportKind {
            self.transport
        }

        async fn start(
            &mut self,
            sink: mpsc::UnboundedSender<DiscoveryEvent>,
        ) -> AircomResult<()> {
            for event in self.events.clone() {
                let _ = sink.send(event);
            }
            Ok(())
        }

        async fn stop(&mut self) {}
    }

    fn found(host: &str, name: &str) -> DiscoveryEvent {
        DiscoveryEvent::Found {
            address: DeviceAddress::Ip {
                host: host.to_string(),
                port: 3696,
            },
            metadata: DeviceMetadata::named(name),
        }
    }

    #[tokio::test]
    async fn test_scan_merges_and_notifies() {
        let manager = DeviceManager::new();
        let mut events = manager.take_events().unwrap();

        manager
            .register_scanner(Box::new(ScriptedScanner {
                transport: TransportKind::Ip,
                events: vec![found("10.0.0.5", "Airconsole-4F")],
            }))
            .await;

        manager.scan_for_devices().await.unwrap();
        assert!(manager.is_scanning());

        let event = timeout(Duration::from_secs(1), events.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, DeviceEvent::Added(ref d) if d.name == "Airconsole-4F"));
        assert_eq!(manager.device_list().len(), 1);

        manager.stop_scanning().await;
        assert!(!manager.is_scanning());
        // Devices survive a scan stop
        assert_eq!(manager.device_list().len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_transport_not_started() {
        let manager = DeviceManager::new();
        manager.set_scan_wifi(false);

        manager
            .register_scanner(Box::new(ScriptedScanner {
                transport: TransportKind::Ip,
                events: vec![found("10.0.0.5", "skipped")],
            }))
            .await;

        manager.scan_for_devices().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(manager.device_list().is_empty());
    }

    #[tokio::test]
    async fn test_default_device_without_discovery() {
        let manager = DeviceManager::new();
        let device = manager.default_device();
        assert!(device.name.is_empty());
        assert_eq!(device.transport, TransportKind::Any);
    }

    #[test]
    fn test_sdk_version_is_set() {
        assert!(!DeviceManager::sdk_version().is_empty());
    }
}
