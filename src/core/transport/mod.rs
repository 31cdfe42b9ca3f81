// Transport module - Uniform byte-stream interface over IP or BLE
pub mod mock;

use async_trait::async_trait;

use crate::domain::device::{Device, DeviceAddress, TransportKind};
use crate::domain::error::{AircomError, AircomResult};

/// A transport ready to be opened toward one serial port of one device.
///
/// `open` consumes the transport and yields independent send and receive
/// halves so the session engine can drive both concurrently. The engine
/// never branches on the transport kind; both the stream-socket and the
/// BLE-characteristic variants satisfy this contract.
#[async_trait]
pub trait Transport: Send {
    fn kind(&self) -> TransportKind;

    /// Establish the connection. Fails with `AircomError::Connect`.
    async fn open(
        self: Box<Self>,
    ) -> AircomResult<(Box<dyn TransportSink>, Box<dyn TransportSource>)>;
}

/// Outbound half of an open transport
#[async_trait]
pub trait TransportSink: Send {
    /// Send bytes, returning the count accepted. Fails with
    /// `AircomError::Network` on fatal transport loss.
    async fn send(&mut self, data: &[u8]) -> AircomResult<usize>;

    /// Tear the connection down. Safe to call more than once.
    async fn close(&mut self);
}

/// Inbound half of an open transport
#[async_trait]
pub trait TransportSource: Send {
    /// Wait for the next delivery of bytes. Fails with
    /// `AircomError::Network` on fatal transport loss (including an orderly
    /// close by the peer).
    async fn recv(&mut self) -> AircomResult<Vec<u8>>;
}

/// Builds transports for devices; the session engine owns the result.
pub trait TransportFactory: Send + Sync {
    fn create(&self, device: &Device, port_number: u8) -> AircomResult<Box<dyn Transport>>;
}

/// Provides BLE byte links for peripherals; see `infrastructure::ble`.
pub trait BleLinkProvider: Send + Sync {
    fn link_for(
        &self,
        peripheral_id: &str,
    ) -> AircomResult<Box<dyn crate::infrastructure::ble::BleLink>>;
}

/// Factory covering the built-in transports: TCP for IP devices and, when a
/// `BleLinkProvider` has been installed, characteristic links for BLE
/// devices.
pub struct DefaultTransportFactory {
    connect_timeout_ms: u64,
    ble_provider: Option<Box<dyn BleLinkProvider>>,
}

impl DefaultTransportFactory {
    pub fn new(connect_timeout_ms: u64) -> Self {
        Self {
            connect_timeout_ms,
            ble_provider: None,
        }
    }

    /// Install a BLE link provider, enabling sessions to BLE devices.
    pub fn with_ble_provider(mut self, provider: Box<dyn BleLinkProvider>) -> Self {
        self.ble_provider = Some(provider);
        self
    }
}

impl Default for DefaultTransportFactory {
    fn default() -> Self {
        Self::new(5000)
    }
}

impl TransportFactory for DefaultTransportFactory {
    fn create(&self, device: &Device, port_number: u8) -> AircomResult<Box<dyn Transport>> {
        match &device.address {
            DeviceAddress::Ip { host, port } => {
                if host.is_empty() {
                    return Err(AircomError::Connect {
                        message: "device has no address to connect to".to_string(),
                    });
                }
                // One bridge listener per physical port, on consecutive
                // TCP ports starting at the advertised base.
                let tcp_port = port + u16::from(port_number.saturating_sub(1));
                Ok(Box::new(crate::infrastructure::tcp::TcpTransport::new(
                    host.clone(),
                    tcp_port,
                    self.connect_timeout_ms,
                )))
            }
            DeviceAddress::Ble { peripheral_id } => match &self.ble_provider {
                Some(provider) => {
                    let link = provider.link_for(peripheral_id)?;
                    Ok(Box::new(crate::infrastructure::ble::BleTransport::new(
                        link,
                    )))
                }
                None => Err(AircomError::Connect {
                    message: "no BLE link provider installed".to_string(),
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_rejects_empty_address() {
        let factory = DefaultTransportFactory::default();
        let device = Device::placeholder();
        assert!(factory.create(&device, 1).is_err());
    }

    #[test]
    fn test_factory_rejects_ble_without_provider() {
        let factory = DefaultTransportFactory::default();
        let device = Device::with_ble("Airconsole-XT", "peripheral-1");
        let result = factory.create(&device, 1);
        assert!(matches!(result, Err(AircomError::Connect { .. })));
    }

    #[test]
    fn test_factory_builds_tcp_transport() {
        let factory = DefaultTransportFactory::default();
        let device = Device::with_ip("Airconsole-4F", "10.0.0.5", 3696);
        let transport = factory.create(&device, 1).unwrap();
        assert_eq!(transport.kind(), TransportKind::Ip);
    }
}
