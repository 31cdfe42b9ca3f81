// BLE module - Characteristic-based transport for Bluetooth LE devices
//
// The crate does not talk to a BLE stack directly. Platform integrations
// implement `BleLink` over their central (a btleplug peripheral, a
// CoreBluetooth wrapper, a test double) and `BleTransport` adapts that
// narrow byte-pipe interface to the session engine's transport contract.
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use crate::core::transport::{Transport, TransportSink, TransportSource};
use crate::domain::device::TransportKind;
use crate::domain::error::{AircomError, AircomResult};

/// Byte pipe over a pair of GATT characteristics.
///
/// `open` connects the peripheral and subscribes to its notify
/// characteristic; each notification's payload is pushed into the sink the
/// implementation was handed. `write` sends one chunk to the write
/// characteristic; callers never pass more than `write_chunk_size` bytes.
#[async_trait]
pub trait BleLink: Send {
    async fn open(&mut self, notifications: mpsc::UnboundedSender<Vec<u8>>) -> AircomResult<()>;

    async fn write(&mut self, data: &[u8]) -> AircomResult<()>;

    /// Largest write the characteristic accepts (ATT payload size)
    fn write_chunk_size(&self) -> usize;

    async fn close(&mut self);
}

/// Transport over a [`BleLink`], chunking writes to the link's ATT payload
/// size.
pub struct BleTransport {
    link: Box<dyn BleLink>,
}

impl BleTransport {
    pub fn new(link: Box<dyn BleLink>) -> Self {
        Self { link }
    }
}

#[async_trait]
impl Transport for BleTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Ble
    }

    async fn open(
        self: Box<Self>,
    ) -> AircomResult<(Box<dyn TransportSink>, Box<dyn TransportSource>)> {
        let mut link = self.link;
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();
        link.open(notify_tx).await.map_err(|e| AircomError::Connect {
            message: format!("BLE link failed to open: {}", e),
        })?;

        let chunk_size = link.write_chunk_size().max(1);
        Ok((
            Box::new(BleSink { link, chunk_size }),
            Box::new(BleSource { notify_rx }),
        ))
    }
}

struct BleSink {
    link: Box<dyn BleLink>,
    chunk_size: usize,
}

#[async_trait]
impl TransportSink for BleSink {
    async fn send(&mut self, data: &[u8]) -> AircomResult<usize> {
        for chunk in data.chunks(self.chunk_size) {
            self.link.write(chunk).await?;
        }
        debug!("sent {} bytes over BLE", data.len());
        Ok(data.len())
    }

    async fn close(&mut self) {
        self.link.close().await;
    }
}

struct BleSource {
    notify_rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

#[async_trait]
impl TransportSource for BleSource {
    async fn recv(&mut self) -> AircomResult<Vec<u8>> {
        self.notify_rx.recv().await.ok_or_else(|| {
            AircomError::Network(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "BLE peripheral disconnected",
            ))
        })
    }
}
