//! In-memory transport for driving a session without real I/O.
//!
//! The device side of the pair is scripted through a [`MockDeviceHandle`]:
//! tests inject inbound wire bytes and observe everything the session
//! sends, or drop the handle to simulate transport loss.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::mpsc;

use crate::core::protocol::{codec, PortCommand};
use crate::core::transport::{Transport, TransportFactory, TransportSink, TransportSource};
use crate::domain::device::{Device, TransportKind};
use crate::domain::error::{AircomError, AircomResult};

/// Scriptable transport endpoint
pub struct MockTransport {
    kind: TransportKind,
    fail_open: Option<String>,
    open_delay: std::time::Duration,
    inbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
    outbound_tx: mpsc::UnboundedSender<Vec<u8>>,
}

/// Device-side controls for a [`MockTransport`]
pub struct MockDeviceHandle {
    inbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    outbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

impl MockTransport {
    /// Create a transport/device-handle pair.
    pub fn pair(kind: TransportKind) -> (Self, MockDeviceHandle) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        (
            Self {
                kind,
                fail_open: None,
                open_delay: std::time::Duration::ZERO,
                inbound_rx,
                outbound_tx,
            },
            MockDeviceHandle {
                inbound_tx,
                outbound_rx,
            },
        )
    }

    /// Make `open` fail with the given message.
    pub fn fail_open(mut self, message: &str) -> Self {
        self.fail_open = Some(message.to_string());
        self
    }

    /// Make `open` take this long before succeeding.
    pub fn delay_open(mut self, delay: std::time::Duration) -> Self {
        self.open_delay = delay;
        self
    }
}

impl MockDeviceHandle {
    /// Inject raw wire bytes as one transport delivery.
    pub fn inject(&self, bytes: &[u8]) {
        let _ = self.inbound_tx.send(bytes.to_vec());
    }

    /// Inject a device -> client control command.
    pub fn inject_command(&self, command: &PortCommand) {
        self.inject(&codec::encode_host_command(command));
    }

    /// Inject literal data octets, escaping them for the wire.
    pub fn inject_data(&self, data: &[u8]) {
        self.inject(&codec::encode_data(data));
    }

    /// Wait for the next delivery sent by the session.
    pub async fn recv_outbound(&mut self) -> Option<Vec<u8>> {
        self.outbound_rx.recv().await
    }

    /// Simulate fatal transport loss.
    pub fn close(self) {}
}

#[async_trait]
impl Transport for MockTransport {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn open(
        self: Box<Self>,
    ) -> AircomResult<(Box<dyn TransportSink>, Box<dyn TransportSource>)> {
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }
        if let Some(message) = self.fail_open {
            return Err(AircomError::Connect { message });
        }
        Ok((
            Box::new(MockSink {
                outbound_tx: self.outbound_tx,
            }),
            Box::new(MockSource {
                inbound_rx: self.inbound_rx,
            }),
        ))
    }
}

struct MockSink {
    outbound_tx: mpsc::UnboundedSender<Vec<u8>>,
}

#[async_trait]
impl TransportSink for MockSink {
    async fn send(&mut self, data: &[u8]) -> AircomResult<usize> {
        self.outbound_tx.send(data.to_vec()).map_err(|_| {
            AircomError::Network(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "peer closed",
            ))
        })?;
        Ok(data.len())
    }

    async fn close(&mut self) {}
}

struct MockSource {
    inbound_rx: mpsc::UnboundedReceiver<Vec<u8>>,
}

#[async_trait]
impl TransportSource for MockSource {
    async fn recv(&mut self) -> AircomResult<Vec<u8>> {
        self.inbound_rx.recv().await.ok_or_else(|| {
            AircomError::Network(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "peer closed",
            ))
        })
    }
}

/// Factory handing out pre-built mock transports in FIFO order.
///
/// Tests queue one transport per expected connection attempt and keep the
/// matching device handles.
pub struct MockTransportFactory {
    pending: Mutex<VecDeque<MockTransport>>,
}

impl MockTransportFactory {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a transport for the next `create` call and return the device
    /// handle controlling it.
    pub fn expect_connection(&self) -> MockDeviceHandle {
        let (transport, handle) = MockTransport::pair(TransportKind::Ip);
        self.pending.lock().push_back(transport);
        handle
    }

    /// Queue a transport whose open fails with the given message.
    pub fn expect_failed_connection(&self, message: &str) {
        let (transport, _handle) = MockTransport::pair(TransportKind::Ip);
        self.pending.lock().push_back(transport.fail_open(message));
    }

    /// Queue a transport whose open takes `delay` before succeeding.
    pub fn expect_slow_connection(&self, delay: std::time::Duration) -> MockDeviceHandle {
        let (transport, handle) = MockTransport::pair(TransportKind::Ip);
        self.pending.lock().push_back(transport.delay_open(delay));
        handle
    }
}

impl Default for MockTransportFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportFactory for MockTransportFactory {
    fn create(&self, _device: &Device, _port_number: u8) -> AircomResult<Box<dyn Transport>> {
        match self.pending.lock().pop_front() {
            Some(transport) => Ok(Box::new(transport)),
            None => Err(AircomError::Connect {
                message: "no mock transport queued".to_string(),
            }),
        }
    }
}
