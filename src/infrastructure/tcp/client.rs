use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

use crate::core::transport::{Transport, TransportSink, TransportSource};
use crate::domain::device::TransportKind;
use crate::domain::error::{AircomError, AircomResult};

/// Stream-socket transport toward the RFC 2217-style service of an IP
/// device.
pub struct TcpTransport {
    host: String,
    port: u16,
    timeout_ms: u64,
}

impl TcpTransport {
    pub fn new(host: String, port: u16, timeout_ms: u64) -> Self {
        Self {
            host,
            port,
            timeout_ms,
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Ip
    }

    async fn open(
        self: Box<Self>,
    ) -> AircomResult<(Box<dyn TransportSink>, Box<dyn TransportSource>)> {
        let stream = tokio::time::timeout(
            Duration::from_millis(self.timeout_ms),
            TcpStream::connect((self.host.as_str(), self.port)),
        )
        .await
        .map_err(|_| AircomError::Connect {
            message: format!("connection timeout to {}:{}", self.host, self.port),
        })?
        .map_err(|e| AircomError::Connect {
            message: format!("failed to connect to {}:{}: {}", self.host, self.port, e),
        })?;

        // Control commands are small and latency sensitive
        if let Err(e) = stream.set_nodelay(true) {
            warn!("failed to set TCP_NODELAY: {}", e);
        }

        info!("TCP connection established to {}:{}", self.host, self.port);

        let (reader, writer) = stream.into_split();
        Ok((
            Box::new(TcpSink { writer }),
            Box::new(TcpSource {
                reader,
                buffer: vec![0u8; 4096],
            }),
        ))
    }
}

struct TcpSink {
    writer: OwnedWriteHalf,
}

#[async_trait]
impl TransportSink for TcpSink {
    async fn send(&mut self, data: &[u8]) -> AircomResult<usize> {
        self.writer.write_all(data).await?;
        self.writer.flush().await?;
        debug!("sent {} bytes over TCP", data.len());
        Ok(data.len())
    }

    async fn close(&mut self) {
        if let Err(e) = self.writer.shutdown().await {
            debug!("TCP shutdown: {}", e);
        }
    }
}

struct TcpSource {
    reader: OwnedReadHalf,
    buffer: Vec<u8>,
}

#[async_trait]
impl TransportSource for TcpSource {
    async fn recv(&mut self) -> AircomResult<Vec<u8>> {
        let n = self.reader.read(&mut self.buffer).await?;
        if n == 0 {
            info!("TCP connection closed by peer");
            return Err(AircomError::Network(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection closed by peer",
            )));
        }
        debug!("received {} bytes over TCP", n);
        Ok(self.buffer[..n].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_connect_to_closed_port_fails_gracefully() {
        // Bind then drop to get a port with nothing listening
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = Box::new(TcpTransport::new(addr.ip().to_string(), addr.port(), 1000));
        let result = transport.open().await;
        assert!(matches!(result, Err(AircomError::Connect { .. })));
    }

    #[tokio::test]
    async fn test_echo_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _server = tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                if let Ok(n) = socket.read(&mut buf).await {
                    let _ = socket.write_all(&buf[..n]).await;
                }
            }
        });

        let transport = Box::new(TcpTransport::new(addr.ip().to_string(), addr.port(), 1000));
        let (mut sink, mut source) = transport.open().await.unwrap();

        assert_eq!(sink.send(b"ping").await.unwrap(), 4);
        assert_eq!(source.recv().await.unwrap(), b"ping".to_vec());

        sink.close().await;
    }

    #[tokio::test]
    async fn test_peer_close_fails_source() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let _server = tokio::spawn(async move {
            // Accept and immediately drop the socket
            let _ = listener.accept().await;
        });

        let transport = Box::new(TcpTransport::new(addr.ip().to_string(), addr.port(), 1000));
        let (_sink, mut source) = transport.open().await.unwrap();
        assert!(source.recv().await.is_err());
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        // TEST-NET-1 (RFC 5737) should be non-routable
        let transport = Box::new(TcpTransport::new("192.0.2.1".to_string(), 3696, 100));
        let result = transport.open().await;
        assert!(matches!(result, Err(AircomError::Connect { .. })));
    }
}
