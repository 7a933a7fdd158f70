//! Byte transports
//!
//! TCP, serial and in-process transports behind one enum. The driver
//! splits a transport into read and write halves so the reader and writer
//! tasks can run concurrently.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf, ReadHalf, WriteHalf};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tracing::{debug, error, info};

use crate::config::{timeouts, SerialConfig};
use crate::error::{Error, Result};

/// Buffer size for in-process transports
const MEMORY_BUFFER: usize = 64 * 1024;

/// A connected byte transport
#[derive(Debug)]
pub enum Transport {
    /// TCP connection to an ecoNET gateway
    Tcp(TcpStream),
    /// Direct serial connection (RS-485 adapter)
    Serial(SerialStream),
    /// In-process stream for tests and raw frame exchange
    Memory(DuplexStream),
}

impl Transport {
    /// Open a TCP transport
    pub async fn connect_tcp(host: &str, port: u16) -> Result<Self> {
        let addr = format!("{host}:{port}");
        debug!("TCP connecting: {}", addr);

        let connect_timeout = Duration::from_millis(timeouts::CONNECT_TIMEOUT_MS);
        match timeout(connect_timeout, TcpStream::connect(&addr)).await {
            Ok(Ok(stream)) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!("TCP_NODELAY: {}", e);
                }
                info!("TCP connected: {}", addr);
                Ok(Transport::Tcp(stream))
            },
            Ok(Err(e)) => {
                error!("TCP err: {} - {}", addr, e);
                Err(Error::connection(format!("failed to connect to {addr}: {e}")))
            },
            Err(_) => {
                Err(Error::timeout(format!("connection to {addr} timed out")))
            },
        }
    }

    /// Open a serial transport
    pub async fn open_serial(config: &SerialConfig) -> Result<Self> {
        debug!("Serial: {} @{}baud", config.device, config.baud_rate);

        let parity = match config.parity.as_str() {
            "Even" => tokio_serial::Parity::Even,
            "Odd" => tokio_serial::Parity::Odd,
            _ => tokio_serial::Parity::None,
        };

        let data_bits = match config.data_bits {
            5 => tokio_serial::DataBits::Five,
            6 => tokio_serial::DataBits::Six,
            7 => tokio_serial::DataBits::Seven,
            _ => tokio_serial::DataBits::Eight,
        };

        let stop_bits = match config.stop_bits {
            2 => tokio_serial::StopBits::Two,
            _ => tokio_serial::StopBits::One,
        };

        match tokio_serial::new(&config.device, config.baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .open_native_async()
        {
            Ok(port) => {
                info!("Serial opened: {}", config.device);
                Ok(Transport::Serial(port))
            },
            Err(e) => {
                error!("Serial err: {} - {}", config.device, e);
                Err(Error::connection(format!(
                    "failed to open serial port {}: {e}",
                    config.device
                )))
            },
        }
    }

    /// Create a connected in-process transport pair
    pub fn memory_pair() -> (Transport, Transport) {
        let (near, far) = tokio::io::duplex(MEMORY_BUFFER);
        (Transport::Memory(near), Transport::Memory(far))
    }

    /// Split into independent read and write halves
    pub fn split(self) -> (TransportReader, TransportWriter) {
        match self {
            Transport::Tcp(stream) => {
                let (read, write) = stream.into_split();
                (TransportReader::Tcp(read), TransportWriter::Tcp(write))
            },
            Transport::Serial(stream) => {
                let (read, write) = tokio::io::split(stream);
                (TransportReader::Serial(read), TransportWriter::Serial(write))
            },
            Transport::Memory(stream) => {
                let (read, write) = tokio::io::split(stream);
                (TransportReader::Memory(read), TransportWriter::Memory(write))
            },
        }
    }
}

/// Read half of a transport
#[derive(Debug)]
pub enum TransportReader {
    Tcp(OwnedReadHalf),
    Serial(ReadHalf<SerialStream>),
    Memory(ReadHalf<DuplexStream>),
}

/// Write half of a transport
#[derive(Debug)]
pub enum TransportWriter {
    Tcp(OwnedWriteHalf),
    Serial(WriteHalf<SerialStream>),
    Memory(WriteHalf<DuplexStream>),
}

impl AsyncRead for TransportReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            TransportReader::Tcp(inner) => Pin::new(inner).poll_read(cx, buf),
            TransportReader::Serial(inner) => Pin::new(inner).poll_read(cx, buf),
            TransportReader::Memory(inner) => Pin::new(inner).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for TransportWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            TransportWriter::Tcp(inner) => Pin::new(inner).poll_write(cx, buf),
            TransportWriter::Serial(inner) => Pin::new(inner).poll_write(cx, buf),
            TransportWriter::Memory(inner) => Pin::new(inner).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            TransportWriter::Tcp(inner) => Pin::new(inner).poll_flush(cx),
            TransportWriter::Serial(inner) => Pin::new(inner).poll_flush(cx),
            TransportWriter::Memory(inner) => Pin::new(inner).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            TransportWriter::Tcp(inner) => Pin::new(inner).poll_shutdown(cx),
            TransportWriter::Serial(inner) => Pin::new(inner).poll_shutdown(cx),
            TransportWriter::Memory(inner) => Pin::new(inner).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_memory_pair_carries_bytes() {
        let (near, far) = Transport::memory_pair();
        let (_near_read, mut near_write) = near.split();
        let (mut far_read, _far_write) = far.split();

        near_write.write_all(b"econet").await.unwrap();
        near_write.flush().await.unwrap();

        let mut buf = [0u8; 6];
        far_read.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"econet");
    }

    #[tokio::test]
    async fn test_tcp_connect_refused() {
        // Port 1 is essentially never listening
        let result = Transport::connect_tcp("127.0.0.1", 1).await;
        assert!(result.is_err());
    }
}
