//! Frame stream
//!
//! Buffered frame reader and writer over the transport halves. The
//! reader scans to the start delimiter, validates the header, then
//! assembles and decodes one frame at a time. Frames addressed to other
//! bus participants are skipped silently; single-frame faults surface as
//! recoverable errors that leave the stream usable.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::trace;

use econet_wire::consts::{DeviceAddress, FRAME_START, HEADER_SIZE};
use econet_wire::frame::{Frame, Header};
use econet_wire::DecodeContext;

use crate::error::{Error, Result};
use crate::transport::{TransportReader, TransportWriter};

const READ_CHUNK: usize = 4096;

/// Buffered frame reader
#[derive(Debug)]
pub struct FrameReader {
    reader: TransportReader,
    buf: BytesMut,
    filter_recipient: bool,
}

impl FrameReader {
    /// Reader that only yields frames addressed to this library
    pub fn new(reader: TransportReader) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(READ_CHUNK),
            filter_recipient: true,
        }
    }

    /// Reader that yields every frame regardless of recipient
    pub fn promiscuous(reader: TransportReader) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(READ_CHUNK),
            filter_recipient: false,
        }
    }

    /// Read the next frame addressed to this library.
    ///
    /// Returns `(frame, wire_size)`. IO errors are fatal; decode faults
    /// are recoverable and consume the offending frame.
    pub async fn read_frame(&mut self, context: &DecodeContext) -> Result<(Frame, usize)> {
        loop {
            // Drop noise before the next start delimiter
            if let Some(start) = self.buf.iter().position(|byte| *byte == FRAME_START) {
                if start > 0 {
                    self.buf.advance(start);
                }
            } else {
                self.buf.clear();
                self.fill().await?;
                continue;
            }

            if self.buf.len() < HEADER_SIZE {
                self.fill().await?;
                continue;
            }

            let header = match Header::parse(&self.buf) {
                Ok(header) => header,
                Err(e) => {
                    // Unreachable start delimiter mismatch; resync
                    self.buf.advance(1);
                    return Err(Error::Protocol(e));
                },
            };
            if let Err(e) = header.validate() {
                self.buf.advance(1);
                return Err(Error::Protocol(e));
            }

            while self.buf.len() < header.frame_length {
                self.fill().await?;
            }

            let wire: Vec<u8> = self.buf[..header.frame_length].to_vec();
            let recipient = header.recipient;
            let result = Frame::decode(&wire, context);
            self.buf.advance(header.frame_length);

            match result {
                Err(e) => return Err(Error::Protocol(e)),
                Ok(_)
                    if self.filter_recipient
                        && recipient != u8::from(DeviceAddress::Econet)
                        && recipient != u8::from(DeviceAddress::Broadcast) =>
                {
                    // Addressed to another bus participant
                    trace!("skipping frame for {:#04X}", recipient);
                    continue;
                },
                Ok(frame) => {
                    trace!("RX {} bytes: {:02X?}", wire.len(), &wire);
                    return Ok((frame, wire.len()));
                },
            }
        }
    }

    async fn fill(&mut self) -> Result<()> {
        let read = self.reader.read_buf(&mut self.buf).await?;
        if read == 0 {
            return Err(Error::connection("transport closed"));
        }
        Ok(())
    }
}

/// Frame writer
#[derive(Debug)]
pub struct FrameWriter {
    writer: TransportWriter,
}

impl FrameWriter {
    pub fn new(writer: TransportWriter) -> Self {
        Self { writer }
    }

    /// Serialize and send one frame, returning the wire size
    pub async fn write_frame(&mut self, frame: &Frame, context: &DecodeContext) -> Result<usize> {
        let bytes = frame.encode(context)?;
        self.writer.write_all(&bytes).await?;
        self.writer.flush().await?;
        trace!("TX {} bytes: {:02X?}", bytes.len(), &bytes);
        Ok(bytes.len())
    }

    /// Shut the write side down
    pub async fn close(&mut self) -> Result<()> {
        self.writer.shutdown().await?;
        Ok(())
    }
}

/// Direct frame-level access to a transport, bypassing the driver.
///
/// This is the raw alternative to a full [`crate::Connection`]: callers
/// read and write frames themselves, typically against the in-process
/// transport in tests or protocol tooling.
#[derive(Debug)]
pub struct RawLink {
    reader: FrameReader,
    writer: FrameWriter,
    context: DecodeContext,
}

impl RawLink {
    pub fn new(transport: crate::transport::Transport) -> Self {
        let (reader, writer) = transport.split();
        Self {
            reader: FrameReader::promiscuous(reader),
            writer: FrameWriter::new(writer),
            context: DecodeContext::default(),
        }
    }

    /// Replace the decode context used for schema-driven payloads
    pub fn set_context(&mut self, context: DecodeContext) {
        self.context = context;
    }

    pub async fn read(&mut self) -> Result<Frame> {
        Ok(self.reader.read_frame(&self.context).await?.0)
    }

    pub async fn write(&mut self, frame: &Frame) -> Result<()> {
        self.writer.write_frame(frame, &self.context).await?;
        Ok(())
    }
}
