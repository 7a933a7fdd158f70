//! Frame envelope
//!
//! Layout: start delimiter, u16 length, recipient, sender, sender type,
//! protocol version, frame type, payload, CRC, end delimiter. The length
//! field counts the whole frame including both delimiters; the CRC is the
//! XOR fold of every byte from the start delimiter through the last
//! payload byte.

use crate::consts::{
    DeviceAddress, ECONET_TYPE, ECONET_VERSION, FRAME_END, FRAME_START, HEADER_SIZE,
    MAX_FRAME_LENGTH, MIN_FRAME_LENGTH,
};
use crate::error::{Result, WireError};
use crate::frames::{DecodeContext, FrameData};

/// A complete wire frame
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub recipient: u8,
    pub sender: u8,
    pub sender_type: u8,
    pub econet_version: u8,
    pub data: FrameData,
}

impl Frame {
    /// Build a frame from this library to the given recipient
    pub fn new(recipient: DeviceAddress, data: FrameData) -> Self {
        Self {
            recipient: recipient.into(),
            sender: DeviceAddress::Econet.into(),
            sender_type: ECONET_TYPE,
            econet_version: ECONET_VERSION,
            data,
        }
    }

    /// Build a frame with an explicit sender, mostly for tests
    pub fn from_device(sender: DeviceAddress, recipient: DeviceAddress, data: FrameData) -> Self {
        Self {
            recipient: recipient.into(),
            sender: sender.into(),
            sender_type: ECONET_TYPE,
            econet_version: ECONET_VERSION,
            data,
        }
    }

    /// Serialize to wire bytes
    pub fn encode(&self, context: &DecodeContext) -> Result<Vec<u8>> {
        let payload = self.data.encode(context)?;
        let length = HEADER_SIZE + 1 + payload.len() + 2;
        if length > MAX_FRAME_LENGTH {
            return Err(WireError::malformed(format!(
                "frame too long: {length} bytes"
            )));
        }

        let mut bytes = Vec::with_capacity(length);
        bytes.push(FRAME_START);
        bytes.extend_from_slice(&(length as u16).to_le_bytes());
        bytes.push(self.recipient);
        bytes.push(self.sender);
        bytes.push(self.sender_type);
        bytes.push(self.econet_version);
        bytes.push(self.data.frame_type_byte());
        bytes.extend_from_slice(&payload);
        bytes.push(crc(&bytes));
        bytes.push(FRAME_END);
        Ok(bytes)
    }

    /// Parse one complete frame from wire bytes
    pub fn decode(bytes: &[u8], context: &DecodeContext) -> Result<Frame> {
        let header = Header::parse(bytes)?;
        header.validate()?;

        if bytes.len() < header.frame_length {
            return Err(WireError::malformed(format!(
                "incomplete frame: {} of {} bytes",
                bytes.len(),
                header.frame_length
            )));
        }
        let frame = &bytes[..header.frame_length];

        if frame[header.frame_length - 1] != FRAME_END {
            return Err(WireError::malformed("missing end delimiter"));
        }

        let calculated = crc(&frame[..header.frame_length - 2]);
        let expected = frame[header.frame_length - 2];
        if calculated != expected {
            return Err(WireError::ChecksumMismatch {
                calculated,
                expected,
            });
        }

        let frame_type = frame[HEADER_SIZE];
        let payload = &frame[HEADER_SIZE + 1..header.frame_length - 2];
        Ok(Frame {
            recipient: header.recipient,
            sender: header.sender,
            sender_type: header.sender_type,
            econet_version: header.econet_version,
            data: FrameData::decode(frame_type, payload, context)?,
        })
    }
}

/// Parsed frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub frame_length: usize,
    pub recipient: u8,
    pub sender: u8,
    pub sender_type: u8,
    pub econet_version: u8,
}

impl Header {
    /// Parse the fixed-size header; the buffer must start at 0x68
    pub fn parse(bytes: &[u8]) -> Result<Header> {
        if bytes.len() < HEADER_SIZE {
            return Err(WireError::malformed(format!(
                "header needs {HEADER_SIZE} bytes, got {}",
                bytes.len()
            )));
        }
        if bytes[0] != FRAME_START {
            return Err(WireError::malformed(format!(
                "bad start delimiter: {:#04X}",
                bytes[0]
            )));
        }

        Ok(Header {
            frame_length: usize::from(u16::from_le_bytes([bytes[1], bytes[2]])),
            recipient: bytes[3],
            sender: bytes[4],
            sender_type: bytes[5],
            econet_version: bytes[6],
        })
    }

    /// Reject frames this codec cannot speak
    pub fn validate(&self) -> Result<()> {
        if self.sender_type != ECONET_TYPE {
            return Err(WireError::unsupported(format!(
                "sender type {:#04X}, expected {ECONET_TYPE:#04X}",
                self.sender_type
            )));
        }
        if self.econet_version != ECONET_VERSION {
            return Err(WireError::unsupported(format!(
                "protocol version {}, expected {ECONET_VERSION}",
                self.econet_version
            )));
        }
        if self.frame_length < MIN_FRAME_LENGTH || self.frame_length > MAX_FRAME_LENGTH {
            return Err(WireError::malformed(format!(
                "frame length {} outside {MIN_FRAME_LENGTH}..={MAX_FRAME_LENGTH}",
                self.frame_length
            )));
        }
        Ok(())
    }
}

/// XOR fold checksum
pub fn crc(data: &[u8]) -> u8 {
    data.iter().fold(0, |acc, byte| acc ^ byte)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::FrameType;

    fn context() -> DecodeContext {
        DecodeContext::default()
    }

    #[test]
    fn test_program_version_request_bytes() {
        let frame = Frame::from_device(
            DeviceAddress::Ecomax,
            DeviceAddress::Econet,
            FrameData::ProgramVersionRequest,
        );
        let bytes = frame.encode(&context()).unwrap();

        // 7-byte header + type + CRC + end delimiter
        assert_eq!(bytes.len(), 10);
        assert_eq!(bytes[0], 0x68);
        assert_eq!(u16::from_le_bytes([bytes[1], bytes[2]]), 10);
        assert_eq!(bytes[3], 0x56);
        assert_eq!(bytes[4], 0x45);
        assert_eq!(bytes[5], 0x30);
        assert_eq!(bytes[6], 0x05);
        assert_eq!(bytes[7], 0x40);
        assert_eq!(bytes[9], 0x16);
        assert_eq!(bytes[8], crc(&bytes[..8]));
    }

    #[test]
    fn test_roundtrip() {
        let frame = Frame::new(
            DeviceAddress::Ecomax,
            FrameData::SetEcomaxParameter { index: 4, value: 65 },
        );
        let bytes = frame.encode(&context()).unwrap();
        let decoded = Frame::decode(&bytes, &context()).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn test_single_byte_corruption_detected() {
        let frame = Frame::from_device(
            DeviceAddress::Ecomax,
            DeviceAddress::Econet,
            FrameData::ProgramVersionRequest,
        );
        let bytes = frame.encode(&context()).unwrap();

        // Flip a bit in every byte between the delimiters; every mutation
        // must fail decode one way or another.
        for position in 1..bytes.len() - 1 {
            for bit in 0..8 {
                let mut corrupted = bytes.clone();
                corrupted[position] ^= 1 << bit;
                assert!(
                    Frame::decode(&corrupted, &context()).is_err(),
                    "corruption at byte {position} bit {bit} went unnoticed"
                );
            }
        }
    }

    #[test]
    fn test_checksum_error_kind() {
        let frame = Frame::new(DeviceAddress::Ecomax, FrameData::UidRequest);
        let mut bytes = frame.encode(&context()).unwrap();
        // Corrupt the frame type byte; header still validates
        bytes[7] ^= 0x01;
        let err = Frame::decode(&bytes, &context()).unwrap_err();
        assert!(matches!(err, WireError::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_unsupported_protocol() {
        let frame = Frame::new(DeviceAddress::Ecomax, FrameData::UidRequest);
        let mut bytes = frame.encode(&context()).unwrap();
        bytes[6] = 0x04;
        let err = Frame::decode(&bytes, &context()).unwrap_err();
        assert!(matches!(err, WireError::UnsupportedProtocol(_)));

        let mut bytes = frame.encode(&context()).unwrap();
        bytes[5] = 0x31;
        let err = Frame::decode(&bytes, &context()).unwrap_err();
        assert!(matches!(err, WireError::UnsupportedProtocol(_)));
    }

    #[test]
    fn test_length_bounds() {
        let frame = Frame::new(DeviceAddress::Ecomax, FrameData::UidRequest);
        let mut bytes = frame.encode(&context()).unwrap();
        bytes[1] = 0x05;
        bytes[2] = 0x00;
        assert!(Frame::decode(&bytes, &context()).is_err());

        let mut bytes = frame.encode(&context()).unwrap();
        bytes[1] = 0xFF;
        bytes[2] = 0xFF;
        assert!(Frame::decode(&bytes, &context()).is_err());
    }

    #[test]
    fn test_unknown_frame_type_decodes() {
        let frame = Frame::new(
            DeviceAddress::Ecomax,
            FrameData::Unknown {
                frame_type: 0x7B,
                payload: vec![0xAA, 0xBB],
            },
        );
        let bytes = frame.encode(&context()).unwrap();
        let decoded = Frame::decode(&bytes, &context()).unwrap();
        assert!(decoded.data.is_unknown());
    }

    #[test]
    fn test_all_known_frames_roundtrip() {
        use crate::structures::alerts::AlertsRequest;

        let frames = vec![
            FrameData::StopMaster,
            FrameData::StartMaster,
            FrameData::CheckDevice,
            FrameData::UidRequest,
            FrameData::PasswordRequest,
            FrameData::ProgramVersionRequest,
            FrameData::SchedulesRequest,
            FrameData::RegulatorDataSchemaRequest,
            FrameData::AlertsRequest(AlertsRequest::default()),
            FrameData::EcomaxParametersRequest { start: 0, count: 255 },
            FrameData::SetEcomaxParameter { index: 1, value: 2 },
            FrameData::EcomaxControl { value: 1 },
            FrameData::SetEcomaxParameterAck,
            FrameData::SetScheduleAck,
        ];

        for data in frames {
            let expected_type = data.frame_type().map(|ft| FrameType::as_byte(&ft));
            let frame = Frame::new(DeviceAddress::Ecomax, data);
            let bytes = frame.encode(&context()).unwrap();
            let decoded = Frame::decode(&bytes, &context()).unwrap();
            assert_eq!(decoded, frame);
            assert_eq!(Some(decoded.data.frame_type_byte()), expected_type);
        }
    }
}
