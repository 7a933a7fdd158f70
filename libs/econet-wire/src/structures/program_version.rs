//! Program version structure
//!
//! 15-byte payload exchanged during the handshake. The client answers the
//! controller's ProgramVersion request with its own software version.

use serde::{Deserialize, Serialize};

use crate::cursor::{Cursor, PayloadWriter};
use crate::error::Result;

pub const VERSION_INFO_SIZE: usize = 15;

/// Version info carried by the program version frames
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub struct_tag: [u8; 2],
    pub struct_version: u8,
    pub device_id: [u8; 2],
    pub processor_signature: [u8; 3],
    /// Software version as (major, minor, patch)
    pub software: (u16, u16, u16),
    /// Address of the peer the frame was sent to
    pub address: u8,
}

impl Default for VersionInfo {
    fn default() -> Self {
        Self {
            struct_tag: [0xFF, 0xFF],
            struct_version: 5,
            device_id: [0x7A, 0x00],
            processor_signature: [0x00, 0x00, 0x00],
            software: crate_version(),
            address: 0,
        }
    }
}

impl VersionInfo {
    pub fn software_string(&self) -> String {
        let (major, minor, patch) = self.software;
        format!("{major}.{minor}.{patch}")
    }
}

/// This crate's version as the software triple reported to controllers
pub fn crate_version() -> (u16, u16, u16) {
    let mut parts = env!("CARGO_PKG_VERSION")
        .split('.')
        .map(|part| part.parse().unwrap_or(0));
    (
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
        parts.next().unwrap_or(0),
    )
}

pub fn decode(cursor: &mut Cursor<'_>) -> Result<VersionInfo> {
    let mut struct_tag = [0u8; 2];
    struct_tag.copy_from_slice(cursor.read_bytes(2)?);
    let struct_version = cursor.read_u8()?;
    let mut device_id = [0u8; 2];
    device_id.copy_from_slice(cursor.read_bytes(2)?);
    let mut processor_signature = [0u8; 3];
    processor_signature.copy_from_slice(cursor.read_bytes(3)?);
    let software = cursor.read_version_triple()?;
    let address = cursor.read_u8()?;

    Ok(VersionInfo {
        struct_tag,
        struct_version,
        device_id,
        processor_signature,
        software,
        address,
    })
}

pub fn encode(writer: &mut PayloadWriter, info: &VersionInfo) {
    writer.put_bytes(&info.struct_tag);
    writer.put_u8(info.struct_version);
    writer.put_bytes(&info.device_id);
    writer.put_bytes(&info.processor_signature);
    writer.put_version_triple(info.software);
    writer.put_u8(info.address);
}
