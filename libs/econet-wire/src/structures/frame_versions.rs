//! Frame versions structure
//!
//! The controller bumps a per-frame-type counter whenever the underlying
//! data changes and embeds the current table in every broadcast message.
//! Watching the table is how a client knows which frames to re-request.

use crate::cursor::{Cursor, PayloadWriter};
use crate::error::Result;

/// One (frame type, version) entry
pub type FrameVersion = (u16, u16);

/// Decode: u8 count, then count x { u16 type, u16 version }
pub fn decode(cursor: &mut Cursor<'_>) -> Result<Vec<FrameVersion>> {
    let count = usize::from(cursor.read_u8()?);
    let mut versions = Vec::with_capacity(count);
    for _ in 0..count {
        let frame_type = cursor.read_u16()?;
        let version = cursor.read_u16()?;
        versions.push((frame_type, version));
    }
    Ok(versions)
}

pub fn encode(writer: &mut PayloadWriter, versions: &[FrameVersion]) {
    writer.put_u8(versions.len() as u8);
    for (frame_type, version) in versions {
        writer.put_u16(*frame_type);
        writer.put_u16(*version);
    }
}
