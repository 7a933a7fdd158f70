//! Regulator data structures
//!
//! The regulator data broadcast is schema-driven: a separate response
//! lists (key, type-tag) pairs in payload order, and the message decoder
//! walks that schema. Keys are manufacturer-specific and passed through
//! opaquely.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::bits::BitReader;
use crate::cursor::{Cursor, PayloadWriter};
use crate::datatypes::DataType;
use crate::error::Result;
use crate::structures::frame_versions::{self, FrameVersion};
use crate::value::Value;

/// Regulator data layout version this codec understands
pub const REGDATA_VERSION: (u8, u8) = (1, 0);

/// Payload of the regulator data schema response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RegulatorDataSchema {
    /// (key, type) pairs in payload order
    pub entries: Vec<(u16, DataType)>,
}

pub fn decode_schema(cursor: &mut Cursor<'_>) -> Result<RegulatorDataSchema> {
    let count = usize::from(cursor.read_u16()?);
    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let data_type = DataType::from_tag(cursor.read_u8()?)?;
        let key = cursor.read_u16()?;
        entries.push((key, data_type));
    }
    Ok(RegulatorDataSchema { entries })
}

pub fn encode_schema(writer: &mut PayloadWriter, schema: &RegulatorDataSchema) {
    writer.put_u16(schema.entries.len() as u16);
    for (key, data_type) in &schema.entries {
        writer.put_u8(data_type.tag());
        writer.put_u16(*key);
    }
}

/// Payload of the regulator data broadcast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RegulatorData {
    pub frame_versions: Vec<FrameVersion>,
    /// Schema-keyed values; empty when no schema was available
    pub values: BTreeMap<u16, Value>,
}

/// Decode a regulator data payload.
///
/// Without a schema only the embedded frame versions are recovered; the
/// value block cannot be interpreted and is left behind as trailing bytes.
pub fn decode(cursor: &mut Cursor<'_>, schema: Option<&RegulatorDataSchema>) -> Result<RegulatorData> {
    cursor.skip(2)?;
    let minor = cursor.read_u8()?;
    let major = cursor.read_u8()?;
    if (major, minor) != REGDATA_VERSION {
        tracing::debug!("skipping regulator data with layout version {major}.{minor}");
        return Ok(RegulatorData::default());
    }

    let frame_versions = frame_versions::decode(cursor)?;

    let mut values = BTreeMap::new();
    if let Some(schema) = schema {
        let mut bits = BitReader::new();
        for (key, data_type) in &schema.entries {
            values.insert(*key, data_type.read(cursor, &mut bits)?);
        }
    }

    Ok(RegulatorData {
        frame_versions,
        values,
    })
}

/// Encode a regulator data payload against its schema
pub fn encode(writer: &mut PayloadWriter, data: &RegulatorData, schema: Option<&RegulatorDataSchema>) {
    writer.put_u16(0);
    writer.put_u8(REGDATA_VERSION.1);
    writer.put_u8(REGDATA_VERSION.0);
    frame_versions::encode(writer, &data.frame_versions);

    let Some(schema) = schema else { return };
    let mut bits = crate::bits::BitWriter::new();
    let mut mid_bits = false;
    for (key, data_type) in &schema.entries {
        if *data_type != DataType::Bit && mid_bits {
            bits.align(writer);
            mid_bits = false;
        }
        let value = data.values.get(key).cloned().unwrap_or(Value::Null);
        match data_type {
            DataType::Undefined => {},
            DataType::Bit => {
                bits.write_bit(writer, value.as_bool().unwrap_or(false));
                mid_bits = true;
            },
            DataType::SignedChar => writer.put_i8(value.as_i64().unwrap_or(0) as i8),
            DataType::Short => writer.put_i16(value.as_i64().unwrap_or(0) as i16),
            DataType::Int => writer.put_i32(value.as_i64().unwrap_or(0) as i32),
            DataType::UnsignedChar => writer.put_u8(value.as_i64().unwrap_or(0) as u8),
            DataType::UnsignedShort => writer.put_u16(value.as_i64().unwrap_or(0) as u16),
            DataType::UnsignedInt => writer.put_u32(value.as_i64().unwrap_or(0) as u32),
            DataType::Float => writer.put_f32(value.as_f64().unwrap_or(0.0) as f32),
            DataType::Double => writer.put_f64(value.as_f64().unwrap_or(0.0)),
            DataType::Int64 => writer.put_u64(value.as_i64().unwrap_or(0) as u64),
            DataType::UInt64 => writer.put_u64(value.as_i64().unwrap_or(0) as u64),
            DataType::String => {
                writer.put_bytes(value.as_string().as_bytes());
                writer.put_u8(0);
            },
            DataType::IPv4 => {
                let address: std::net::Ipv4Addr =
                    value.as_string().parse().unwrap_or(std::net::Ipv4Addr::UNSPECIFIED);
                writer.put_ipv4(address);
            },
            DataType::IPv6 => {
                let address: std::net::Ipv6Addr =
                    value.as_string().parse().unwrap_or(std::net::Ipv6Addr::UNSPECIFIED);
                writer.put_bytes(&address.octets());
            },
        }
    }
    if mid_bits {
        bits.align(writer);
    }
}
