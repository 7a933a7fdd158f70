//! Regulator data type tags
//!
//! The regulator-data schema lists (key, type-tag) pairs; the message
//! decoder walks the schema and dispatches on the tag. Tag values match
//! the controller firmware's table and must not be reordered.

use serde::{Deserialize, Serialize};

use crate::bits::BitReader;
use crate::cursor::Cursor;
use crate::error::{Result, WireError};
use crate::value::Value;

/// Data types that can appear in a regulator data schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Undefined,
    SignedChar,
    Short,
    Int,
    UnsignedChar,
    UnsignedShort,
    UnsignedInt,
    Float,
    Double,
    /// Single bit packed LSB-first with neighbouring bits
    Bit,
    String,
    Int64,
    UInt64,
    IPv4,
    IPv6,
}

impl DataType {
    /// Decode a schema type tag
    pub fn from_tag(tag: u8) -> Result<Self> {
        Ok(match tag {
            0 | 8 => DataType::Undefined,
            1 => DataType::SignedChar,
            2 => DataType::Short,
            3 => DataType::Int,
            4 => DataType::UnsignedChar,
            5 => DataType::UnsignedShort,
            6 => DataType::UnsignedInt,
            7 => DataType::Float,
            9 => DataType::Double,
            10 => DataType::Bit,
            11 | 12 => DataType::String,
            13 => DataType::Int64,
            14 => DataType::UInt64,
            15 => DataType::IPv4,
            16 => DataType::IPv6,
            other => {
                return Err(WireError::malformed(format!(
                    "unknown regulator data type tag: {other}"
                )))
            },
        })
    }

    /// Tag used on the wire
    pub fn tag(&self) -> u8 {
        match self {
            DataType::Undefined => 0,
            DataType::SignedChar => 1,
            DataType::Short => 2,
            DataType::Int => 3,
            DataType::UnsignedChar => 4,
            DataType::UnsignedShort => 5,
            DataType::UnsignedInt => 6,
            DataType::Float => 7,
            DataType::Double => 9,
            DataType::Bit => 10,
            DataType::String => 11,
            DataType::Int64 => 13,
            DataType::UInt64 => 14,
            DataType::IPv4 => 15,
            DataType::IPv6 => 16,
        }
    }

    /// Read one value of this type.
    ///
    /// Bit values share bytes with their neighbours; the caller owns the
    /// bit reader and realigns it when a non-bit type follows.
    pub fn read(&self, cursor: &mut Cursor<'_>, bits: &mut BitReader) -> Result<Value> {
        if *self != DataType::Bit && bits.mid_byte() {
            // A bit run just ended; its byte has already been consumed.
            bits.align();
        }

        Ok(match self {
            DataType::Undefined => Value::Null,
            DataType::SignedChar => Value::from(i64::from(cursor.read_i8()?)),
            DataType::Short => Value::from(i64::from(cursor.read_i16()?)),
            DataType::Int => Value::from(i64::from(cursor.read_i32()?)),
            DataType::UnsignedChar => Value::from(cursor.read_u8()?),
            DataType::UnsignedShort => Value::from(cursor.read_u16()?),
            DataType::UnsignedInt => Value::from(cursor.read_u32()?),
            DataType::Float => Value::from(cursor.read_f32()?),
            DataType::Double => Value::from(cursor.read_f64()?),
            DataType::Bit => Value::from(bits.read_bit(cursor)?),
            DataType::String => Value::from(cursor.read_cstring()?),
            DataType::Int64 => Value::from(cursor.read_i64()?),
            DataType::UInt64 => Value::from(cursor.read_u64()? as i64),
            DataType::IPv4 => Value::from(cursor.read_ipv4()?.to_string()),
            DataType::IPv6 => Value::from(cursor.read_ipv6()?.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for tag in [1u8, 2, 3, 4, 5, 6, 7, 9, 10, 13, 14, 15, 16] {
            let data_type = DataType::from_tag(tag).unwrap();
            assert_eq!(data_type.tag(), tag);
        }
    }

    #[test]
    fn test_unknown_tag_fails() {
        assert!(DataType::from_tag(42).is_err());
    }

    #[test]
    fn test_read_scalars() {
        let data = [0xFE, 0x34, 0x12, 0x2A];
        let mut cursor = Cursor::new(&data);
        let mut bits = BitReader::new();

        assert_eq!(
            DataType::SignedChar.read(&mut cursor, &mut bits).unwrap(),
            Value::Int(-2)
        );
        assert_eq!(
            DataType::UnsignedShort.read(&mut cursor, &mut bits).unwrap(),
            Value::Int(0x1234)
        );
        assert_eq!(
            DataType::UnsignedChar.read(&mut cursor, &mut bits).unwrap(),
            Value::Int(0x2A)
        );
    }

    #[test]
    fn test_bit_run_then_scalar_realigns() {
        // Byte 0: bits 1,0,1... ; byte 1: the scalar 0x7B
        let data = [0b0000_0101, 0x7B];
        let mut cursor = Cursor::new(&data);
        let mut bits = BitReader::new();

        assert_eq!(
            DataType::Bit.read(&mut cursor, &mut bits).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            DataType::Bit.read(&mut cursor, &mut bits).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            DataType::Bit.read(&mut cursor, &mut bits).unwrap(),
            Value::Bool(true)
        );
        // Next scalar skips the rest of the bit byte
        assert_eq!(
            DataType::UnsignedChar.read(&mut cursor, &mut bits).unwrap(),
            Value::Int(0x7B)
        );
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_read_string() {
        let data = [b'o', b'k', 0x00];
        let mut cursor = Cursor::new(&data);
        let mut bits = BitReader::new();
        assert_eq!(
            DataType::String.read(&mut cursor, &mut bits).unwrap(),
            Value::from("ok")
        );
    }
}
