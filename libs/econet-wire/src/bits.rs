//! Packed boolean streams
//!
//! Consecutive boolean flags on the wire pack LSB-first into bytes. The
//! reader keeps its own bit cursor on top of a [`Cursor`] and realigns on
//! byte boundaries when a structure ends mid-byte.

use crate::cursor::{Cursor, PayloadWriter};
use crate::error::Result;

/// LSB-first bit reader over a byte cursor
#[derive(Debug)]
pub struct BitReader {
    current: u8,
    index: u8,
}

impl BitReader {
    pub fn new() -> Self {
        Self { current: 0, index: 8 }
    }

    /// Read the next flag, pulling a fresh byte from the cursor as needed
    pub fn read_bit(&mut self, cursor: &mut Cursor<'_>) -> Result<bool> {
        if self.index >= 8 {
            self.current = cursor.read_u8()?;
            self.index = 0;
        }
        let bit = self.current & (1 << self.index) != 0;
        self.index += 1;
        Ok(bit)
    }

    /// Forget any partially consumed byte; the next bit starts a new one
    pub fn align(&mut self) {
        self.index = 8;
    }

    /// True when the reader sits inside a partially consumed byte
    pub fn mid_byte(&self) -> bool {
        self.index > 0 && self.index < 8
    }
}

impl Default for BitReader {
    fn default() -> Self {
        Self::new()
    }
}

/// LSB-first bit writer, the counterpart of [`BitReader`]
#[derive(Debug, Default)]
pub struct BitWriter {
    current: u8,
    index: u8,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_bit(&mut self, writer: &mut PayloadWriter, bit: bool) {
        if bit {
            self.current |= 1 << self.index;
        }
        self.index += 1;
        if self.index == 8 {
            writer.put_u8(self.current);
            self.flush_state();
        }
    }

    /// Emit any partially filled byte
    pub fn align(&mut self, writer: &mut PayloadWriter) {
        if self.index > 0 {
            writer.put_u8(self.current);
            self.flush_state();
        }
    }

    fn flush_state(&mut self) {
        self.current = 0;
        self.index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_lsb_first() {
        // 0b0000_0101: bit 0 and bit 2 set
        let data = [0x05];
        let mut cursor = Cursor::new(&data);
        let mut bits = BitReader::new();

        assert!(bits.read_bit(&mut cursor).unwrap());
        assert!(!bits.read_bit(&mut cursor).unwrap());
        assert!(bits.read_bit(&mut cursor).unwrap());
        for _ in 3..8 {
            assert!(!bits.read_bit(&mut cursor).unwrap());
        }
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_bits_cross_byte_boundary() {
        let data = [0xFF, 0x01];
        let mut cursor = Cursor::new(&data);
        let mut bits = BitReader::new();

        for _ in 0..8 {
            assert!(bits.read_bit(&mut cursor).unwrap());
        }
        assert!(bits.read_bit(&mut cursor).unwrap());
        assert!(!bits.read_bit(&mut cursor).unwrap());
    }

    #[test]
    fn test_align_starts_new_byte() {
        let data = [0x01, 0x01];
        let mut cursor = Cursor::new(&data);
        let mut bits = BitReader::new();

        assert!(bits.read_bit(&mut cursor).unwrap());
        assert!(bits.mid_byte());
        bits.align();
        assert!(!bits.mid_byte());
        // Next read pulls the second byte
        assert!(bits.read_bit(&mut cursor).unwrap());
        assert!(cursor.is_empty());
    }

    #[test]
    fn test_writer_roundtrip() {
        let pattern = [true, false, true, true, false, false, false, true, true, false];
        let mut writer = PayloadWriter::new();
        let mut bits = BitWriter::new();
        for bit in pattern {
            bits.write_bit(&mut writer, bit);
        }
        bits.align(&mut writer);

        let bytes = writer.into_bytes();
        assert_eq!(bytes.len(), 2);

        let mut cursor = Cursor::new(&bytes);
        let mut reader = BitReader::new();
        for expected in pattern {
            assert_eq!(reader.read_bit(&mut cursor).unwrap(), expected);
        }
    }

    #[test]
    fn test_reader_empty_fails() {
        let mut cursor = Cursor::new(&[]);
        let mut bits = BitReader::new();
        assert!(bits.read_bit(&mut cursor).is_err());
    }
}
