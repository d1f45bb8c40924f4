//! Bit-addressable read cursor over a byte slice.
//!
//! Bits are numbered MSB first within a byte: bit offset 0 is the high bit of
//! byte 0. Multi-byte values are little-endian and may start at any bit
//! offset; unaligned reads shift neighbouring bytes together before decoding.

use byteorder::{ByteOrder, LittleEndian};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BitStreamError {
    #[error("end of data at bit {position}: need {needed} bit(s), {available} available")]
    EndOfData {
        position: usize,
        needed: usize,
        available: usize,
    },
    #[error("seek to bit {offset} out of range (stream is {length} bits)")]
    SeekOutOfRange { offset: usize, length: usize },
    #[error("invalid string data: {0}")]
    InvalidString(String),
    /// Raised by type handlers that decode a nested format.
    #[error("malformed {format} data: {message}")]
    Malformed {
        format: &'static str,
        message: String,
    },
}

/// Character encoding of a length-prefixed string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharWidth {
    /// One byte per character (UTF-8, Latin-1 fallback).
    Narrow,
    /// Two bytes per character (UTF-16LE).
    Wide,
}

impl CharWidth {
    pub fn bytes(self) -> usize {
        match self {
            CharWidth::Narrow => 1,
            CharWidth::Wide => 2,
        }
    }
}

/// Width of the character-count prefix in front of a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPrefix {
    U8,
    U16,
    U32,
}

/// Read cursor over `data`. Cloning is cheap and snapshots the position.
#[derive(Debug, Clone)]
pub struct BitStream<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BitStream<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        BitStream { data, pos: 0 }
    }

    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Current cursor, in bits from the start of the data.
    pub fn bit_position(&self) -> usize {
        self.pos
    }

    pub fn bit_len(&self) -> usize {
        self.data.len() * 8
    }

    pub fn bits_remaining(&self) -> usize {
        self.bit_len().saturating_sub(self.pos)
    }

    /// True when the cursor sits in the last byte of the data (or at its end):
    /// the rounded-up byte position equals the data length.
    pub fn is_fully_consumed(&self) -> bool {
        (self.pos + 7) / 8 == self.data.len()
    }

    /// Move the cursor to an absolute bit offset. Seeking to the very end is allowed.
    pub fn seek(&mut self, bit_offset: usize) -> Result<(), BitStreamError> {
        if bit_offset > self.bit_len() {
            return Err(BitStreamError::SeekOutOfRange {
                offset: bit_offset,
                length: self.bit_len(),
            });
        }
        self.pos = bit_offset;
        Ok(())
    }

    fn ensure(&self, bits: usize) -> Result<(), BitStreamError> {
        if bits > self.bits_remaining() {
            return Err(BitStreamError::EndOfData {
                position: self.pos,
                needed: bits,
                available: self.bits_remaining(),
            });
        }
        Ok(())
    }

    pub fn read_bit(&mut self) -> Result<bool, BitStreamError> {
        self.ensure(1)?;
        let byte = self.data[self.pos / 8];
        let bit = (byte >> (7 - self.pos % 8)) & 1;
        self.pos += 1;
        Ok(bit != 0)
    }

    /// Read `n` bits (at most 64), first bit read ends up most significant.
    pub fn read_bits(&mut self, n: u32) -> Result<u64, BitStreamError> {
        debug_assert!(n <= 64);
        self.ensure(n as usize)?;
        let mut out = 0u64;
        for _ in 0..n {
            out = (out << 1) | self.read_bit()? as u64;
        }
        Ok(out)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> Result<(), BitStreamError> {
        self.ensure(buf.len().saturating_mul(8))?;
        let start = self.pos / 8;
        let shift = (self.pos % 8) as u32;
        if shift == 0 {
            buf.copy_from_slice(&self.data[start..start + buf.len()]);
        } else {
            // ensure() guarantees the byte after the last full one exists
            for (i, b) in buf.iter_mut().enumerate() {
                let hi = self.data[start + i] << shift;
                let lo = self.data[start + i + 1] >> (8 - shift);
                *b = hi | lo;
            }
        }
        self.pos += buf.len() * 8;
        Ok(())
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, BitStreamError> {
        // checked before allocating: `n` often comes straight from the data
        self.ensure(n.saturating_mul(8))?;
        let mut buf = vec![0u8; n];
        self.read_into(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8, BitStreamError> {
        let mut b = [0u8; 1];
        self.read_into(&mut b)?;
        Ok(b[0])
    }
    pub fn read_i8(&mut self) -> Result<i8, BitStreamError> {
        Ok(self.read_u8()? as i8)
    }
    pub fn read_u16(&mut self) -> Result<u16, BitStreamError> {
        let mut b = [0u8; 2];
        self.read_into(&mut b)?;
        Ok(LittleEndian::read_u16(&b))
    }
    pub fn read_i16(&mut self) -> Result<i16, BitStreamError> {
        let mut b = [0u8; 2];
        self.read_into(&mut b)?;
        Ok(LittleEndian::read_i16(&b))
    }
    pub fn read_u32(&mut self) -> Result<u32, BitStreamError> {
        let mut b = [0u8; 4];
        self.read_into(&mut b)?;
        Ok(LittleEndian::read_u32(&b))
    }
    pub fn read_i32(&mut self) -> Result<i32, BitStreamError> {
        let mut b = [0u8; 4];
        self.read_into(&mut b)?;
        Ok(LittleEndian::read_i32(&b))
    }
    pub fn read_u64(&mut self) -> Result<u64, BitStreamError> {
        let mut b = [0u8; 8];
        self.read_into(&mut b)?;
        Ok(LittleEndian::read_u64(&b))
    }
    pub fn read_i64(&mut self) -> Result<i64, BitStreamError> {
        let mut b = [0u8; 8];
        self.read_into(&mut b)?;
        Ok(LittleEndian::read_i64(&b))
    }
    pub fn read_f32(&mut self) -> Result<f32, BitStreamError> {
        let mut b = [0u8; 4];
        self.read_into(&mut b)?;
        Ok(LittleEndian::read_f32(&b))
    }
    pub fn read_f64(&mut self) -> Result<f64, BitStreamError> {
        let mut b = [0u8; 8];
        self.read_into(&mut b)?;
        Ok(LittleEndian::read_f64(&b))
    }

    /// Read a length-prefixed string. The prefix counts characters, not bytes.
    pub fn read_string(
        &mut self,
        width: CharWidth,
        prefix: LengthPrefix,
    ) -> Result<String, BitStreamError> {
        let len = match prefix {
            LengthPrefix::U8 => self.read_u8()? as usize,
            LengthPrefix::U16 => self.read_u16()? as usize,
            LengthPrefix::U32 => self.read_u32()? as usize,
        };
        let raw = self.read_bytes(len.saturating_mul(width.bytes()))?;
        decode_string(&raw, width)
    }
}

pub(crate) fn decode_string(raw: &[u8], width: CharWidth) -> Result<String, BitStreamError> {
    match width {
        CharWidth::Narrow => match std::str::from_utf8(raw) {
            Ok(s) => Ok(s.to_string()),
            Err(_) => Ok(raw.iter().map(|&b| b as char).collect()),
        },
        CharWidth::Wide => {
            if raw.len() % 2 != 0 {
                return Err(BitStreamError::InvalidString(format!(
                    "odd byte length {} for UTF-16 data",
                    raw.len()
                )));
            }
            let mut units = vec![0u16; raw.len() / 2];
            LittleEndian::read_u16_into(raw, &mut units);
            String::from_utf16(&units).map_err(|e| BitStreamError::InvalidString(e.to_string()))
        }
    }
}
