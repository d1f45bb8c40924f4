//! AMF3 subset: undefined, booleans, doubles, strings and arrays.
//!
//! Reading keeps the string reference table for the duration of one
//! [`read`] call. Writing always emits literal strings.

use crate::bitstream::{BitStream, BitStreamError};
use crate::value::Value;
use byteorder::{LittleEndian, WriteBytesExt};
use std::io::Write;

const UNDEFINED_MARKER: u8 = 0;
const FALSE_MARKER: u8 = 2;
const TRUE_MARKER: u8 = 3;
const DOUBLE_MARKER: u8 = 5;
const STRING_MARKER: u8 = 6;
const ARRAY_MARKER: u8 = 9;

/// Largest value a U29 can hold.
pub const U29_MAX: u32 = (1 << 29) - 1;

/// Arrays nested deeper than this are rejected.
pub const MAX_DEPTH: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum Amf3Value {
    Undefined,
    Bool(bool),
    Double(f64),
    String(String),
    Array {
        /// Key/value part, in wire order.
        assoc: Vec<(String, Amf3Value)>,
        dense: Vec<Amf3Value>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum Amf3Error {
    #[error(transparent)]
    Stream(#[from] BitStreamError),
    #[error("unsupported marker {0:#04x}")]
    UnknownMarker(u8),
    #[error("string reference {index} out of range ({len} strings seen)")]
    BadStringReference { index: usize, len: usize },
    #[error("array references are not supported")]
    ArrayReference,
    #[error("arrays nested deeper than {0} levels")]
    TooDeep(usize),
    #[error("{0} does not fit in a U29")]
    U29Overflow(usize),
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

/// Read one value from the stream.
pub fn read(stream: &mut BitStream<'_>) -> Result<Amf3Value, Amf3Error> {
    Reader {
        stream,
        strings: Vec::new(),
        depth: 0,
    }
    .value()
}

/// Type handler for definition files: decodes one AMF3 value into a [`Value`].
pub fn decode_value(stream: &mut BitStream<'_>) -> Result<Value, BitStreamError> {
    match read(stream) {
        Ok(v) => Ok(v.into()),
        Err(Amf3Error::Stream(e)) => Err(e),
        Err(e) => Err(BitStreamError::Malformed {
            format: "AMF3",
            message: e.to_string(),
        }),
    }
}

struct Reader<'s, 'a> {
    stream: &'s mut BitStream<'a>,
    strings: Vec<String>,
    depth: usize,
}

impl Reader<'_, '_> {
    fn u29(&mut self) -> Result<u32, Amf3Error> {
        let mut value = 0u32;
        for i in 0..4 {
            let byte = self.stream.read_u8()?;
            if i == 3 {
                return Ok((value << 8) | byte as u32);
            }
            value = (value << 7) | (byte & 0x7f) as u32;
            if byte & 0x80 == 0 {
                break;
            }
        }
        Ok(value)
    }

    fn value(&mut self) -> Result<Amf3Value, Amf3Error> {
        match self.stream.read_u8()? {
            UNDEFINED_MARKER => Ok(Amf3Value::Undefined),
            FALSE_MARKER => Ok(Amf3Value::Bool(false)),
            TRUE_MARKER => Ok(Amf3Value::Bool(true)),
            DOUBLE_MARKER => Ok(Amf3Value::Double(self.stream.read_f64()?)),
            STRING_MARKER => Ok(Amf3Value::String(self.string()?)),
            ARRAY_MARKER => {
                if self.depth >= MAX_DEPTH {
                    return Err(Amf3Error::TooDeep(MAX_DEPTH));
                }
                self.depth += 1;
                let array = self.array();
                self.depth -= 1;
                array
            }
            marker => Err(Amf3Error::UnknownMarker(marker)),
        }
    }

    fn string(&mut self) -> Result<String, Amf3Error> {
        let header = self.u29()?;
        let n = (header >> 1) as usize;
        if header & 1 == 0 {
            return self
                .strings
                .get(n)
                .cloned()
                .ok_or(Amf3Error::BadStringReference {
                    index: n,
                    len: self.strings.len(),
                });
        }
        let raw = self.stream.read_bytes(n)?;
        let s = String::from_utf8(raw)
            .map_err(|e| BitStreamError::InvalidString(e.to_string()))?;
        // the empty string is never added to the reference table
        if !s.is_empty() {
            self.strings.push(s.clone());
        }
        Ok(s)
    }

    fn array(&mut self) -> Result<Amf3Value, Amf3Error> {
        let header = self.u29()?;
        if header & 1 == 0 {
            return Err(Amf3Error::ArrayReference);
        }
        let size = (header >> 1) as usize;
        let mut assoc = Vec::new();
        loop {
            let key = self.string()?;
            if key.is_empty() {
                break;
            }
            let value = self.value()?;
            assoc.push((key, value));
        }
        let mut dense = Vec::with_capacity(size.min(1024));
        for _ in 0..size {
            dense.push(self.value()?);
        }
        Ok(Amf3Value::Array { assoc, dense })
    }
}

/// Serialize `value`. Strings are always written literally.
pub fn write<W: Write>(value: &Amf3Value, out: &mut W) -> Result<(), Amf3Error> {
    match value {
        Amf3Value::Undefined => out.write_u8(UNDEFINED_MARKER)?,
        Amf3Value::Bool(false) => out.write_u8(FALSE_MARKER)?,
        Amf3Value::Bool(true) => out.write_u8(TRUE_MARKER)?,
        Amf3Value::Double(d) => {
            out.write_u8(DOUBLE_MARKER)?;
            out.write_f64::<LittleEndian>(*d)?;
        }
        Amf3Value::String(s) => {
            out.write_u8(STRING_MARKER)?;
            write_str(s, out)?;
        }
        Amf3Value::Array { assoc, dense } => {
            out.write_u8(ARRAY_MARKER)?;
            write_u29(literal_header(dense.len())?, out)?;
            for (key, item) in assoc {
                write_str(key, out)?;
                write(item, out)?;
            }
            write_str("", out)?;
            for item in dense {
                write(item, out)?;
            }
        }
    }
    Ok(())
}

fn literal_header(n: usize) -> Result<u32, Amf3Error> {
    let shifted = n
        .checked_mul(2)
        .and_then(|v| u32::try_from(v | 1).ok())
        .filter(|v| *v <= U29_MAX)
        .ok_or(Amf3Error::U29Overflow(n))?;
    Ok(shifted)
}

fn write_str<W: Write>(s: &str, out: &mut W) -> Result<(), Amf3Error> {
    write_u29(literal_header(s.len())?, out)?;
    out.write_all(s.as_bytes())?;
    Ok(())
}

fn write_u29<W: Write>(value: u32, out: &mut W) -> Result<(), Amf3Error> {
    match value {
        0..=0x7f => out.write_u8(value as u8)?,
        0x80..=0x3fff => {
            out.write_u8((value >> 7) as u8 | 0x80)?;
            out.write_u8((value & 0x7f) as u8)?;
        }
        0x4000..=0x1f_ffff => {
            out.write_u8((value >> 14) as u8 | 0x80)?;
            out.write_u8(((value >> 7) & 0x7f) as u8 | 0x80)?;
            out.write_u8((value & 0x7f) as u8)?;
        }
        0x20_0000..=U29_MAX => {
            out.write_u8((value >> 22) as u8 | 0x80)?;
            out.write_u8(((value >> 15) & 0x7f) as u8 | 0x80)?;
            out.write_u8(((value >> 8) & 0x7f) as u8 | 0x80)?;
            out.write_u8((value & 0xff) as u8)?;
        }
        _ => return Err(Amf3Error::U29Overflow(value as usize)),
    }
    Ok(())
}

impl From<Amf3Value> for Value {
    /// Arrays with only a dense part become lists; anything else becomes a
    /// map, with dense items keyed by their index.
    fn from(v: Amf3Value) -> Self {
        match v {
            Amf3Value::Undefined => Value::Null,
            Amf3Value::Bool(b) => Value::Bool(b),
            Amf3Value::Double(d) => Value::Double(d),
            Amf3Value::String(s) => Value::Str(s),
            Amf3Value::Array { assoc, dense } if assoc.is_empty() && !dense.is_empty() => {
                Value::List(dense.into_iter().map(Value::from).collect())
            }
            Amf3Value::Array { assoc, dense } => {
                let mut entries: Vec<(String, Value)> =
                    assoc.into_iter().map(|(k, v)| (k, v.into())).collect();
                entries.extend(
                    dense
                        .into_iter()
                        .enumerate()
                        .map(|(i, v)| (i.to_string(), v.into())),
                );
                Value::Map(entries)
            }
        }
    }
}
