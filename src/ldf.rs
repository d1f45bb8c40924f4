//! LDF typed key/value lists (read only).

use crate::bitstream::{decode_string, BitStream, BitStreamError, CharWidth, LengthPrefix};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub struct LdfEntry {
    pub key: String,
    pub type_id: u8,
    pub value: Value,
}

#[derive(Debug, thiserror::Error)]
pub enum LdfError {
    #[error(transparent)]
    Stream(#[from] BitStreamError),
    #[error("key `{key}` has unknown type id {type_id}")]
    UnknownType { key: String, type_id: u8 },
}

/// Read a count-prefixed list of entries.
pub fn read(stream: &mut BitStream<'_>) -> Result<Vec<LdfEntry>, LdfError> {
    let count = stream.read_u32()?;
    let mut entries = Vec::with_capacity((count as usize).min(256));
    for _ in 0..count {
        let key_len = stream.read_u8()? as usize;
        let key = decode_string(&stream.read_bytes(key_len)?, CharWidth::Wide)?;
        let type_id = stream.read_u8()?;
        let value = match type_id {
            0 => Value::Str(stream.read_string(CharWidth::Wide, LengthPrefix::U32)?),
            1 => Value::I32(stream.read_i32()?),
            3 => Value::Float(stream.read_f32()?),
            5 => Value::U32(stream.read_u32()?),
            7 => Value::Bool(stream.read_u8()? != 0),
            8 | 9 => Value::I64(stream.read_i64()?),
            13 => {
                let len = stream.read_u32()? as usize;
                Value::Bytes(stream.read_bytes(len)?)
            }
            _ => return Err(LdfError::UnknownType { key, type_id }),
        };
        entries.push(LdfEntry {
            key,
            type_id,
            value,
        });
    }
    Ok(entries)
}

/// Type handler for definition files: the entries as a [`Value::Map`].
pub fn decode_value(stream: &mut BitStream<'_>) -> Result<Value, BitStreamError> {
    match read(stream) {
        Ok(entries) => Ok(Value::Map(
            entries.into_iter().map(|e| (e.key, e.value)).collect(),
        )),
        Err(LdfError::Stream(e)) => Err(e),
        Err(e) => Err(BitStreamError::Malformed {
            format: "LDF",
            message: e.to_string(),
        }),
    }
}
