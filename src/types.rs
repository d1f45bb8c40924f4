//! Type handler registry: type name → decoding function.
//!
//! The registry only dispatches; every handler delegates the actual decoding
//! to [`BitStream`]. Callers add domain types (fixed-point numbers, embedded
//! codecs, ...) with [`TypeRegistry::register`]; registering an existing name
//! replaces the built-in.

use crate::bitstream::{BitStream, BitStreamError, CharWidth, LengthPrefix};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Decodes one value from the stream.
pub type TypeHandler =
    Arc<dyn Fn(&mut BitStream<'_>) -> Result<Value, BitStreamError> + Send + Sync>;

#[derive(Clone)]
pub struct TypeRegistry {
    handlers: HashMap<String, TypeHandler>,
}

impl TypeRegistry {
    /// Registry with no types at all.
    pub fn empty() -> Self {
        TypeRegistry {
            handlers: HashMap::new(),
        }
    }

    /// Registry with the built-in scalar and string types.
    pub fn builtin() -> Self {
        let mut r = TypeRegistry::empty();
        r.register("bit", |s| s.read_bit().map(Value::Bool));
        r.register("float", |s| s.read_f32().map(Value::Float));
        r.register("double", |s| s.read_f64().map(Value::Double));
        r.register("s8", |s| s.read_i8().map(Value::I8));
        r.register("u8", |s| s.read_u8().map(Value::U8));
        r.register("s16", |s| s.read_i16().map(Value::I16));
        r.register("u16", |s| s.read_u16().map(Value::U16));
        r.register("s32", |s| s.read_i32().map(Value::I32));
        r.register("u32", |s| s.read_u32().map(Value::U32));
        r.register("s64", |s| s.read_i64().map(Value::I64));
        r.register("u64", |s| s.read_u64().map(Value::U64));
        for (name, width, prefix) in [
            ("u8_str", CharWidth::Narrow, LengthPrefix::U8),
            ("u16_str", CharWidth::Narrow, LengthPrefix::U16),
            ("u8_wstr", CharWidth::Wide, LengthPrefix::U8),
            ("u16_wstr", CharWidth::Wide, LengthPrefix::U16),
        ] {
            r.register(name, move |s| s.read_string(width, prefix).map(Value::Str));
        }
        r
    }

    /// Add or replace a handler.
    pub fn register<F>(&mut self, name: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&mut BitStream<'_>) -> Result<Value, BitStreamError> + Send + Sync + 'static,
    {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    /// Builder form of [`TypeRegistry::register`].
    pub fn with<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut BitStream<'_>) -> Result<Value, BitStreamError> + Send + Sync + 'static,
    {
        self.register(name, handler);
        self
    }

    pub fn get(&self, name: &str) -> Option<&TypeHandler> {
        self.handlers.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        TypeRegistry::builtin()
    }
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("types", &self.names())
            .finish()
    }
}
