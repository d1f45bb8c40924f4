//! # structdsl - binary structure description interpreter
//!
//! Describe the layout of a binary record in a small tab-indented language,
//! compile it once, then run it lazily against any number of byte buffers.
//! Each run yields one [`Structure`] record per decoded field.
//!
//! ## Definition lines
//!
//! - `[name=][A:0x<hex>[BIT<n>],]<type> - description[, expect <checks>][, assert <checks>]`
//! - `[name=][A:...,]L:<bytes>[BIT<n>] - description` (type derived from the length)
//! - `if <condition>:` / `while <condition>:` / `break`
//!
//! A field with nested lines repeats them as many times as its value says
//! (`true` means once, `false` or `0` means never). Checks starting with a
//! comparison operator apply to the field's own value: `expect > 0` means
//! `expect value > 0`. Lines matching none of these shapes are ignored.
//!
//! ## Example
//!
//! ```text
//! count=[u8] - count, assert > 0
//! 	[u8] - item, expect in (0x10, 0x20)
//! flags=[u16] - flags
//! if flags & 1:
//! 	[u8_wstr] - name
//! ```
//!
//! ```no_run
//! use structdsl::StructParser;
//!
//! let parser = StructParser::new("count=[u8] - count\n\t[u8] - item\n")?;
//! for record in parser.parse(&[2, 0x10, 0x20]) {
//!     let record = record?;
//!     println!("{}{}: {}", "\t".repeat(record.depth), record.description, record.value);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod amf3;
pub mod ast;
pub mod bitstream;
pub mod dump;
pub mod error;
pub mod expr;
pub mod interp;
pub mod ldf;
pub mod lint;
pub mod parser;
pub mod tree;
pub mod types;
pub mod value;

pub use bitstream::{BitStream, BitStreamError, CharWidth, LengthPrefix};
pub use error::{CompileError, ParseError};
pub use expr::EvalError;
pub use interp::{ParseSummary, Records, StructParser, Structure};
pub use parser::compile;
pub use types::{TypeHandler, TypeRegistry};
pub use value::{Value, Variables};
