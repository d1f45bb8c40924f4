//! Interpreter fuzz target: a fixed definition set run over arbitrary bytes,
//! including the AMF3 and LDF handlers. Records may fail; nothing may panic.
//! Build with: cargo fuzz run interpret_fuzz (requires nightly and cargo fuzz).

#![cfg_attr(fuzzing, no_main)]

#[cfg(fuzzing)]
use libfuzzer_sys::fuzz_target;

#[cfg(fuzzing)]
const DEFS: &str = "\
kind=[u8] - kind
n=[u8] - count, expect < 16
\t[u16] - item
if kind == 1:
\t[amf3] - amf3 value
if kind == 2:
\t[ldf] - ldf block
while kind > 3:
\tkind=[u8] - next kind
\tif kind == 0:
\t\tbreak
\t[A:0x1BIT3,L:BIT1] - flag
\t[u8_wstr] - name
";

#[cfg(fuzzing)]
fuzz_target!(|data: &[u8]| {
    use structdsl::{amf3, ldf, StructParser, TypeRegistry};
    let registry = TypeRegistry::builtin()
        .with("amf3", amf3::decode_value)
        .with("ldf", ldf::decode_value);
    let parser = match StructParser::with_types(DEFS, &registry) {
        Ok(p) => p,
        Err(_) => return,
    };
    for record in parser.parse(data).take(4096) {
        if record.is_err() {
            break;
        }
    }
});

#[cfg(not(fuzzing))]
fn main() {
    eprintln!("Build with: cargo fuzz run interpret_fuzz");
}
