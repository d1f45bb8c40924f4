//! Parse a binary file with a definition file and print every record.
//!
//! Usage:
//!   parse_struct [OPTIONS] <BINARY> <DEFINITIONS>
//!
//! Options:
//!   --strict            Fail if the binary is not fully consumed.
//!   --set NAME=VALUE    Seed a variable before parsing (repeatable). VALUE is
//!                       read as an integer, `true`/`false`, or else a string.
//!
//! Definition files may use the `amf3` and `ldf` types in addition to the
//! built-in ones. Logging goes to stderr; set `RUST_LOG` for more detail.

use anyhow::{bail, Context};
use std::path::PathBuf;
use structdsl::dump::format_record;
use structdsl::{amf3, ldf, ParseError, StructParser, TypeRegistry, Value, Variables};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: parse_struct [--strict] [--set NAME=VALUE]... <BINARY> <DEFINITIONS>";

fn seed_value(raw: &str) -> Value {
    match raw {
        "true" | "True" => Value::Bool(true),
        "false" | "False" => Value::Bool(false),
        _ => raw
            .parse::<i64>()
            .map(Value::I64)
            .unwrap_or_else(|_| Value::Str(raw.to_string())),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let mut raw_args: Vec<String> = std::env::args().skip(1).collect();
    let strict = if let Some(pos) = raw_args.iter().position(|a| a == "--strict") {
        raw_args.remove(pos);
        true
    } else {
        false
    };
    let mut variables = Variables::new();
    while let Some(pos) = raw_args.iter().position(|a| a == "--set") {
        raw_args.remove(pos);
        if pos >= raw_args.len() {
            bail!("--set needs NAME=VALUE\n{}", USAGE);
        }
        let assignment = raw_args.remove(pos);
        let Some((name, value)) = assignment.split_once('=') else {
            bail!("--set expects NAME=VALUE, got `{}`", assignment);
        };
        variables.set(name.trim(), seed_value(value.trim()));
    }
    let mut args = raw_args.into_iter();
    let (Some(binary_path), Some(defs_path)) = (args.next(), args.next()) else {
        bail!(USAGE);
    };
    let (binary_path, defs_path) = (PathBuf::from(binary_path), PathBuf::from(defs_path));

    let mut registry = TypeRegistry::builtin();
    registry
        .register("amf3", amf3::decode_value)
        .register("ldf", ldf::decode_value);
    let parser = StructParser::from_path(&defs_path, &registry)
        .with_context(|| format!("compiling {}", defs_path.display()))?;
    let data = std::fs::read(&binary_path)
        .with_context(|| format!("reading {}", binary_path.display()))?;

    let mut records = parser.parse_with(&data, variables);
    let mut failure: Option<ParseError> = None;
    for record in records.by_ref() {
        match record {
            Ok(rec) => println!("{}", format_record(&rec)),
            Err(e) => failure = Some(e),
        }
    }
    if let Some(e) = failure {
        return Err(e).with_context(|| format!("parsing {}", binary_path.display()));
    }

    let summary = records.finish();
    if strict && !summary.fully_consumed {
        bail!(
            "{}: data not fully parsed ({} of {} bits consumed)",
            binary_path.display(),
            summary.bits_consumed,
            data.len() * 8
        );
    }
    Ok(())
}
