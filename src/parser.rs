//! Compile definition text into flat, depth-tagged definition records.
//!
//! Every line is matched on its own against `line.pest`. Lines that match no
//! statement shape (comments, blank lines, notes) are skipped without error.
//! Expressions inside a recognised line are compiled here, so a typo in an
//! expect/assert clause fails the build instead of a parse run.

use crate::ast::*;
use crate::error::CompileError;
use crate::expr::{compile_checks, compile_condition, Check};
use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser as PestParser;
use tracing::{debug, trace};

#[derive(PestParser)]
#[grammar = "line.pest"]
struct LineParser;

/// Compile definition source into definition records, in source order.
pub fn compile(source: &str) -> Result<Vec<DefLine>, CompileError> {
    let mut out = Vec::new();
    let mut skipped = 0usize;
    for (i, text) in source.lines().enumerate() {
        let line = i + 1;
        let pair = match LineParser::parse(Rule::line, text) {
            Ok(mut pairs) => match pairs.next() {
                Some(p) => p,
                None => continue,
            },
            Err(_) => {
                if !text.trim().is_empty() {
                    trace!(line, text, "skipping unrecognised definition line");
                }
                skipped += 1;
                continue;
            }
        };
        out.push(build_line(pair, line)?);
    }
    debug!(definitions = out.len(), skipped, "compiled definition source");
    Ok(out)
}

/// True when `text` is a line `compile` would keep.
pub fn is_definition_line(text: &str) -> bool {
    LineParser::parse(Rule::line, text).is_ok()
}

fn build_line(pair: Pair<Rule>, line: usize) -> Result<DefLine, CompileError> {
    let mut depth = 0;
    let mut kind = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::indent => depth = inner.as_str().len(),
            Rule::if_stmt => kind = Some(DefKind::If(build_condition(inner, line)?)),
            Rule::while_stmt => kind = Some(DefKind::While(build_condition(inner, line)?)),
            Rule::break_stmt => kind = Some(DefKind::Break),
            Rule::field => kind = Some(DefKind::Field(build_field(inner, line)?)),
            _ => {}
        }
    }
    let kind = kind.ok_or_else(|| CompileError::Expression {
        line,
        text: String::new(),
        message: "empty statement".to_string(),
    })?;
    Ok(DefLine { line, depth, kind })
}

fn build_condition(pair: Pair<Rule>, line: usize) -> Result<Check, CompileError> {
    let text = pair
        .into_inner()
        .next()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default();
    compile_condition(&text).map_err(|message| CompileError::Expression {
        line,
        text,
        message,
    })
}

fn build_field(pair: Pair<Rule>, line: usize) -> Result<FieldDef, CompileError> {
    let mut binding = None;
    let mut address = None;
    let mut type_spec = None;
    let mut description = String::new();
    let mut expects = Vec::new();
    let mut asserts = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::binding => binding = Some(inner.as_str().to_string()),
            Rule::type_info => {
                let (addr, spec) = build_type_info(inner, line)?;
                address = addr;
                type_spec = Some(spec);
            }
            Rule::description => description = inner.as_str().to_string(),
            Rule::expect_clause => expects.extend(build_clause(inner, line)?),
            Rule::assert_clause => asserts.extend(build_clause(inner, line)?),
            _ => {}
        }
    }
    let type_spec = type_spec.ok_or(CompileError::InvalidLength { line, bits: 0 })?;
    Ok(FieldDef {
        binding,
        address,
        type_spec,
        description,
        expects,
        asserts,
    })
}

fn build_clause(pair: Pair<Rule>, line: usize) -> Result<Vec<Check>, CompileError> {
    let text = pair
        .into_inner()
        .next()
        .map(|p| p.as_str().to_string())
        .unwrap_or_default();
    compile_checks(&text).map_err(|message| CompileError::Expression {
        line,
        text,
        message,
    })
}

fn build_type_info(
    pair: Pair<Rule>,
    line: usize,
) -> Result<(Option<usize>, TypeSpec), CompileError> {
    let mut address = None;
    let mut spec = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::address => {
                // "A:0x" prefix, hex byte offset, optional BITn
                address = Some(parse_bit_offset(&inner.as_str()[4..], 16, line)?);
            }
            Rule::length => {
                let bits = parse_bit_offset(&inner.as_str()[2..], 10, line)?;
                spec = Some(type_for_length(bits, line)?);
            }
            Rule::type_name => spec = Some(TypeSpec::Named(inner.as_str().to_string())),
            _ => {}
        }
    }
    let spec = spec.ok_or(CompileError::InvalidLength { line, bits: 0 })?;
    Ok((address, spec))
}

/// `<bytes>[BIT<n>]` → bytes * 8 + n. An empty byte part counts as zero.
fn parse_bit_offset(s: &str, radix: u32, line: usize) -> Result<usize, CompileError> {
    let out_of_range = || CompileError::OffsetOutOfRange {
        line,
        text: s.to_string(),
    };
    let (bytes, bits) = match s.split_once("BIT") {
        Some((b, n)) => (b, n.parse::<usize>().map_err(|_| out_of_range())?),
        None => (s, 0),
    };
    let bytes = if bytes.is_empty() {
        0
    } else {
        usize::from_str_radix(bytes, radix).map_err(|_| out_of_range())?
    };
    bytes
        .checked_mul(8)
        .and_then(|b| b.checked_add(bits))
        .ok_or_else(out_of_range)
}

/// Type used when a field gives only its length.
fn type_for_length(bits: usize, line: usize) -> Result<TypeSpec, CompileError> {
    let named = match bits {
        1 => "bit",
        8 => "s8",
        16 => "s16",
        32 => "s32",
        64 => "s64",
        n if n > 0 && n % 8 == 0 => return Ok(TypeSpec::Bytes(n / 8)),
        n => return Err(CompileError::InvalidLength { line, bits: n }),
    };
    Ok(TypeSpec::Named(named.to_string()))
}
