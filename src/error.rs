//! Compile-time and interpretation errors.

use crate::bitstream::BitStreamError;
use crate::expr::EvalError;
use crate::value::Value;

/// Raised while turning definition text into a tree. Never raised once
/// interpretation has started.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("line {line}: invalid expression `{text}`: {message}")]
    Expression {
        line: usize,
        text: String,
        message: String,
    },
    #[error("line {line}: unknown type `{name}`")]
    UnknownType { line: usize, name: String },
    #[error("line {line}: cannot derive a type from a length of {bits} bit(s)")]
    InvalidLength { line: usize, bits: usize },
    #[error("line {line}: bit offset `{text}` is out of range")]
    OffsetOutOfRange { line: usize, text: String },
    #[error("line {line}: indentation jumps to depth {depth}, at most {max} allowed here (under {path})")]
    IndentJump {
        line: usize,
        depth: usize,
        max: usize,
        /// Descriptions of the enclosing nodes, outermost first, joined by ` > `.
        path: String,
    },
    #[error("line {line}: `break` cannot have children")]
    ChildOfBreak { line: usize },
    #[error("line {line}: `break` outside of a `while` loop")]
    BreakOutsideLoop { line: usize },
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),
}

/// Fatal error for one interpretation call. The compiled tree is unaffected.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("line {line}: assertion failed for `{description}`: {value} is not `{expression}`")]
    Assertion {
        line: usize,
        description: String,
        expression: String,
        value: Value,
    },
    #[error("line {line}: reading `{description}`: {source}")]
    Stream {
        line: usize,
        description: String,
        #[source]
        source: BitStreamError,
    },
    #[error("line {line}: evaluating `{expression}`: {source}")]
    Eval {
        line: usize,
        expression: String,
        #[source]
        source: EvalError,
    },
    #[error("line {line}: `{description}` has children but its value {value} is negative")]
    NegativeRepeat {
        line: usize,
        description: String,
        value: Value,
    },
    #[error("line {line}: `{description}` has children but its {kind} value {value} is not a count or flag")]
    InvalidRepeat {
        line: usize,
        description: String,
        kind: &'static str,
        value: Value,
    },
    #[error("data not fully parsed: {remaining_bits} bit(s) left after bit {position}")]
    NotFullyConsumed {
        position: usize,
        remaining_bits: usize,
    },
}
