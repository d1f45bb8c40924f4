//! The structure interpreter.
//!
//! A [`StructParser`] owns an immutable definition tree. Each parse call
//! returns a [`Records`] iterator that walks the tree in pre-order with an
//! explicit frame stack, decoding exactly one field per `next()`.

use crate::ast::{Decoder, Field, Node, NodeKind};
use crate::bitstream::BitStream;
use crate::error::{CompileError, ParseError};
use crate::expr::{Check, Env};
use crate::parser;
use crate::tree;
use crate::types::TypeRegistry;
use crate::value::{Value, Variables};
use std::iter::FusedIterator;
use std::path::Path;
use tracing::{trace, warn};

/// One decoded field occurrence.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure<'p> {
    pub depth: usize,
    pub description: &'p str,
    pub value: Value,
    /// `None` without expect clauses, otherwise whether any of them failed.
    pub unexpected: Option<bool>,
}

/// State handed back by [`Records::finish`].
#[derive(Debug, Clone, PartialEq)]
pub struct ParseSummary {
    pub variables: Variables,
    pub bits_consumed: usize,
    pub fully_consumed: bool,
}

/// Compiled definitions, reusable across any number of parse calls.
#[derive(Debug, Clone)]
pub struct StructParser {
    nodes: Vec<Node>,
}

impl StructParser {
    /// Compile against the built-in types.
    pub fn new(source: &str) -> Result<Self, CompileError> {
        Self::with_types(source, &TypeRegistry::builtin())
    }

    /// Compile against a caller-supplied registry.
    pub fn with_types(source: &str, registry: &TypeRegistry) -> Result<Self, CompileError> {
        let lines = parser::compile(source)?;
        let nodes = tree::build(lines, registry)?;
        Ok(StructParser { nodes })
    }

    pub fn from_path(path: impl AsRef<Path>, registry: &TypeRegistry) -> Result<Self, CompileError> {
        let source = std::fs::read_to_string(path)?;
        Self::with_types(&source, registry)
    }

    /// Top-level definition nodes.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Parse `data` with a fresh namespace.
    pub fn parse<'p, 'a>(&'p self, data: &'a [u8]) -> Records<'p, 'a> {
        self.parse_with(data, Variables::new())
    }

    /// Parse `data` with a pre-seeded namespace.
    pub fn parse_with<'p, 'a>(&'p self, data: &'a [u8], variables: Variables) -> Records<'p, 'a> {
        self.parse_stream(BitStream::new(data), variables)
    }

    /// Parse from an already positioned stream.
    pub fn parse_stream<'p, 'a>(
        &'p self,
        stream: BitStream<'a>,
        variables: Variables,
    ) -> Records<'p, 'a> {
        Records {
            stream,
            variables,
            frames: vec![Frame {
                nodes: &self.nodes,
                next: 0,
                depth: 0,
                kind: FrameKind::Block,
            }],
            pending: None,
            done: false,
        }
    }

    /// Collect every record; leftover data is an error.
    pub fn parse_all_strict<'p>(&'p self, data: &[u8]) -> Result<Vec<Structure<'p>>, ParseError> {
        let mut records = self.parse(data);
        let out = records.by_ref().collect::<Result<Vec<_>, _>>()?;
        if !records.is_fully_consumed() {
            return Err(ParseError::NotFullyConsumed {
                position: records.stream.bit_position(),
                remaining_bits: records.stream.bits_remaining(),
            });
        }
        Ok(out)
    }
}

#[derive(Debug)]
enum FrameKind<'p> {
    /// Top level or an `if` body: runs once.
    Block,
    /// Children of a field, run `remaining` more times including the current pass.
    Repeat { remaining: u64 },
    /// A `while` body; the condition is re-checked after each pass.
    Loop { cond: &'p Check, line: usize },
}

#[derive(Debug)]
struct Frame<'p> {
    nodes: &'p [Node],
    next: usize,
    depth: usize,
    kind: FrameKind<'p>,
}

/// Lazy record sequence for one parse call. Fused after the first error.
#[derive(Debug)]
pub struct Records<'p, 'a> {
    stream: BitStream<'a>,
    variables: Variables,
    frames: Vec<Frame<'p>>,
    /// Raised after the record that caused it has been yielded.
    pending: Option<ParseError>,
    done: bool,
}

impl<'p, 'a> Records<'p, 'a> {
    pub fn stream(&self) -> &BitStream<'a> {
        &self.stream
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Hand the namespace back for use in a later call.
    pub fn into_variables(self) -> Variables {
        self.variables
    }

    pub fn is_fully_consumed(&self) -> bool {
        self.stream.is_fully_consumed()
    }

    /// Consume the iterator's state, warning if data was left unread.
    pub fn finish(self) -> ParseSummary {
        let fully_consumed = self.stream.is_fully_consumed();
        if !fully_consumed {
            warn!(
                position = self.stream.bit_position(),
                remaining_bits = self.stream.bits_remaining(),
                "data not fully parsed"
            );
        }
        ParseSummary {
            bits_consumed: self.stream.bit_position(),
            fully_consumed,
            variables: self.variables,
        }
    }

    fn step(&mut self) -> Result<Option<Structure<'p>>, ParseError> {
        if let Some(e) = self.pending.take() {
            return Err(e);
        }
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Ok(None);
            };

            if frame.next >= frame.nodes.len() {
                let again = match &mut frame.kind {
                    FrameKind::Block => false,
                    FrameKind::Repeat { remaining } => {
                        *remaining -= 1;
                        *remaining > 0
                    }
                    FrameKind::Loop { cond, line } => {
                        let (cond, line) = (*cond, *line);
                        self.condition(cond, line)?
                    }
                };
                match self.frames.last_mut() {
                    Some(frame) if again => frame.next = 0,
                    _ => {
                        self.frames.pop();
                    }
                }
                continue;
            }

            let nodes: &'p [Node] = frame.nodes;
            let node = &nodes[frame.next];
            frame.next += 1;
            let depth = frame.depth;

            match &node.kind {
                NodeKind::Field(field) => return self.field(node, field, depth).map(Some),
                NodeKind::If(cond) => {
                    if !node.children.is_empty() && self.condition(cond, node.line)? {
                        self.push(node, depth, FrameKind::Block);
                    }
                }
                NodeKind::While(cond) => {
                    if !node.children.is_empty() && self.condition(cond, node.line)? {
                        let kind = FrameKind::Loop {
                            cond,
                            line: node.line,
                        };
                        self.push(node, depth, kind);
                    }
                }
                NodeKind::Break => self.unwind_loop(),
            }
        }
    }

    fn push(&mut self, node: &'p Node, depth: usize, kind: FrameKind<'p>) {
        self.frames.push(Frame {
            nodes: &node.children,
            next: 0,
            depth: depth + 1,
            kind,
        });
    }

    /// Pop frames up to and including the nearest loop.
    fn unwind_loop(&mut self) {
        while let Some(frame) = self.frames.pop() {
            if matches!(frame.kind, FrameKind::Loop { .. }) {
                break;
            }
        }
    }

    fn condition(&self, cond: &Check, line: usize) -> Result<bool, ParseError> {
        cond.holds(&Env::vars(&self.variables))
            .map_err(|source| ParseError::Eval {
                line,
                expression: cond.source.clone(),
                source,
            })
    }

    fn field(
        &mut self,
        node: &'p Node,
        field: &'p Field,
        depth: usize,
    ) -> Result<Structure<'p>, ParseError> {
        let stream_err = |source| ParseError::Stream {
            line: node.line,
            description: field.description.clone(),
            source,
        };
        if let Some(bit) = field.address {
            self.stream.seek(bit).map_err(stream_err)?;
        }
        let start = self.stream.bit_position();
        let value = match &field.decoder {
            Decoder::Handler { handler, .. } => handler(&mut self.stream),
            Decoder::Bytes(n) => self.stream.read_bytes(*n).map(Value::Bytes),
        }
        .map_err(stream_err)?;
        trace!(
            line = node.line,
            bit = start,
            description = field.description.as_str(),
            %value,
            "decoded field"
        );

        let unexpected = if field.expects.is_empty() {
            None
        } else {
            let env = Env::checking(&value, &self.variables);
            let mut failed = false;
            for check in &field.expects {
                // later checks may rely on earlier ones holding, as with `and`
                if !check.holds(&env).map_err(|e| eval_err(node, check, e))? {
                    failed = true;
                    break;
                }
            }
            Some(failed)
        };

        {
            let env = Env::checking(&value, &self.variables);
            for check in &field.asserts {
                if !check.holds(&env).map_err(|e| eval_err(node, check, e))? {
                    return Err(ParseError::Assertion {
                        line: node.line,
                        description: field.description.clone(),
                        expression: check.source.clone(),
                        value,
                    });
                }
            }
        }

        if let Some(name) = &field.binding {
            self.variables.set(name.as_str(), value.clone());
        }

        if !node.children.is_empty() {
            match repeat_count(node, field, &value) {
                Ok(0) => {}
                Ok(count) => self.push(node, depth, FrameKind::Repeat { remaining: count }),
                Err(e) => self.pending = Some(e),
            }
        }

        Ok(Structure {
            depth,
            description: &field.description,
            value,
            unexpected,
        })
    }
}

fn eval_err(node: &Node, check: &Check, source: crate::expr::EvalError) -> ParseError {
    ParseError::Eval {
        line: node.line,
        expression: check.source.clone(),
        source,
    }
}

/// How many times a field's children run, given its decoded value.
fn repeat_count(node: &Node, field: &Field, value: &Value) -> Result<u64, ParseError> {
    if let Some(flag) = value.as_bool() {
        return Ok(flag as u64);
    }
    match value.as_i128() {
        Some(n) if n < 0 => Err(ParseError::NegativeRepeat {
            line: node.line,
            description: field.description.clone(),
            value: value.clone(),
        }),
        Some(n) => Ok(u64::try_from(n).unwrap_or(u64::MAX)),
        None => Err(ParseError::InvalidRepeat {
            line: node.line,
            description: field.description.clone(),
            kind: value.kind(),
            value: value.clone(),
        }),
    }
}

impl<'p, 'a> Iterator for Records<'p, 'a> {
    type Item = Result<Structure<'p>, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.step() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl FusedIterator for Records<'_, '_> {}
