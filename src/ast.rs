//! Definition records and the compiled definition tree.

use crate::expr::Check;
use crate::types::TypeHandler;
use std::fmt;

/// One recognised definition line, before nesting is resolved.
#[derive(Debug, Clone)]
pub struct DefLine {
    /// 1-based line number in the definition source.
    pub line: usize,
    /// Number of leading tab characters.
    pub depth: usize,
    pub kind: DefKind,
}

#[derive(Debug, Clone)]
pub enum DefKind {
    If(Check),
    While(Check),
    Break,
    Field(FieldDef),
}

/// `[name=][A:addr,]<type> - description, expect ..., assert ...`
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub binding: Option<String>,
    /// Absolute bit offset to seek to before reading.
    pub address: Option<usize>,
    pub type_spec: TypeSpec,
    pub description: String,
    pub expects: Vec<Check>,
    pub asserts: Vec<Check>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeSpec {
    /// Looked up in the type registry.
    Named(String),
    /// Raw bytes of a fixed length, derived from an `L:` bit length.
    Bytes(usize),
}

impl fmt::Display for TypeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSpec::Named(name) => write!(f, "{}", name),
            TypeSpec::Bytes(n) => write!(f, "bytes({})", n),
        }
    }
}

/// How a field's value is pulled out of the stream.
#[derive(Clone)]
pub enum Decoder {
    Handler { name: String, handler: TypeHandler },
    Bytes(usize),
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decoder::Handler { name, .. } => f.debug_tuple("Handler").field(name).finish(),
            Decoder::Bytes(n) => f.debug_tuple("Bytes").field(n).finish(),
        }
    }
}

/// A field definition with its type resolved against the registry.
#[derive(Debug, Clone)]
pub struct Field {
    pub binding: Option<String>,
    pub address: Option<usize>,
    pub decoder: Decoder,
    pub description: String,
    pub expects: Vec<Check>,
    pub asserts: Vec<Check>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Field(Field),
    If(Check),
    While(Check),
    Break,
}

/// Node of the definition tree: a definition and its ordered children.
#[derive(Debug, Clone)]
pub struct Node {
    pub line: usize,
    pub kind: NodeKind,
    pub children: Vec<Node>,
}

impl Node {
    /// Text used to identify the node in error paths.
    pub fn label(&self) -> String {
        match &self.kind {
            NodeKind::Field(f) => f.description.clone(),
            NodeKind::If(c) => format!("if {}", c.source),
            NodeKind::While(c) => format!("while {}", c.source),
            NodeKind::Break => "break".to_string(),
        }
    }

    /// Number of field nodes in this subtree, this node included.
    pub fn field_count(&self) -> usize {
        let own = matches!(self.kind, NodeKind::Field(_)) as usize;
        own + self.children.iter().map(Node::field_count).sum::<usize>()
    }
}
