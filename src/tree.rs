//! Nest depth-tagged definitions into the definition tree.
//!
//! Uses an explicit stack of open levels: `levels[d]` holds the siblings at
//! depth `d` collected so far, and the last sibling of every level below the
//! top is the parent of the level above it.

use crate::ast::*;
use crate::error::CompileError;
use crate::types::TypeRegistry;
use tracing::debug;

pub fn build(lines: Vec<DefLine>, registry: &TypeRegistry) -> Result<Vec<Node>, CompileError> {
    let mut levels: Vec<Vec<Node>> = vec![Vec::new()];

    for def in lines {
        let top = levels.len() - 1;
        let has_open_parent = levels[top].last().is_some();
        let max = if has_open_parent { top + 1 } else { top };
        if def.depth > max {
            return Err(CompileError::IndentJump {
                line: def.line,
                depth: def.depth,
                max,
                path: ancestor_path(&levels),
            });
        }

        if def.depth == top + 1 {
            if let Some(parent) = levels[top].last() {
                if matches!(parent.kind, NodeKind::Break) {
                    return Err(CompileError::ChildOfBreak { line: def.line });
                }
            }
            levels.push(Vec::new());
        } else {
            while levels.len() - 1 > def.depth {
                close_level(&mut levels);
            }
        }

        let node = resolve(def, registry)?;
        if matches!(node.kind, NodeKind::Break) && !inside_loop(&levels) {
            return Err(CompileError::BreakOutsideLoop { line: node.line });
        }
        let depth = levels.len() - 1;
        levels[depth].push(node);
    }

    while levels.len() > 1 {
        close_level(&mut levels);
    }
    let roots = levels.pop().unwrap_or_default();
    debug!(
        roots = roots.len(),
        fields = roots.iter().map(Node::field_count).sum::<usize>(),
        "built definition tree"
    );
    Ok(roots)
}

/// Pop the top level and hand it to its parent as children.
fn close_level(levels: &mut Vec<Vec<Node>>) {
    if let Some(children) = levels.pop() {
        if let Some(parent) = levels.last_mut().and_then(|l| l.last_mut()) {
            parent.children = children;
        }
    }
}

/// True if an open ancestor of the level being appended to is a `while`.
fn inside_loop(levels: &[Vec<Node>]) -> bool {
    let open = levels.len() - 1;
    levels[..open]
        .iter()
        .filter_map(|l| l.last())
        .any(|n| matches!(n.kind, NodeKind::While(_)))
}

fn ancestor_path(levels: &[Vec<Node>]) -> String {
    let labels: Vec<String> = levels
        .iter()
        .filter_map(|l| l.last())
        .map(Node::label)
        .collect();
    if labels.is_empty() {
        "<top level>".to_string()
    } else {
        labels.join(" > ")
    }
}

fn resolve(def: DefLine, registry: &TypeRegistry) -> Result<Node, CompileError> {
    let kind = match def.kind {
        DefKind::If(c) => NodeKind::If(c),
        DefKind::While(c) => NodeKind::While(c),
        DefKind::Break => NodeKind::Break,
        DefKind::Field(f) => {
            let decoder = match f.type_spec {
                TypeSpec::Bytes(n) => Decoder::Bytes(n),
                TypeSpec::Named(name) => match registry.get(&name) {
                    Some(handler) => Decoder::Handler {
                        handler: handler.clone(),
                        name,
                    },
                    None => {
                        return Err(CompileError::UnknownType {
                            line: def.line,
                            name,
                        })
                    }
                },
            };
            NodeKind::Field(Field {
                binding: f.binding,
                address: f.address,
                decoder,
                description: f.description,
                expects: f.expects,
                asserts: f.asserts,
            })
        }
    };
    Ok(Node {
        line: def.line,
        kind,
        children: Vec::new(),
    })
}
