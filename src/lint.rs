//! Linter for definition files.
//!
//! ## Rules
//!
//! - **Indentation**: tabs only, one tab per nesting level. A line may be at
//!   most one level deeper than the previous definition, and nothing may be
//!   nested under `break`.
//! - **Unrecognised lines**: lines the compiler would silently drop. Comment
//!   lines starting with `#` or `//` are exempt.
//! - **Empty blocks**: `if`/`while` with no nested definitions.
//! - **No trailing whitespace**.
//!
//! Run via the `lint_defs` binary: `lint_defs defs.txt` or `lint_defs < defs.txt`.
//! Exit code 1 if any error-level findings.

use crate::parser::is_definition_line;

/// Severity of a lint finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Identifies which rule produced the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LintRule {
    /// Indentation must use tabs only (no spaces).
    IndentationTabsOnly,
    /// Depth jumps by more than one level, or nests under `break`.
    IndentationDepth,
    /// Trailing whitespace is not allowed.
    NoTrailingWhitespace,
    /// Line matches no definition shape and would be ignored.
    UnrecognizedLine,
    /// `if`/`while` without a body.
    EmptyBlock,
}

/// A single lint message with location.
#[derive(Debug, Clone)]
pub struct LintMessage {
    pub line: usize,
    pub column: usize,
    pub rule: LintRule,
    pub severity: Severity,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Block,
    Break,
    Field,
}

/// Leading indentation as (depth, uses spaces, rest). Four spaces count as one level.
fn split_indent(line: &str) -> (usize, bool, &str) {
    let content = line.trim_start_matches([' ', '\t']);
    let leading = &line[..line.len() - content.len()];
    let tabs = leading.chars().filter(|&c| c == '\t').count();
    let spaces = leading.len() - tabs;
    (tabs + (spaces + 3) / 4, spaces > 0, content)
}

fn is_comment(content: &str) -> bool {
    content.starts_with('#') || content.starts_with("//")
}

fn shape(content: &str) -> Shape {
    if content == "break" {
        Shape::Break
    } else if content.starts_with('[') || content.contains("=[") {
        Shape::Field
    } else {
        Shape::Block
    }
}

/// Run all lint rules on definition source. Returns messages in line order.
pub fn lint(source: &str) -> Vec<LintMessage> {
    let mut out = Vec::new();
    let mut prev: Option<(usize, Shape)> = None;
    let mut open_block: Option<(usize, usize)> = None;

    for (i, line) in source.lines().enumerate() {
        let line_no = i + 1;
        let trimmed = line.trim_end();

        if line != trimmed {
            out.push(LintMessage {
                line: line_no,
                column: trimmed.len() + 1,
                rule: LintRule::NoTrailingWhitespace,
                severity: Severity::Warning,
                message: "trailing whitespace not allowed".to_string(),
            });
        }

        let (depth, spaces, content) = split_indent(trimmed);
        if content.is_empty() || is_comment(content) {
            continue;
        }
        if spaces {
            out.push(LintMessage {
                line: line_no,
                column: 1,
                rule: LintRule::IndentationTabsOnly,
                severity: Severity::Error,
                message: "indentation must use tabs only (no spaces)".to_string(),
            });
        }

        let normalized = format!("{}{}", "\t".repeat(depth), content);
        if !is_definition_line(&normalized) {
            out.push(LintMessage {
                line: line_no,
                column: depth + 1,
                rule: LintRule::UnrecognizedLine,
                severity: Severity::Warning,
                message: "line matches no definition shape and will be ignored".to_string(),
            });
            continue;
        }

        if let Some((block_line, block_depth)) = open_block.take() {
            if depth <= block_depth {
                out.push(empty_block(block_line));
            }
        }

        let max = prev.map(|(d, _)| d + 1).unwrap_or(0);
        if depth > max {
            out.push(LintMessage {
                line: line_no,
                column: 1,
                rule: LintRule::IndentationDepth,
                severity: Severity::Error,
                message: format!("expected at most {} tab(s) (found {})", max, depth),
            });
        } else if depth == max && matches!(prev, Some((_, Shape::Break))) {
            out.push(LintMessage {
                line: line_no,
                column: 1,
                rule: LintRule::IndentationDepth,
                severity: Severity::Error,
                message: "`break` cannot have nested definitions".to_string(),
            });
        }

        let kind = shape(content);
        let depth = depth.min(max);
        if kind == Shape::Block {
            open_block = Some((line_no, depth));
        }
        prev = Some((depth, kind));
    }

    if let Some((block_line, _)) = open_block {
        out.push(empty_block(block_line));
    }
    out.sort_by_key(|m| m.line);
    out
}

fn empty_block(line: usize) -> LintMessage {
    LintMessage {
        line,
        column: 1,
        rule: LintRule::EmptyBlock,
        severity: Severity::Warning,
        message: "block has no nested definitions".to_string(),
    }
}

/// Fix definition source: tabs for indentation, depth jumps clamped to one
/// level, no trailing whitespace. Unrecognised lines are kept as they are
/// apart from trailing whitespace.
pub fn lint_fix(source: &str) -> String {
    let mut prev_depth: Option<usize> = None;
    let mut out_lines: Vec<String> = Vec::new();
    for line in source.lines() {
        let trimmed = line.trim_end();
        let (depth, _, content) = split_indent(trimmed);
        if content.is_empty() {
            out_lines.push(String::new());
            continue;
        }
        let normalized = format!("{}{}", "\t".repeat(depth), content);
        if is_comment(content) {
            out_lines.push(normalized);
            continue;
        }
        if !is_definition_line(&normalized) {
            out_lines.push(trimmed.to_string());
            continue;
        }
        let depth = depth.min(prev_depth.map(|d| d + 1).unwrap_or(0));
        out_lines.push(format!("{}{}", "\t".repeat(depth), content));
        prev_depth = Some(depth);
    }
    out_lines.join("\n") + "\n"
}
