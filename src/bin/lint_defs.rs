//! Lint definition files: tab indentation, one level at a time, no ignored lines.
//!
//! Usage:
//!   lint_defs [OPTIONS] [FILE ...]
//!   lint_defs < defs.txt
//!
//! Options:
//!   --fix, -f    Rewrite files (or print fixed stdin) before linting.
//!   --human, -H  Human-readable output
//!
//! If no files are given, reads from stdin.

use anyhow::Context;
use std::io::{self, Read, Write};
use std::path::Path;
use structdsl::lint::{lint, lint_fix, LintMessage, LintRule, Severity};

fn rule_id(rule: LintRule) -> &'static str {
    match rule {
        LintRule::IndentationTabsOnly => "indentation-tabs-only",
        LintRule::IndentationDepth => "indentation-depth",
        LintRule::NoTrailingWhitespace => "no-trailing-whitespace",
        LintRule::UnrecognizedLine => "unrecognized-line",
        LintRule::EmptyBlock => "empty-block",
    }
}

fn print_message(path: &str, m: &LintMessage, style: OutputStyle) {
    let severity_str = match m.severity {
        Severity::Error => "error",
        Severity::Warning => "warning",
    };
    match style {
        OutputStyle::Compact => {
            println!(
                "{}:{}:{}: {}: {} [{}]",
                path,
                m.line,
                m.column,
                severity_str,
                m.message,
                rule_id(m.rule)
            );
        }
        OutputStyle::Human => {
            println!("  {} {}:{}: {} ({})", path, m.line, m.column, m.message, severity_str);
            println!("    rule: {}", rule_id(m.rule));
        }
    }
}

#[derive(Clone, Copy)]
enum OutputStyle {
    Compact,
    Human,
}

#[derive(Default)]
struct Totals {
    errors: usize,
    warnings: usize,
}

impl Totals {
    fn report(&mut self, path: &str, messages: &[LintMessage], style: OutputStyle) {
        for m in messages {
            match m.severity {
                Severity::Error => self.errors += 1,
                Severity::Warning => self.warnings += 1,
            }
            print_message(path, m, style);
        }
    }
}

fn main() -> anyhow::Result<()> {
    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let fix = if let Some(pos) = args.iter().position(|a| a == "--fix" || a == "-f") {
        args.remove(pos);
        true
    } else {
        false
    };
    let style = if let Some(pos) = args.iter().position(|a| a == "--human" || a == "-H") {
        args.remove(pos);
        OutputStyle::Human
    } else {
        OutputStyle::Compact
    };

    let mut totals = Totals::default();
    let mut failed_io = false;

    if args.is_empty() {
        let mut src = String::new();
        io::stdin()
            .read_to_string(&mut src)
            .context("reading stdin")?;
        if fix {
            io::stdout().write_all(lint_fix(&src).as_bytes())?;
            return Ok(());
        }
        totals.report("<stdin>", &lint(&src), style);
    } else {
        for path in &args {
            let path = Path::new(path);
            let src = match std::fs::read_to_string(path) {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("{}: {}", path.display(), e);
                    failed_io = true;
                    continue;
                }
            };
            let display_path = path.display().to_string();
            let src = if fix {
                let fixed = lint_fix(&src);
                if fixed != src {
                    if let Err(e) = std::fs::write(path, &fixed) {
                        eprintln!("{}: write failed: {}", display_path, e);
                        failed_io = true;
                        continue;
                    }
                    eprintln!("{}: fixed", display_path);
                }
                fixed
            } else {
                src
            };
            totals.report(&display_path, &lint(&src), style);
        }
    }

    if totals.errors > 0 || totals.warnings > 0 {
        eprintln!(
            "lint: {} error(s), {} warning(s)",
            totals.errors, totals.warnings
        );
    }
    if failed_io || totals.errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}
