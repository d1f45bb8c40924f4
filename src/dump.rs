//! Format structure records and decoded values for display.

use crate::interp::Structure;
use crate::value::Value;

/// Marker appended to records whose expect clauses failed.
pub const UNEXPECTED_MARKER: &str = "[unexpected]";

fn hex_string(b: &[u8]) -> String {
    b.iter().map(|x| format!("{:02x}", x)).collect::<Vec<_>>().join(" ")
}

/// Raw scalar string; containers fall back to their one-line form.
pub fn format_scalar_raw(v: &Value) -> String {
    match v {
        Value::Str(s) => s.clone(),
        Value::Bytes(b) => format!("hex({})", hex_string(b)),
        Value::Null => "undefined".to_string(),
        other => other.to_string(),
    }
}

/// Format a value; maps and lists span several lines, indented by `indent`
/// levels of two spaces.
pub fn value_to_dump(v: &Value, indent: usize) -> String {
    let pad = "  ".repeat(indent);
    match v {
        Value::Map(entries) if !entries.is_empty() => {
            let mut lines: Vec<String> = vec![format!("{}{{", pad)];
            for (k, val) in entries {
                let sub = value_to_dump(val, indent + 1);
                lines.push(format!("{}  {}: {}", pad, k, sub.trim_start()));
            }
            lines.push(format!("{}}}", pad));
            lines.join("\n")
        }
        Value::Map(_) => format!("{}{{}}", pad),
        Value::List(lst) if lst.is_empty() => format!("{}[]", pad),
        Value::List(lst) => {
            let mut lines: Vec<String> = vec![format!("{}[", pad)];
            for (i, item) in lst.iter().enumerate() {
                let sub = value_to_dump(item, indent + 1);
                lines.push(format!("{}  [{}] {}", pad, i, sub.trim_start()));
            }
            lines.push(format!("{}]", pad));
            lines.join("\n")
        }
        scalar => format!("{}{}", pad, format_scalar_raw(scalar)),
    }
}

/// First line of [`value_to_dump`].
pub fn value_summary_line(v: &Value) -> String {
    let full = value_to_dump(v, 0);
    full.lines().next().map(|s| s.trim().to_string()).unwrap_or_default()
}

/// `<tabs>description: value [unexpected]`, tab-indented by record depth.
/// Multi-line values keep the record's indentation on every line.
pub fn format_record(rec: &Structure<'_>) -> String {
    let tabs = "\t".repeat(rec.depth);
    let body = value_to_dump(&rec.value, 0).replace('\n', &format!("\n{}", tabs));
    let marker = if rec.unexpected == Some(true) {
        format!(" {}", UNEXPECTED_MARKER)
    } else {
        String::new()
    };
    format!("{}{}: {}{}", tabs, rec.description, body, marker)
}
