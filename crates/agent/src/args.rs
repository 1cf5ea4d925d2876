//! Tool-call argument parsing.
//!
//! Models do not always produce valid JSON for function arguments. Parsing
//! goes strict first, then through a repair pass, and finally gives up with
//! an empty map; it never fails the turn.

use questweaver_core::tool::ToolArgs;
use serde_json::Value;
use tracing::{debug, warn};

use crate::codec::strip_code_fence;

/// Parse model-produced arguments into a key-value map.
///
/// Non-object JSON yields an empty map and `null` values become empty
/// strings.
pub fn parse_arguments(raw: &str) -> ToolArgs {
    let raw = raw.trim();
    if raw.is_empty() {
        return ToolArgs::new();
    }

    let parsed = match serde_json::from_str::<Value>(raw) {
        Ok(value) => Some(value),
        Err(strict_err) => {
            let repaired = repair(raw);
            match serde_json::from_str::<Value>(&repaired) {
                Ok(value) => {
                    debug!(error = %strict_err, "Recovered malformed tool arguments");
                    Some(value)
                }
                Err(e) => {
                    warn!(error = %e, raw, "Unparsable tool arguments, using empty set");
                    None
                }
            }
        }
    };

    match parsed {
        Some(Value::Object(map)) => sanitize(map),
        Some(other) => {
            warn!(kind = json_kind(&other), "Tool arguments are not an object, using empty set");
            ToolArgs::new()
        }
        None => ToolArgs::new(),
    }
}

fn sanitize(map: ToolArgs) -> ToolArgs {
    map.into_iter()
        .map(|(k, v)| match v {
            Value::Null => (k, Value::String(String::new())),
            other => (k, other),
        })
        .collect()
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Best-effort rewrite of almost-JSON into JSON.
///
/// Handles code fences, text around the outermost object, single-quoted
/// strings, unquoted keys, trailing commas and Python literals.
fn repair(raw: &str) -> String {
    let text = strip_code_fence(raw);
    let text = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    };

    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len() + 16);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '"' => {
                i = copy_double_quoted(&chars, i, &mut out);
                continue;
            }
            '\'' => {
                i = convert_single_quoted(&chars, i, &mut out);
                continue;
            }
            ',' => {
                let next = chars[i + 1..].iter().find(|c| !c.is_whitespace());
                if !matches!(next, Some('}') | Some(']')) {
                    out.push(',');
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                let followed_by_colon = chars[i..].iter().find(|c| !c.is_whitespace()) == Some(&':');
                match word.as_str() {
                    _ if followed_by_colon => {
                        out.push('"');
                        out.push_str(&word);
                        out.push('"');
                    }
                    "True" => out.push_str("true"),
                    "False" => out.push_str("false"),
                    "None" => out.push_str("null"),
                    _ => out.push_str(&word),
                }
                continue;
            }
            other => out.push(other),
        }
        i += 1;
    }
    out
}

/// Copy a double-quoted string verbatim. Returns the index after it.
fn copy_double_quoted(chars: &[char], start: usize, out: &mut String) -> usize {
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        let c = chars[i];
        out.push(c);
        if c == '\\' && i + 1 < chars.len() {
            out.push(chars[i + 1]);
            i += 2;
            continue;
        }
        i += 1;
        if c == '"' {
            break;
        }
    }
    i
}

/// Rewrite a single-quoted string as a double-quoted one. Returns the index
/// after it.
fn convert_single_quoted(chars: &[char], start: usize, out: &mut String) -> usize {
    out.push('"');
    let mut i = start + 1;
    while i < chars.len() {
        match chars[i] {
            '\\' if i + 1 < chars.len() => {
                if chars[i + 1] == '\'' {
                    out.push('\'');
                } else {
                    out.push('\\');
                    out.push(chars[i + 1]);
                }
                i += 2;
            }
            '\'' => {
                i += 1;
                break;
            }
            '"' => {
                out.push_str("\\\"");
                i += 1;
            }
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    out.push('"');
    i
}
