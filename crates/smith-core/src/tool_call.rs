//! Tool call recognition in generated text
//!
//! Models are asked to answer with
//!
//! ```text
//! {"function": "<name>", "parameters": {"<param>": "<value>"}}
//! ```
//!
//! but the call often arrives wrapped in prose, spread over several lines, or
//! with newlines escaped as literal `\n` sequences. Recognition runs in two
//! stages: a structural scan locates the outer shape and the span of the
//! `parameters` mapping, then that span is strictly decoded as JSON.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;
use tracing::{debug, error};

/// Whitespace, raw or escaped, allowed between structural tokens
const GAP: &str = r#"(?:\s|\\[nrt])*"#;

static CALL_HEAD: LazyLock<Regex> = LazyLock::new(|| {
    let pattern = format!(
        r#"\{{{gap}"function"{gap}:{gap}"(\w+)"{gap},{gap}"parameters"{gap}:{gap}"#,
        gap = GAP
    );
    Regex::new(&pattern).expect("tool call pattern is valid")
});

/// A tool invocation extracted from generated text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: Map<String, Value>,
}

/// Find the first tool call in `text`.
///
/// Returns `None` when no complete call shape is present, or when the first
/// complete shape carries parameters that are not a JSON object.
pub fn parse_tool_call(text: &str) -> Option<ToolCall> {
    let (name, span) = find_call_shape(text)?;
    match decode_parameters(span) {
        Ok(arguments) => {
            debug!("Recognized call to '{}'", name);
            Some(ToolCall {
                name: name.to_string(),
                arguments,
            })
        }
        Err(e) => {
            error!("Error parsing function arguments: {}", e);
            None
        }
    }
}

/// Stage one: the function name and the raw `parameters` span of the first
/// structurally complete call.
fn find_call_shape(text: &str) -> Option<(&str, &str)> {
    for caps in CALL_HEAD.captures_iter(text) {
        let (Some(head), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let rest = &text[head.end()..];
        let Some(span_len) = find_mapping_end(rest) else {
            continue;
        };
        if closes_outer_mapping(&rest[span_len..]) {
            return Some((name.as_str(), &rest[..span_len]));
        }
    }
    None
}

/// Length of the brace-balanced mapping at the start of `input`.
fn find_mapping_end(input: &str) -> Option<usize> {
    if !input.starts_with('{') {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in input.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + ch.len_utf8());
                }
            }
            _ => {}
        }
    }

    None
}

/// The outer mapping must close right after the parameters, gaps allowed.
fn closes_outer_mapping(rest: &str) -> bool {
    let mut rest = rest;
    loop {
        let trimmed = rest.trim_start();
        match trimmed.strip_prefix('\\') {
            Some(after) if after.starts_with(['n', 'r', 't']) => rest = &after[1..],
            _ => return trimmed.starts_with('}'),
        }
    }
}

/// Stage two: strict decode of the parameter span.
fn decode_parameters(span: &str) -> Result<Map<String, Value>, serde_json::Error> {
    let normalized = normalize_escaped_whitespace(span);
    serde_json::from_str::<Map<String, Value>>(&normalized)
}

/// Replace literal `\n`, `\r`, `\t` sequences outside string literals with spaces.
fn normalize_escaped_whitespace(span: &str) -> String {
    let mut out = String::with_capacity(span.len());
    let mut in_string = false;
    let mut chars = span.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                in_string = !in_string;
                out.push(ch);
            }
            '\\' if in_string => {
                out.push(ch);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '\\' if matches!(chars.peek(), Some('n' | 'r' | 't')) => {
                chars.next();
                out.push(' ');
            }
            _ => out.push(ch),
        }
    }

    out
}
