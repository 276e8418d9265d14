//! Directive parser for LLM output
//!
//! The upstream model is adversarially unreliable: it may wrap a tool call in
//! prose, use deprecated tag syntaxes, or emit near-valid JSON surrounded by
//! explanation. Parsing is therefore an ordered chain of (name, extractor)
//! strategies evaluated lazily - the first success wins, and earlier, more
//! specific syntaxes always beat later, more permissive scans.
//!
//! All functions here are pure - no async, no IO, no hidden state.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};

use super::directive::{Directive, ToolId};

const REMINDER_OPEN: &str = "<system-reminder>";
const REMINDER_CLOSE: &str = "</system-reminder>";
const TOOL_CALL_OPEN: &str = "[TOOL_CALL]";
const TOOL_CALL_CLOSE: &str = "[/TOOL_CALL]";

lazy_static! {
    static ref INVOKE_TAG_RE: Regex =
        Regex::new(r#"<invoke\s+name="([^"]+)"\s*/?>"#).expect("invoke tag regex");
}

/// Ordered parse strategies. First match wins.
const STRATEGIES: &[(&str, fn(&str) -> Option<Directive>)] = &[
    ("invoke-tag", parse_invoke_tag),
    ("bracket-block", parse_bracket_block),
    ("whole-object", parse_whole_object),
    ("fenced-block", parse_fenced_blocks),
    ("brace-scan", parse_brace_scan),
];

/// Stateless parser extracting a [`Directive`] from raw assistant text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectiveParser;

impl DirectiveParser {
    pub fn new() -> Self {
        Self
    }

    /// Extract a directive from raw model output.
    ///
    /// `None` means "no directive found" - a plain conversational reply,
    /// not an error.
    pub fn parse(&self, content: &str) -> Option<Directive> {
        let cleaned = strip_system_reminders(content);
        for (name, extract) in STRATEGIES {
            if let Some(directive) = extract(&cleaned) {
                tracing::debug!(strategy = name, tool = %directive.tool, "directive recognized");
                return Some(directive);
            }
        }
        None
    }
}

/// Remove `<system-reminder>...</system-reminder>` spans.
///
/// These are provider-injected scaffolding: never user-visible content and
/// never directive carriers. An unterminated trailing open tag swallows the
/// rest of the text.
pub fn strip_system_reminders(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut rest = content;
    while let Some(start) = rest.find(REMINDER_OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + REMINDER_OPEN.len()..];
        match after_open.find(REMINDER_CLOSE) {
            Some(end) => rest = &after_open[end + REMINDER_CLOSE.len()..],
            None => return out,
        }
    }
    out.push_str(rest);
    out
}

/// Scrub internal protocol markers from text that is about to become
/// user-visible reply content.
pub fn scrub_internal_markers(content: &str) -> String {
    let stripped = strip_system_reminders(content);
    stripped
        .replace(TOOL_CALL_OPEN, "")
        .replace(TOOL_CALL_CLOSE, "")
        .trim()
        .to_string()
}

/// Interpret a JSON value as a directive object.
///
/// Accepts `{"type":"tool_call","tool":...,"arguments":{...}}`. A missing
/// `type` field is tolerated when a `tool` (or `tool_id`) string is present;
/// any other `type` value is rejected. `arguments` must be an object when
/// present and defaults to `{}` when absent - arrays and null are refused.
fn directive_from_value(value: &Value) -> Option<Directive> {
    let obj = value.as_object()?;

    match obj.get("type") {
        None => {}
        Some(Value::String(t)) if t == "tool_call" => {}
        Some(_) => return None,
    }

    let raw_tool = obj.get("tool").or_else(|| obj.get("tool_id"))?.as_str()?;
    let tool = ToolId::parse(raw_tool).ok()?;

    let arguments: Map<String, Value> = match obj.get("arguments") {
        None => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return None,
    };

    Some(Directive::new(tool, arguments))
}

/// Legacy self-closing tag form: `<invoke name="X">` carries no structured
/// arguments.
fn parse_invoke_tag(content: &str) -> Option<Directive> {
    let cap = INVOKE_TAG_RE.captures(content)?;
    let tool = ToolId::parse(&cap[1]).ok()?;
    Some(Directive::bare(tool))
}

/// `[TOOL_CALL] ... [/TOOL_CALL]` bracketed block.
fn parse_bracket_block(content: &str) -> Option<Directive> {
    let start = content.find(TOOL_CALL_OPEN)?;
    let body_start = start + TOOL_CALL_OPEN.len();
    let end = content[body_start..].find(TOOL_CALL_CLOSE)?;
    let body = content[body_start..body_start + end].trim();

    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(directive) = directive_from_value(&value) {
            return Some(directive);
        }
    }
    // Near-valid bodies: fall back to brace extraction inside the block only.
    parse_brace_scan(body)
}

/// The entire cleaned text as one JSON object.
fn parse_whole_object(content: &str) -> Option<Directive> {
    let value = serde_json::from_str::<Value>(content.trim()).ok()?;
    directive_from_value(&value)
}

/// Fenced ```json blocks, tried in order of appearance.
fn parse_fenced_blocks(content: &str) -> Option<Directive> {
    for block in extract_code_blocks(content, "json") {
        if let Ok(value) = serde_json::from_str::<Value>(&block) {
            if let Some(directive) = directive_from_value(&value) {
                return Some(directive);
            }
        }
    }
    None
}

/// Brace-balanced scan over the whole text, each top-level `{...}` span
/// tried in order of appearance.
fn parse_brace_scan(content: &str) -> Option<Directive> {
    for candidate in extract_json_objects(content) {
        if let Ok(value) = serde_json::from_str::<Value>(&candidate) {
            if let Some(directive) = directive_from_value(&value) {
                return Some(directive);
            }
        }
    }
    None
}

/// Extract top-level JSON object spans from text using brace balancing.
///
/// Handles nested braces and escaped quotes within strings, so braces inside
/// string literals are not counted.
pub fn extract_json_objects(content: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut in_string = false;
    let mut escape = false;
    let mut depth: i32 = 0;
    let mut start: Option<usize> = None;

    for (i, ch) in content.char_indices() {
        if in_string {
            if escape {
                escape = false;
                continue;
            }
            match ch {
                '\\' => escape = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        if let Some(s) = start.take() {
                            out.push(content[s..=i].to_string());
                        }
                    }
                }
            }
            _ => {}
        }
    }

    out
}

/// Extract fenced code blocks (```json ... ```)
pub fn extract_code_blocks(content: &str, language: &str) -> Vec<String> {
    let mut blocks = Vec::new();
    let fence_pattern = format!("```{}\n", language);
    // Byte-length-preserving: the fence markers are pure ASCII, and Unicode
    // lowercasing can shift every index after a case-expanding character.
    let lower = content.to_ascii_lowercase();

    let mut search_from = 0usize;

    while let Some(rel_start) = lower[search_from..].find(&fence_pattern) {
        let fence_start = search_from + rel_start;
        let content_start = fence_start + fence_pattern.len();

        if let Some(rel_end) = lower[content_start..].find("```") {
            let content_end = content_start + rel_end;
            blocks.push(content[content_start..content_end].trim().to_string());
            search_from = content_end + 3;
        } else {
            break;
        }
    }

    blocks
}
