//! Payload normalization
//!
//! Canonicalizes a directive's arguments into the exact shape the native
//! executor expects for each tool. Always produces a fresh map; the incoming
//! directive is never mutated.

use serde_json::{Map, Value};

use super::directive::ToolId;
use super::infer::normalize_phone;

/// Absolute device-storage prefixes stripped from supplied paths so the
/// executor always receives a relative path.
const STORAGE_PREFIXES: &[&str] = &["/storage/emulated/0/", "/sdcard/"];

const DEFAULT_FILE_LIMIT: u64 = 200;

/// Argument aliases for the destination number on call/SMS tools.
const NUMBER_ALIASES: &[&str] = &["to", "phone", "number"];
/// Argument aliases for the SMS body.
const BODY_ALIASES: &[&str] = &["body", "text", "message", "content"];

fn first_string(args: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .find_map(|key| args.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn strip_storage_prefix(path: &str) -> String {
    for prefix in STORAGE_PREFIXES {
        if let Some(rest) = path.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    path.strip_prefix('/').unwrap_or(path).to_string()
}

/// Produce the canonical payload for a tool.
///
/// Unrecognized tools pass their arguments through unchanged.
pub fn normalize_payload(tool: &ToolId, arguments: &Map<String, Value>) -> Map<String, Value> {
    let mut payload = arguments.clone();

    match tool.as_str() {
        id if id.starts_with("android_device.sensors.") => {
            // Default the sensor name from the tool id's trailing segment.
            if !payload.contains_key("sensor") && tool.leaf() != "read" {
                payload.insert("sensor".into(), Value::String(tool.leaf().to_string()));
            }
        }
        "android_device.storage.files" => {
            let path = payload
                .get("path")
                .and_then(Value::as_str)
                .map(strip_storage_prefix)
                .unwrap_or_default();
            payload.insert("path".into(), Value::String(path));
            if !payload.contains_key("scope") {
                payload.insert("scope".into(), Value::String("user".into()));
            }
            if !payload.contains_key("limit") {
                payload.insert("limit".into(), Value::from(DEFAULT_FILE_LIMIT));
            }
        }
        "android_device.calls.start" => {
            if let Some(number) = first_string(&payload, NUMBER_ALIASES) {
                for alias in NUMBER_ALIASES {
                    payload.remove(*alias);
                }
                payload.insert("to".into(), Value::String(normalize_phone(&number)));
            }
        }
        "android_device.sms.send" => {
            if let Some(number) = first_string(&payload, NUMBER_ALIASES) {
                for alias in NUMBER_ALIASES {
                    payload.remove(*alias);
                }
                payload.insert("to".into(), Value::String(normalize_phone(&number)));
            }
            if let Some(body) = first_string(&payload, BODY_ALIASES) {
                for alias in BODY_ALIASES {
                    payload.remove(*alias);
                }
                payload.insert("body".into(), Value::String(body));
            }
        }
        "android_device.camera.capture" => {
            let lens = payload
                .get("lens")
                .or_else(|| payload.get("camera"))
                .and_then(Value::as_str)
                .map(str::to_lowercase);
            let lens = match lens.as_deref() {
                Some("front") | Some("selfie") | Some("user") => "front",
                _ => "rear",
            };
            payload.remove("camera");
            payload.insert("lens".into(), Value::String(lens.into()));
        }
        _ => {}
    }

    payload
}
