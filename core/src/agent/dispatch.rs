//! Action dispatch
//!
//! Maps a model-facing tool id to its native action id and invokes the
//! executor exactly once. Native device actions are not assumed idempotent
//! (placing a call, sending an SMS), so a single attempt is both the default
//! and the safe choice - retries belong to the caller if anywhere.

use std::sync::Arc;

use serde_json::{Map, Value};

use super::directive::ToolId;
use super::events::ToolExecutionEvent;
use crate::executor::ActionExecutor;

/// Static tool registry: model-facing tool id to native action id.
///
/// The keys double as the allow-list of executable tools; anything outside
/// it fails at the dispatch boundary instead of deep in execution.
pub const ACTION_TABLE: &[(&str, &str)] = &[
    ("android_device.calls.start", "place_call"),
    ("android_device.calls.log", "read_call_log"),
    ("android_device.sms.send", "send_sms"),
    ("android_device.sms.inbox", "read_sms"),
    ("android_device.contacts.read", "read_contacts"),
    ("android_device.calendar.read", "read_calendar"),
    ("android_device.notifications.read", "read_notifications"),
    ("android_device.sensors.read", "sensor_read"),
    ("android_device.sensors.accelerometer", "sensor_read"),
    ("android_device.sensors.gyroscope", "sensor_read"),
    ("android_device.sensors.magnetometer", "sensor_read"),
    ("android_device.sensors.light", "sensor_read"),
    ("android_device.sensors.pressure", "sensor_read"),
    ("android_device.sensors.proximity", "sensor_read"),
    ("android_device.storage.files", "list_files"),
    ("android_device.camera.capture", "take_photo"),
    ("android_device.battery.status", "get_battery"),
    ("android_device.device.info", "get_device_info"),
    ("android_device.location.current", "get_location"),
    ("android_device.apps.launch", "launch_app"),
    ("android_device.apps.list", "list_apps"),
    ("android_device.clipboard.read", "read_clipboard"),
    ("android_device.clipboard.write", "set_clipboard"),
    ("android_device.network.status", "get_network"),
    ("android_device.ui.auto", "ui_automation"),
    ("android_device.browser.open", "browser_open"),
];

/// The full registry, exposed so configuration seeding and diagnostics can
/// enumerate executable tools.
pub fn registered_tools() -> &'static [(&'static str, &'static str)] {
    ACTION_TABLE
}

/// Native action id for a tool, if one is registered.
pub fn native_action(tool: &str) -> Option<&'static str> {
    ACTION_TABLE
        .iter()
        .find(|(id, _)| *id == tool)
        .map(|(_, action)| *action)
}

pub struct ActionDispatcher {
    executor: Arc<dyn ActionExecutor>,
}

impl ActionDispatcher {
    pub fn new(executor: Arc<dyn ActionExecutor>) -> Self {
        Self { executor }
    }

    /// Execute one normalized directive payload. Never retries.
    pub async fn dispatch(&self, tool: &ToolId, payload: &Map<String, Value>) -> ToolExecutionEvent {
        if tool.is_integration() {
            return ToolExecutionEvent::failed(
                tool.as_str(),
                "integration tools are not executable by this client",
            );
        }

        let Some(action) = native_action(tool.as_str()) else {
            return ToolExecutionEvent::failed(
                tool.as_str(),
                "not yet mapped to native execution",
            );
        };

        tracing::debug!(tool = %tool, action, "dispatching native action");
        match self.executor.execute(action, payload).await {
            Ok(Value::Null) => {
                ToolExecutionEvent::executed(tool.as_str(), format!("executed {action}"), None)
            }
            Ok(output) => ToolExecutionEvent::executed(
                tool.as_str(),
                format!("executed {action}"),
                Some(output),
            ),
            Err(error) => {
                let message = error.to_string();
                let detail = if message.is_empty() {
                    "native execution failed".to_string()
                } else {
                    message
                };
                tracing::warn!(tool = %tool, action, %detail, "native action failed");
                ToolExecutionEvent::failed(tool.as_str(), detail)
            }
        }
    }
}
