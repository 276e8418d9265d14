//! Native action executor boundary
//!
//! The pipeline treats the device side as a black box: an action id plus a
//! canonical payload go in, an arbitrary JSON value or an error comes out.
//! Action ids are internal identifiers, not part of the model-facing tool
//! namespace.

mod bridge;

pub use bridge::HttpBridgeExecutor;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{Map, Value};

/// Executes one native device action.
#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute(&self, action: &str, payload: &Map<String, Value>) -> Result<Value>;
}

/// Echo executor for diagnostics and the CLI probe. Performs no device IO.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunExecutor;

#[async_trait]
impl ActionExecutor for DryRunExecutor {
    async fn execute(&self, action: &str, payload: &Map<String, Value>) -> Result<Value> {
        Ok(serde_json::json!({
            "action": action,
            "payload": payload,
            "dry_run": true,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dry_run_echoes_action_and_payload() {
        let mut payload = Map::new();
        payload.insert("sensor".into(), Value::String("light".into()));
        let result = DryRunExecutor.execute("sensor_read", &payload).await.unwrap();
        assert_eq!(result["action"], "sensor_read");
        assert_eq!(result["payload"]["sensor"], "light");
        assert_eq!(result["dry_run"], true);
    }
}
