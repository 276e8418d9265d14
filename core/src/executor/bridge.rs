//! HTTP bridge executor
//!
//! Forwards native actions to a device-side bridge process over HTTP. The
//! bridge accepts `{"action": ..., "payload": {...}}` and answers with
//! `{"result": ...}` or `{"error": "..."}`.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};

use super::ActionExecutor;

pub struct HttpBridgeExecutor {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpBridgeExecutor {
    /// Build an executor for the given bridge endpoint.
    ///
    /// The endpoint must be a non-empty http(s) URL; validating here keeps
    /// a misconfigured bridge from surfacing as a confusing mid-turn error.
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        if endpoint.is_empty() {
            bail!("bridge endpoint cannot be empty");
        }
        if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
            bail!("bridge endpoint must start with http:// or https://");
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .user_agent("handsfree/0.2")
            .build()
            .context("failed to build bridge HTTP client")?;

        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl ActionExecutor for HttpBridgeExecutor {
    async fn execute(&self, action: &str, payload: &Map<String, Value>) -> Result<Value> {
        let url = format!("{}/action", self.endpoint);
        let body = serde_json::json!({
            "action": action,
            "payload": payload,
        });

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("bridge request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!("bridge returned {}", status.as_u16());
        }

        let value: Value = response
            .json()
            .await
            .context("bridge returned non-JSON body")?;

        if let Some(error) = value.get("error").and_then(Value::as_str) {
            bail!("bridge error: {error}");
        }

        Ok(value.get("result").cloned().unwrap_or(value))
    }
}
