use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{Value, json};
use tracing::debug;

use super::{CapabilityInvoker, CapabilityRef, InvocationContext, InvocationError};

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Calls remote capabilities over HTTP.
///
/// Each invocation is a `POST {endpoint}/capabilities/{agent_id}/skills/{skill}`
/// with `{ "input": ..., "context": ... }` as the JSON body. The JSON response
/// body becomes the node output.
#[derive(Debug, Clone)]
pub struct HttpCapabilityInvoker {
    endpoint: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpCapabilityInvoker {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(
        &self,
        capability: &CapabilityRef,
    ) -> String {
        format!("{}/capabilities/{}/skills/{}", self.endpoint, capability.agent_id, capability.skill)
    }
}

/// 5xx, 408 and 429 are worth another attempt; other 4xx are not.
fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::TOO_MANY_REQUESTS
}

#[async_trait]
impl CapabilityInvoker for HttpCapabilityInvoker {
    async fn invoke(
        &self,
        capability: &CapabilityRef,
        input: Value,
        ctx: &InvocationContext,
    ) -> Result<Value, InvocationError> {
        let url = self.url(capability);
        debug!(%url, node_id = %ctx.node_id, attempt = ctx.attempt, "invoke remote capability");

        let response = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&json!({ "input": input, "context": ctx }))
            .send()
            .await
            .map_err(|e| InvocationError::retryable(format!("request to {} failed: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = format!("capability '{}' returned {}: {}", capability.agent_id, status, body);
            return Err(if is_retryable_status(status) { InvocationError::retryable(message) } else { InvocationError::terminal(message) });
        }

        response.json::<Value>().await.map_err(|e| InvocationError::terminal(format!("invalid response from capability '{}': {}", capability.agent_id, e)))
    }
}
