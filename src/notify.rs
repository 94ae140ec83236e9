//! Side-channel notifications sent after a node completes.
//!
//! Delivery is fire-and-forget: the engine spawns the call and only logs a
//! failure, the node outcome never depends on it.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::{FlowError, Result, model::NotifyTarget};

/// Payload handed to a [`Notifier`].
#[derive(Serialize, Debug, Clone)]
pub struct Notification {
    pub execution_id: String,
    pub flow_id: String,
    pub tenant_id: String,
    pub node_id: String,
    pub status: String,
    pub output: Value,
    #[serde(rename = "customAttributes")]
    pub custom_attributes: Map<String, Value>,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(
        &self,
        target: &NotifyTarget,
        notification: &Notification,
    ) -> Result<()>;
}

/// Drops every notification.
#[derive(Debug, Default, Clone)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(
        &self,
        target: &NotifyTarget,
        notification: &Notification,
    ) -> Result<()> {
        debug!(?target, node_id = %notification.node_id, "notification dropped");
        Ok(())
    }
}

/// Posts notifications as JSON.
///
/// Webhook targets receive the notification at their url. Email targets go
/// to the email relay, when one is configured, as `{ "to": ..., "notification": ... }`.
#[derive(Debug, Clone, Default)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    email_relay: Option<String>,
}

impl WebhookNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_email_relay(
        mut self,
        url: &str,
    ) -> Self {
        self.email_relay = Some(url.to_string());
        self
    }

    async fn post(
        &self,
        url: &str,
        body: &Value,
    ) -> Result<()> {
        let response = self.client.post(url).json(body).send().await.map_err(|e| FlowError::Action(format!("notify {} failed: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(FlowError::Action(format!("notify {} returned {}", url, response.status())));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(
        &self,
        target: &NotifyTarget,
        notification: &Notification,
    ) -> Result<()> {
        match target {
            NotifyTarget::Webhook {
                url,
            } => self.post(url, &serde_json::to_value(notification)?).await,
            NotifyTarget::Email {
                to,
            } => match &self.email_relay {
                Some(relay) => self.post(relay, &json!({ "to": to, "notification": notification })).await,
                None => Err(FlowError::Action(format!("no email relay configured, dropping mail to {}", to))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification() -> Notification {
        Notification {
            execution_id: "e1".to_string(),
            flow_id: "f1".to_string(),
            tenant_id: "t1".to_string(),
            node_id: "review".to_string(),
            status: "completed".to_string(),
            output: json!({"score": 90}),
            custom_attributes: Map::new(),
        }
    }

    #[tokio::test]
    async fn test_email_without_relay_is_error() {
        let notifier = WebhookNotifier::new();
        let target = NotifyTarget::Email {
            to: "ops@example.com".to_string(),
        };
        assert!(notifier.notify(&target, &notification()).await.is_err());
    }

    #[tokio::test]
    async fn test_noop_notifier() {
        let target = NotifyTarget::Webhook {
            url: "http://localhost/hook".to_string(),
        };
        assert!(NoopNotifier.notify(&target, &notification()).await.is_ok());
    }
}
