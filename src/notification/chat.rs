//! A client for posting alerts to a chat webhook (Slack-compatible Block Kit).

use crate::config::ChatChannelConfig;
use crate::core::{AlertChannel, AlertContext, AlertType, ConfigStore, CHAT_CONFIG_KEY};
use crate::formatting::render_chat_payload;
use crate::notification::{
    load_channel_config, race_with_timeout, report_outcome, ChannelError, DEFAULT_SEND_TIMEOUT,
};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Sends alerts to the webhook configured under `chatIntegration`.
///
/// The client holds no channel settings of its own; they are read from the
/// store on every send.
pub struct ChatChannel {
    store: Arc<dyn ConfigStore>,
    client: reqwest::Client,
    timeout: Duration,
}

impl ChatChannel {
    /// Creates a new `ChatChannel` with the default five second timeout.
    pub fn new(store: Arc<dyn ConfigStore>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self::with_client(store, client))
    }

    /// Creates a `ChatChannel` around an existing HTTP client.
    pub fn with_client(store: Arc<dyn ConfigStore>, client: reqwest::Client) -> Self {
        Self {
            store,
            client,
            timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn try_send(
        &self,
        message: &str,
        alert_type: &AlertType,
        context: &AlertContext,
    ) -> Result<(), ChannelError> {
        let config: ChatChannelConfig =
            load_channel_config(self.store.as_ref(), CHAT_CONFIG_KEY).await?;
        if !config.is_enabled() {
            return Err(ChannelError::ChannelDisabled("chat"));
        }

        let webhook_url = config
            .webhook_url
            .clone()
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ChannelError::ConfigMalformed {
                key: CHAT_CONFIG_KEY,
                reason: "missing webhook url".to_string(),
            })?;

        let mut payload = render_chat_payload(message, alert_type, context);
        payload["username"] = Value::from(config.display_name());
        payload["icon_url"] = Value::from(config.icon_url());

        debug!(url = %webhook_url, "Posting alert to chat webhook");
        let client = self.client.clone();
        race_with_timeout(Self::post(client, webhook_url, payload), self.timeout).await
    }

    /// Posts the payload and checks the response status.
    async fn post(
        client: reqwest::Client,
        webhook_url: String,
        payload: Value,
    ) -> Result<(), ChannelError> {
        let response = client
            .post(&webhook_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ChannelError::SendTransport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(ChannelError::SendTransport(format!(
                "status {}, body: {}",
                status, body
            )))
        }
    }
}

#[async_trait]
impl AlertChannel for ChatChannel {
    fn name(&self) -> &str {
        "chat"
    }

    #[instrument(skip(self, message, alert_type, context), fields(alert_type = %alert_type))]
    async fn send(
        &self,
        message: &str,
        alert_type: &AlertType,
        context: &AlertContext,
    ) -> anyhow::Result<bool> {
        let result = self.try_send(message, alert_type, context).await;
        Ok(report_outcome("chat", result))
    }
}
