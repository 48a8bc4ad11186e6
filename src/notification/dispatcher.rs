//! The dispatcher is the public entry point for sending alerts. It fans an
//! alert out to the chat and email channels and folds their outcomes into a
//! single boolean.

use crate::config::{Config, DispatchPolicy};
use crate::core::{AlertChannel, AlertContext, AlertType, ConfigStore};
use crate::notification::{ChatChannel, EmailChannel};
use std::sync::Arc;
use tracing::{debug, error};

/// Sends alerts to the chat and email channels.
pub struct AlertDispatcher {
    chat: Arc<dyn AlertChannel>,
    email: Arc<dyn AlertChannel>,
    policy: DispatchPolicy,
}

impl AlertDispatcher {
    /// Creates a new `AlertDispatcher` over the given channels.
    pub fn new(chat: Arc<dyn AlertChannel>, email: Arc<dyn AlertChannel>) -> Self {
        Self {
            chat,
            email,
            policy: DispatchPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DispatchPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Builds the production channels reading settings from `store`.
    pub fn from_config(store: Arc<dyn ConfigStore>, config: &Config) -> anyhow::Result<Self> {
        let timeout = config.dispatch.timeout();
        let chat = ChatChannel::new(store.clone())?.with_timeout(timeout);
        let email = EmailChannel::new(store, config.smtp.clone()).with_timeout(timeout);
        Ok(Self::new(Arc::new(chat), Arc::new(email)).with_policy(config.dispatch.policy))
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// Sends a log-triggered alert to every channel.
    pub async fn dispatch_alert(&self, message: &str, context: &AlertContext) -> bool {
        self.dispatch(message, &AlertType::Alert, context).await
    }

    /// Sends an uncaught-exception alert to every channel.
    pub async fn dispatch_exception_alert(&self, message: &str, context: &AlertContext) -> bool {
        self.dispatch(message, &AlertType::UncaughtException, context)
            .await
    }

    /// Sends a test alert through the chat channel only.
    pub async fn test_chat_alert(&self, message: &str, context: &AlertContext) -> bool {
        self.send_single(self.chat.as_ref(), message, context).await
    }

    /// Sends a test alert through the email channel only.
    pub async fn test_email_alert(&self, message: &str, context: &AlertContext) -> bool {
        self.send_single(self.email.as_ref(), message, context).await
    }

    /// Drops the cached email transport. Always succeeds.
    pub async fn reset_email_transport(&self) -> bool {
        self.email.reset().await
    }

    /// Sends one alert to the chat channel, then the email channel.
    pub async fn dispatch(&self, message: &str, alert_type: &AlertType, context: &AlertContext) -> bool {
        debug!(%alert_type, policy = ?self.policy, "Dispatching alert");
        match self.policy {
            DispatchPolicy::ShortCircuit => self.dispatch_short_circuit(message, alert_type, context).await,
            DispatchPolicy::Independent => self.dispatch_independent(message, alert_type, context).await,
        }
    }

    /// A channel error aborts the dispatch; channel booleans are not consulted.
    async fn dispatch_short_circuit(
        &self,
        message: &str,
        alert_type: &AlertType,
        context: &AlertContext,
    ) -> bool {
        for channel in [&self.chat, &self.email] {
            if let Err(e) = channel.send(message, alert_type, context).await {
                error!(channel = channel.name(), error = %e, "Alert dispatch failed");
                return false;
            }
        }
        true
    }

    /// Every channel is attempted; at least one must deliver.
    async fn dispatch_independent(
        &self,
        message: &str,
        alert_type: &AlertType,
        context: &AlertContext,
    ) -> bool {
        let mut delivered = false;
        for channel in [&self.chat, &self.email] {
            match channel.send(message, alert_type, context).await {
                Ok(sent) => delivered |= sent,
                Err(e) => {
                    error!(channel = channel.name(), error = %e, "Alert channel failed");
                }
            }
        }
        delivered
    }

    async fn send_single(&self, channel: &dyn AlertChannel, message: &str, context: &AlertContext) -> bool {
        match channel.send(message, &AlertType::Test, context).await {
            Ok(sent) => sent,
            Err(e) => {
                error!(channel = channel.name(), error = %e, "Test alert failed");
                false
            }
        }
    }
}
