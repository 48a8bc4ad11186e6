//! Core domain types and service traits for the alert dispatcher
//!
//! This module defines the data carried alongside every alert and the trait
//! contracts that govern how the dispatcher talks to its channels and to the
//! configuration store.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The product name used in every rendered header and subject line.
pub const PRODUCT_NAME: &str = "Errsole";

/// Store key holding the chat webhook integration settings.
pub const CHAT_CONFIG_KEY: &str = "chatIntegration";

/// Store key holding the email integration settings.
pub const EMAIL_CONFIG_KEY: &str = "emailIntegration";

/// The kind of alert being sent. Interpolated into headers and subjects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertType {
    /// An alert raised from the log pipeline.
    Alert,
    /// A process-level uncaught exception.
    UncaughtException,
    /// An operator-initiated test of a single channel.
    Test,
    /// Any other label supplied by the caller.
    Custom(String),
}

impl fmt::Display for AlertType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertType::Alert => f.write_str("Alert"),
            AlertType::UncaughtException => f.write_str("Uncaught Exception"),
            AlertType::Test => f.write_str("Test"),
            AlertType::Custom(label) => f.write_str(label),
        }
    }
}

impl From<&str> for AlertType {
    fn from(label: &str) -> Self {
        match label {
            "Alert" => AlertType::Alert,
            "Uncaught Exception" | "UncaughtException" => AlertType::UncaughtException,
            "Test" => AlertType::Test,
            other => AlertType::Custom(other.to_string()),
        }
    }
}

/// Optional metadata used to enrich a rendered alert.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
}

impl AlertContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    pub fn with_environment_name(mut self, name: impl Into<String>) -> Self {
        self.environment_name = Some(name.into());
        self
    }

    pub fn with_server_name(mut self, name: impl Into<String>) -> Self {
        self.server_name = Some(name.into());
        self
    }

    /// The application name, if present and non-empty.
    pub fn app(&self) -> Option<&str> {
        non_empty(&self.app_name)
    }

    /// The environment name, if present and non-empty.
    pub fn environment(&self) -> Option<&str> {
        non_empty(&self.environment_name)
    }

    /// The server name, if present and non-empty.
    pub fn server(&self) -> Option<&str> {
        non_empty(&self.server_name)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

// =============================================================================
// Configuration Store
// =============================================================================

/// A stored configuration record as returned by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigEntry {
    /// `None` means the key exists but holds nothing, which callers treat
    /// exactly like a missing key.
    pub item: Option<ConfigItem>,
}

/// The serialized value of a stored configuration record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigItem {
    /// JSON-encoded channel settings.
    pub value: String,
}

impl ConfigEntry {
    /// Wraps an already-encoded value.
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            item: Some(ConfigItem {
                value: value.into(),
            }),
        }
    }

    /// Returns the encoded value, if any.
    pub fn value(&self) -> Option<&str> {
        self.item.as_ref().map(|item| item.value.as_str())
    }
}

/// Read access to persisted integration settings.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Looks up a configuration record by key.
    ///
    /// # Returns
    /// * `Ok(Some(entry))` when the key is known (its `item` may still be empty)
    /// * `Ok(None)` when the key is not configured
    /// * `Err` if the store itself could not be read
    async fn get_config(&self, key: &str) -> Result<Option<ConfigEntry>>;
}

// =============================================================================
// Channels
// =============================================================================

/// An outbound alert delivery mechanism.
///
/// Implementations absorb their own failures and report them as `Ok(false)`.
/// An `Err` signals a broken contract and is handled by the dispatcher.
#[async_trait]
pub trait AlertChannel: Send + Sync {
    /// A short name for the channel (e.g., "chat", "email"), used in logs and metrics.
    fn name(&self) -> &str;

    /// Sends one alert.
    ///
    /// # Returns
    /// * `Ok(true)` if the alert was delivered before the send timeout
    /// * `Ok(false)` for every handled failure (disabled, misconfigured, timed out...)
    async fn send(
        &self,
        message: &str,
        alert_type: &AlertType,
        context: &AlertContext,
    ) -> Result<bool>;

    /// Drops any cached connection state. Channels without state report success.
    async fn reset(&self) -> bool {
        true
    }
}
