//! Per-channel integration settings, decoded from the config store.
//!
//! Field names follow the stored format (`status`, `url`, `receivers`, ...)
//! with aliases for the descriptive spellings.

use serde::Deserialize;
use serde_json::Value;
use serde_with::{formats::PreferMany, serde_as, DisplayFromStr, OneOrMany, PickFirst};

/// Display name posted with chat messages when none is configured.
pub const DEFAULT_CHAT_USERNAME: &str = "Errsole";

/// Avatar posted with chat messages when none is configured.
pub const DEFAULT_CHAT_ICON_URL: &str = "https://avatars.githubusercontent.com/u/84983840";

/// Settings for the chat webhook channel.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ChatChannelConfig {
    /// Only a JSON `false` disables the channel; any other value, or none, leaves it on.
    #[serde(default, rename = "status", alias = "enabled")]
    pub enabled: Option<Value>,
    #[serde(default, rename = "url", alias = "webhookUrl")]
    pub webhook_url: Option<String>,
    #[serde(default, rename = "username", alias = "displayName")]
    pub display_name: Option<String>,
    #[serde(default, rename = "icon_url", alias = "iconUrl")]
    pub icon_url: Option<String>,
}

impl ChatChannelConfig {
    pub fn is_enabled(&self) -> bool {
        !matches!(self.enabled, Some(Value::Bool(false)))
    }

    pub fn display_name(&self) -> &str {
        self.display_name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_CHAT_USERNAME)
    }

    pub fn icon_url(&self) -> &str {
        self.icon_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .unwrap_or(DEFAULT_CHAT_ICON_URL)
    }
}

/// Settings for the email channel.
#[serde_as]
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EmailChannelConfig {
    /// Only a JSON `false` disables the channel; any other value, or none, leaves it on.
    #[serde(default, rename = "status", alias = "enabled")]
    pub enabled: Option<Value>,
    pub host: String,
    /// Accepts both `587` and `"587"`.
    #[serde_as(as = "PickFirst<(_, DisplayFromStr)>")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub sender: Option<String>,
    #[serde_as(as = "OneOrMany<_, PreferMany>")]
    #[serde(default, rename = "receivers", alias = "recipients")]
    pub recipients: Vec<String>,
}

impl EmailChannelConfig {
    pub fn is_enabled(&self) -> bool {
        !matches!(self.enabled, Some(Value::Bool(false)))
    }

    /// Port 465 is implicit TLS; everything else negotiates STARTTLS.
    pub fn is_implicit_tls(&self) -> bool {
        self.port == 465
    }

    /// Recipient addresses with comma-separated entries split out.
    pub fn recipient_list(&self) -> Vec<&str> {
        self.recipients
            .iter()
            .flat_map(|entry| entry.split(','))
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .collect()
    }
}
