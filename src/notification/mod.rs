//! Handles the dispatching of alerts to the notification channels.
//!
//! Each channel client fetches its settings from the config store on every
//! send, renders its own payload and races delivery against a timeout. Every
//! failure inside a channel is absorbed and reported as `false`; the
//! [`dispatcher`] combines the per-channel results.
pub mod chat;
pub mod dispatcher;
pub mod email;

use crate::core::ConfigStore;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub use chat::ChatChannel;
pub use dispatcher::AlertDispatcher;
pub use email::EmailChannel;

/// Default bound on a single channel send.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("{0} is not configured")]
    ConfigMissing(&'static str),

    #[error("{key} configuration is malformed: {reason}")]
    ConfigMalformed { key: &'static str, reason: String },

    #[error("{0} channel is disabled")]
    ChannelDisabled(&'static str),

    #[error("failed to initialize transport: {0}")]
    TransportInit(String),

    #[error("send timed out after {0:?}")]
    SendTimeout(Duration),

    #[error("send failed: {0}")]
    SendTransport(String),

    #[error("unexpected failure: {0}")]
    Unexpected(String),
}

impl ChannelError {
    /// Label used for the `outcome` metric dimension.
    pub fn kind(&self) -> &'static str {
        match self {
            ChannelError::ConfigMissing(_) => "config_missing",
            ChannelError::ConfigMalformed { .. } => "config_malformed",
            ChannelError::ChannelDisabled(_) => "disabled",
            ChannelError::TransportInit(_) => "transport_init_failure",
            ChannelError::SendTimeout(_) => "timeout",
            ChannelError::SendTransport(_) => "transport_error",
            ChannelError::Unexpected(_) => "unexpected",
        }
    }
}

/// Fetches and decodes a channel's settings from the store.
///
/// A store error, a missing key and an empty item all mean "not configured".
pub(crate) async fn load_channel_config<T: DeserializeOwned>(
    store: &dyn ConfigStore,
    key: &'static str,
) -> Result<T, ChannelError> {
    let entry = match store.get_config(key).await {
        Ok(entry) => entry,
        Err(e) => {
            warn!(key, error = %e, "Failed to read integration settings from store");
            return Err(ChannelError::ConfigMissing(key));
        }
    };

    let value = entry
        .as_ref()
        .and_then(|entry| entry.value())
        .ok_or(ChannelError::ConfigMissing(key))?;

    serde_json::from_str(value).map_err(|e| ChannelError::ConfigMalformed {
        key,
        reason: e.to_string(),
    })
}

/// Runs `operation` on its own task and waits at most `limit` for it.
///
/// On timeout the task is detached, not cancelled: whatever it eventually
/// produces is discarded.
pub(crate) async fn race_with_timeout<F, T>(operation: F, limit: Duration) -> Result<T, ChannelError>
where
    F: Future<Output = Result<T, ChannelError>> + Send + 'static,
    T: Send + 'static,
{
    let handle = tokio::spawn(operation);
    match tokio::time::timeout(limit, handle).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_error)) => Err(ChannelError::Unexpected(join_error.to_string())),
        Err(_) => Err(ChannelError::SendTimeout(limit)),
    }
}

/// Converts a channel result into the boolean reported to callers,
/// logging and counting the outcome.
pub(crate) fn report_outcome(channel: &'static str, result: Result<(), ChannelError>) -> bool {
    let outcome = match &result {
        Ok(()) => "delivered",
        Err(e) => e.kind(),
    };
    metrics::counter!("alert_channel_sends_total", "channel" => channel, "outcome" => outcome)
        .increment(1);

    match result {
        Ok(()) => {
            info!(channel, "Alert delivered");
            true
        }
        Err(e @ ChannelError::ChannelDisabled(_)) => {
            info!(channel, "{}", e);
            false
        }
        Err(e) => {
            warn!(channel, error = %e, "Failed to deliver alert");
            false
        }
    }
}
