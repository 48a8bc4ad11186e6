//! Configuration management for the alert dispatcher
//!
//! This module defines the main `Config` struct holding the application-level
//! settings (logging, where the integration store lives, send timeouts and
//! SMTP pool limits). It uses the `figment` crate to layer defaults, an
//! `errsole-alerts.toml` file, environment variables and command-line
//! arguments.
//!
//! Per-channel integration settings are not part of this file; they live in
//! the config store and are decoded on every send (see [`channel`]).

pub mod channel;

use crate::cli::Cli;
use anyhow::Result;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub use channel::{ChatChannelConfig, EmailChannelConfig};

/// Default configuration file, used when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "errsole-alerts.toml";

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// Where integration settings are read from.
    pub store: StoreConfig,
    /// How alerts are fanned out to channels.
    pub dispatch: DispatchConfig,
    /// Limits for the pooled SMTP transport.
    pub smtp: SmtpPoolConfig,
}

/// Configuration for the integration settings store.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StoreConfig {
    /// Path to the JSON file holding `chatIntegration` / `emailIntegration`.
    pub path: PathBuf,
}

/// How a dispatch combines its channels.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPolicy {
    /// Chat first; a broken chat channel aborts the dispatch before email.
    /// Succeeds when neither channel broke its contract.
    #[default]
    ShortCircuit,
    /// Both channels are always attempted. Succeeds when at least one delivered.
    Independent,
}

/// Configuration for alert dispatch.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Per-channel send timeout in milliseconds.
    pub timeout_ms: u64,
    pub policy: DispatchPolicy,
}

impl DispatchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Limits applied to the pooled SMTP transport.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SmtpPoolConfig {
    /// Maximum number of open SMTP connections.
    pub max_connections: u32,
    /// Maximum number of messages in flight at once.
    pub max_messages: usize,
    /// Maximum number of messages started per second.
    pub rate_limit_per_second: u32,
}

impl Default for SmtpPoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            max_messages: 100,
            rate_limit_per_second: 10,
        }
    }
}

impl Config {
    /// Builds the layered figment: defaults, file, environment, then CLI.
    pub fn figment(cli: &Cli) -> Figment {
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_path))
            // e.g., ERRSOLE_DISPATCH__TIMEOUT_MS=2000
            .merge(Env::prefixed("ERRSOLE_").split("__"))
            .merge(cli.clone())
    }

    /// Loads the application configuration for the given command line.
    pub fn load(cli: &Cli) -> Result<Self> {
        let config: Config = Self::figment(cli).extract()?;
        Ok(config)
    }
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            store: StoreConfig {
                path: PathBuf::from("errsole-config.json"),
            },
            dispatch: DispatchConfig {
                timeout_ms: 5_000,
                policy: DispatchPolicy::ShortCircuit,
            },
            smtp: SmtpPoolConfig::default(),
        }
    }
}
