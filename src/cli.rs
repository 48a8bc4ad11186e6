//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the `errsole-alerts.toml` file and environment variables.

use crate::config::DispatchPolicy;
use crate::core::{AlertContext, AlertType};
use clap::{Args, Parser, Subcommand, ValueEnum};
use figment::{
    value::{Dict, Map, Tag, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Send Errsole alerts to the configured chat and email integrations.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Path to the JSON file holding the integration settings.
    #[arg(long, value_name = "FILE", global = true)]
    pub store: Option<PathBuf>,

    /// Per-channel send timeout in milliseconds.
    #[arg(long, value_name = "MS", global = true)]
    pub timeout_ms: Option<u64>,

    /// How alerts are fanned out across channels.
    #[arg(long, value_enum, global = true)]
    pub policy: Option<PolicyArg>,

    /// Logging level (e.g., "debug", "info").
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Send an alert to every channel.
    Alert(AlertArgs),
    /// Send an uncaught-exception alert to every channel.
    Exception(AlertArgs),
    /// Send a test alert to the chat channel only.
    TestChat(AlertArgs),
    /// Send a test alert to the email channel only.
    TestEmail(AlertArgs),
}

impl Command {
    pub fn args(&self) -> &AlertArgs {
        match self {
            Command::Alert(args)
            | Command::Exception(args)
            | Command::TestChat(args)
            | Command::TestEmail(args) => args,
        }
    }

    pub fn alert_type(&self) -> AlertType {
        match self {
            Command::Alert(_) => AlertType::Alert,
            Command::Exception(_) => AlertType::UncaughtException,
            Command::TestChat(_) | Command::TestEmail(_) => AlertType::Test,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AlertArgs {
    /// The alert text.
    #[arg(short, long)]
    pub message: String,

    #[arg(long)]
    pub app_name: Option<String>,

    #[arg(long)]
    pub environment_name: Option<String>,

    #[arg(long)]
    pub server_name: Option<String>,
}

impl AlertArgs {
    pub fn context(&self) -> AlertContext {
        AlertContext {
            app_name: self.app_name.clone(),
            environment_name: self.environment_name.clone(),
            server_name: self.server_name.clone(),
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyArg {
    ShortCircuit,
    Independent,
}

impl From<PolicyArg> for DispatchPolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::ShortCircuit => DispatchPolicy::ShortCircuit,
            PolicyArg::Independent => DispatchPolicy::Independent,
        }
    }
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut dict = Dict::new();

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        let mut store = Dict::new();
        if let Some(path) = &self.store {
            store.insert("path".into(), Value::from(path.display().to_string()));
        }
        if !store.is_empty() {
            dict.insert("store".into(), Value::Dict(Tag::Default, store));
        }

        let mut dispatch = Dict::new();
        if let Some(timeout) = self.timeout_ms {
            dispatch.insert("timeout_ms".into(), Value::from(timeout));
        }
        if let Some(policy) = self.policy {
            let policy = match DispatchPolicy::from(policy) {
                DispatchPolicy::ShortCircuit => "short_circuit",
                DispatchPolicy::Independent => "independent",
            };
            dispatch.insert("policy".into(), Value::from(policy));
        }
        if !dispatch.is_empty() {
            dict.insert("dispatch".into(), Value::Dict(Tag::Default, dispatch));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
