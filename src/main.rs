//! errsole-alerts - send alerts to the configured chat and email integrations
//!
//! Loads the layered configuration, points the dispatcher at the JSON
//! integration store and runs a single dispatch or channel test.

use anyhow::Result;
use clap::Parser;
use errsole_alerts::{
    cli::{Cli, Command},
    config::Config,
    store::JsonFileConfigStore,
    AlertDispatcher,
};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            // Manually initialize logging for this specific error
            let _ = tracing_subscriber::fmt().with_writer(std::io::stderr).try_init();
            error!("Failed to load configuration: {}", err);
            return ExitCode::from(2);
        }
    };

    // RUST_LOG wins over the configured level when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match run(&cli, &config).await {
        Ok(true) => {
            println!("true");
            ExitCode::SUCCESS
        }
        Ok(false) => {
            println!("false");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("Failed to start dispatcher: {:#}", err);
            ExitCode::from(2)
        }
    }
}

async fn run(cli: &Cli, config: &Config) -> Result<bool> {
    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Integration Store: {}", config.store.path.display());
    info!("Send Timeout: {}ms", config.dispatch.timeout_ms);
    info!("Dispatch Policy: {:?}", config.dispatch.policy);
    info!(
        "SMTP Pool: {} connections, {} in flight, {}/s",
        config.smtp.max_connections, config.smtp.max_messages, config.smtp.rate_limit_per_second
    );
    info!("-------------------------------------------------------");

    let store = Arc::new(JsonFileConfigStore::new(config.store.path.clone()));
    let dispatcher = AlertDispatcher::from_config(store, config)?;

    let args = cli.command.args();
    let context = args.context();
    let delivered = match &cli.command {
        Command::Alert(_) => dispatcher.dispatch_alert(&args.message, &context).await,
        Command::Exception(_) => {
            dispatcher
                .dispatch_exception_alert(&args.message, &context)
                .await
        }
        Command::TestChat(_) => dispatcher.test_chat_alert(&args.message, &context).await,
        Command::TestEmail(_) => dispatcher.test_email_alert(&args.message, &context).await,
    };

    info!(
        alert_type = %cli.command.alert_type(),
        delivered,
        "Dispatch finished"
    );
    Ok(delivered)
}
