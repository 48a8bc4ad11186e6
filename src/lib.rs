/// errsole-alerts - Chat and email alert dispatch
///
/// This library sends operational alerts (log-triggered alerts, uncaught
/// exceptions and operator test alerts) to a chat webhook and to email,
/// using per-channel settings read from a configuration store on every send.
pub mod notification;

pub mod cli;
pub mod config;
pub mod core;
pub mod formatting;
pub mod store;

// Re-export core types for convenience
pub use crate::core::*;
pub use notification::AlertDispatcher;
