#![allow(dead_code)]

use errsole_alerts::store::MemoryConfigStore;
use errsole_alerts::{CHAT_CONFIG_KEY, EMAIL_CONFIG_KEY};
use serde_json::{json, Value};
use std::sync::Arc;

/// Email settings that pass validation; the transport is always mocked.
pub fn valid_email_config() -> Value {
    json!({
        "status": true,
        "host": "smtp.example.com",
        "port": 587,
        "username": "alerts",
        "password": "secret",
        "sender": "alerts@example.com",
        "receivers": ["ops@example.com", "oncall@example.com"]
    })
}

/// Creates a memory store holding the given channel settings.
pub fn store_with(chat: Option<Value>, email: Option<Value>) -> Arc<MemoryConfigStore> {
    let store = Arc::new(MemoryConfigStore::new());
    if let Some(chat) = chat {
        store.set(CHAT_CONFIG_KEY, chat.to_string()).unwrap();
    }
    if let Some(email) = email {
        store.set(EMAIL_CONFIG_KEY, email.to_string()).unwrap();
    }
    store
}
