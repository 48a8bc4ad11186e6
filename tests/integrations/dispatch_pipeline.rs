//! End-to-end tests for the alert dispatcher, wiring the real chat and email
//! channels to a mock webhook, a mock mail transport and an in-memory store.

use anyhow::Result;
use async_trait::async_trait;
use errsole_alerts::config::DispatchPolicy;
use errsole_alerts::notification::{ChatChannel, EmailChannel};
use errsole_alerts::{
    AlertChannel, AlertContext, AlertDispatcher, AlertType, CHAT_CONFIG_KEY, EMAIL_CONFIG_KEY,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[path = "../helpers/mod.rs"]
mod helpers;

use helpers::mock_chat::{start_webhook, webhook_url};
use helpers::mock_mail::MockMailFactory;
use helpers::{store_with, valid_email_config};

fn dispatcher_for(
    store: Arc<errsole_alerts::store::MemoryConfigStore>,
    factory: Arc<MockMailFactory>,
) -> AlertDispatcher {
    let chat = ChatChannel::new(store.clone()).unwrap();
    let email = EmailChannel::with_factory(store, factory);
    AlertDispatcher::new(Arc::new(chat), Arc::new(email))
}

/// A chat channel that breaks the channel contract by returning an error.
struct BrokenChannel;

#[async_trait]
impl AlertChannel for BrokenChannel {
    fn name(&self) -> &str {
        "chat"
    }

    async fn send(&self, _: &str, _: &AlertType, _: &AlertContext) -> Result<bool> {
        anyhow::bail!("chat client crashed")
    }
}

/// Counts calls while delegating to a real channel.
struct CountingChannel<C> {
    inner: C,
    calls: AtomicUsize,
}

#[async_trait]
impl<C: AlertChannel> AlertChannel for CountingChannel<C> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn send(&self, message: &str, alert_type: &AlertType, context: &AlertContext) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.send(message, alert_type, context).await
    }
}

#[tokio::test]
async fn test_chat_test_alert_delivers() -> Result<()> {
    let server = start_webhook(200, 1).await;
    let store = store_with(Some(json!({ "status": true, "url": webhook_url(&server) })), None);
    let factory = Arc::new(MockMailFactory::default());
    let dispatcher = dispatcher_for(store, factory.clone());

    assert!(dispatcher.test_chat_alert("ping", &AlertContext::new()).await);
    assert_eq!(factory.builds(), 0, "email must not be touched by a chat test");
    Ok(())
}

#[tokio::test]
async fn test_broken_chat_aborts_dispatch_before_email() -> Result<()> {
    let store = store_with(None, Some(valid_email_config()));
    let factory = Arc::new(MockMailFactory::default());
    let email = Arc::new(CountingChannel {
        inner: EmailChannel::with_factory(store, factory.clone()),
        calls: AtomicUsize::new(0),
    });
    let dispatcher = AlertDispatcher::new(Arc::new(BrokenChannel), email.clone());

    assert!(!dispatcher.dispatch_alert("boom", &AlertContext::new()).await);
    assert_eq!(email.calls.load(Ordering::SeqCst), 0);
    assert!(factory.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_email_alert_rendering_end_to_end() -> Result<()> {
    let store = store_with(None, Some(valid_email_config()));
    let factory = Arc::new(MockMailFactory::default());
    let dispatcher = dispatcher_for(store, factory.clone());
    let context = AlertContext::new()
        .with_app_name("App")
        .with_environment_name("Env");

    // Chat is not configured, email is: the dispatch still completes.
    assert!(dispatcher.dispatch_alert("boom", &context).await);

    let sent = factory.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Errsole: Alert (App app, Env environment)");
    assert_eq!(sent[0].body, "App Name: App\nEnvironment Name: Env\n\nboom");
    assert_eq!(
        sent[0].to,
        vec!["ops@example.com".to_string(), "oncall@example.com".to_string()]
    );
    Ok(())
}

#[tokio::test]
async fn test_exception_alert_reaches_both_channels() -> Result<()> {
    let server = start_webhook(200, 1).await;
    let store = store_with(
        Some(json!({ "url": webhook_url(&server) })),
        Some(valid_email_config()),
    );
    let factory = Arc::new(MockMailFactory::default());
    let dispatcher = dispatcher_for(store, factory.clone());
    let context = AlertContext::new().with_server_name("web-1");

    assert!(
        dispatcher
            .dispatch_exception_alert("TypeError: x is undefined", &context)
            .await
    );

    let sent = factory.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Errsole: Uncaught Exception");
    assert_eq!(sent[0].body, "Server Name: web-1\n\nTypeError: x is undefined");
    Ok(())
}

#[tokio::test]
async fn test_disabled_channels_make_no_attempts() -> Result<()> {
    let server = start_webhook(200, 0).await;
    let mut email = valid_email_config();
    email["status"] = json!(false);
    let store = store_with(
        Some(json!({ "status": false, "url": webhook_url(&server) })),
        Some(email),
    );
    let factory = Arc::new(MockMailFactory::default());
    let dispatcher = dispatcher_for(store, factory.clone());

    assert!(!dispatcher.test_chat_alert("ping", &AlertContext::new()).await);
    assert!(!dispatcher.test_email_alert("ping", &AlertContext::new()).await);
    assert!(factory.sent().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_unconfigured_channels_report_false() -> Result<()> {
    let store = store_with(None, None);
    let factory = Arc::new(MockMailFactory::default());
    let dispatcher = dispatcher_for(store.clone(), factory.clone());

    assert!(!dispatcher.test_chat_alert("ping", &AlertContext::new()).await);
    assert!(!dispatcher.test_email_alert("ping", &AlertContext::new()).await);

    store.set_entry(CHAT_CONFIG_KEY, Default::default())?;
    store.set_entry(EMAIL_CONFIG_KEY, Default::default())?;
    assert!(!dispatcher.test_chat_alert("ping", &AlertContext::new()).await);
    assert!(!dispatcher.test_email_alert("ping", &AlertContext::new()).await);
    assert_eq!(factory.builds(), 0);
    Ok(())
}

#[tokio::test]
async fn test_reset_rebuilds_transport_with_new_settings() -> Result<()> {
    let store = store_with(None, Some(valid_email_config()));
    let factory = Arc::new(MockMailFactory::default());
    let dispatcher = dispatcher_for(store.clone(), factory.clone());

    assert!(dispatcher.test_email_alert("one", &AlertContext::new()).await);

    let mut moved = valid_email_config();
    moved["host"] = json!("smtp.internal");
    moved["port"] = json!("465");
    store.set(EMAIL_CONFIG_KEY, moved.to_string())?;

    // Without a reset the cached transport keeps the old host.
    assert!(dispatcher.test_email_alert("two", &AlertContext::new()).await);
    assert_eq!(factory.builds(), 1);

    assert!(dispatcher.reset_email_transport().await);
    assert!(dispatcher.reset_email_transport().await);
    assert!(dispatcher.test_email_alert("three", &AlertContext::new()).await);
    assert_eq!(factory.builds(), 2);

    let config = factory.last_config.lock().unwrap().clone().unwrap();
    assert_eq!(config.host, "smtp.internal");
    assert!(config.is_implicit_tls());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_slow_email_times_out() -> Result<()> {
    let store = store_with(None, Some(valid_email_config()));
    let factory = Arc::new(MockMailFactory::with_delay(Duration::from_secs(30)));
    let dispatcher = dispatcher_for(store, factory.clone());

    assert!(!dispatcher.test_email_alert("slow", &AlertContext::new()).await);
    Ok(())
}

#[tokio::test]
async fn test_independent_policy_survives_broken_chat() -> Result<()> {
    let store = store_with(None, Some(valid_email_config()));
    let factory = Arc::new(MockMailFactory::default());
    let email = EmailChannel::with_factory(store, factory.clone());
    let dispatcher = AlertDispatcher::new(Arc::new(BrokenChannel), Arc::new(email))
        .with_policy(DispatchPolicy::Independent);

    assert!(dispatcher.dispatch_alert("boom", &AlertContext::new()).await);
    assert_eq!(factory.sent().len(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dispatches_share_one_transport() -> Result<()> {
    let store = store_with(None, Some(valid_email_config()));
    let factory = Arc::new(MockMailFactory::default());
    let dispatcher = Arc::new(dispatcher_for(store, factory.clone()));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let dispatcher = dispatcher.clone();
            tokio::spawn(async move {
                dispatcher
                    .test_email_alert(&format!("alert {}", i), &AlertContext::new())
                    .await
            })
        })
        .collect();
    for handle in handles {
        assert!(handle.await?);
    }

    assert_eq!(factory.builds(), 1);
    assert_eq!(factory.sent().len(), 20);
    Ok(())
}
