//! Email notifier backed by a lazily created, pooled SMTP transport.
//!
//! The transport is built from `emailIntegration` on the first send that finds
//! the cache empty and reused afterwards. Construction happens under the cache
//! lock, so concurrent first sends build exactly one transport. Sender,
//! recipients and the enabled flag are re-read from the store on every send.

use crate::config::{EmailChannelConfig, SmtpPoolConfig};
use crate::core::{AlertChannel, AlertContext, AlertType, ConfigStore, EMAIL_CONFIG_KEY};
use crate::formatting::render_email;
use crate::notification::{
    load_channel_config, race_with_timeout, report_outcome, ChannelError, DEFAULT_SEND_TIMEOUT,
};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::transport::smtp::PoolConfig;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument};

/// A fully rendered email, independent of the transport that delivers it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

/// Delivers rendered emails.
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn send_mail(&self, mail: OutgoingMail) -> Result<(), ChannelError>;
}

/// Builds a transport from the stored email settings.
pub trait MailTransportFactory: Send + Sync {
    fn build(&self, config: &EmailChannelConfig) -> Result<Arc<dyn MailTransport>, ChannelError>;
}

// =============================================================================
// SMTP transport
// =============================================================================

/// Builds pooled [`SmtpMailer`]s with the configured limits.
#[derive(Debug, Clone, Default)]
pub struct SmtpTransportFactory {
    pool: SmtpPoolConfig,
}

impl SmtpTransportFactory {
    pub fn new(pool: SmtpPoolConfig) -> Self {
        Self { pool }
    }
}

impl MailTransportFactory for SmtpTransportFactory {
    fn build(&self, config: &EmailChannelConfig) -> Result<Arc<dyn MailTransport>, ChannelError> {
        Ok(Arc::new(SmtpMailer::new(config, &self.pool)?))
    }
}

/// An SMTP connection pool with bounded in-flight messages and a per-second
/// send cap.
pub struct SmtpMailer {
    inner: AsyncSmtpTransport<Tokio1Executor>,
    in_flight: Semaphore,
    limiter: RateLimiter,
}

impl SmtpMailer {
    pub fn new(config: &EmailChannelConfig, pool: &SmtpPoolConfig) -> Result<Self, ChannelError> {
        if config.host.is_empty() {
            return Err(ChannelError::TransportInit("missing SMTP host".to_string()));
        }

        let tls_parameters = TlsParameters::new(config.host.clone())
            .map_err(|e| ChannelError::TransportInit(format!("TLS configuration error: {}", e)))?;
        let tls = if config.is_implicit_tls() {
            Tls::Wrapper(tls_parameters)
        } else {
            Tls::Opportunistic(tls_parameters)
        };

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
            .port(config.port)
            .tls(tls)
            .pool_config(PoolConfig::new().max_size(pool.max_connections.max(1)));

        if let Some(username) = config.username.as_deref().filter(|u| !u.is_empty()) {
            builder = builder.credentials(Credentials::new(
                username.to_string(),
                config.password.clone().unwrap_or_default(),
            ));
        }

        debug!(
            host = %config.host,
            port = config.port,
            implicit_tls = config.is_implicit_tls(),
            "Created SMTP transport"
        );

        Ok(Self {
            inner: builder.build(),
            in_flight: Semaphore::new(pool.max_messages.clamp(1, Semaphore::MAX_PERMITS)),
            limiter: RateLimiter::new(pool.rate_limit_per_second),
        })
    }

    fn build_message(mail: &OutgoingMail) -> Result<Message, ChannelError> {
        let from: Mailbox = mail.from.parse().map_err(|e| {
            ChannelError::SendTransport(format!("invalid sender '{}': {}", mail.from, e))
        })?;

        let mut builder = Message::builder().from(from).subject(mail.subject.as_str());
        for recipient in &mail.to {
            let mailbox: Mailbox = recipient.parse().map_err(|e| {
                ChannelError::SendTransport(format!("invalid recipient '{}': {}", recipient, e))
            })?;
            builder = builder.to(mailbox);
        }

        builder
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| ChannelError::SendTransport(format!("failed to build email: {}", e)))
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send_mail(&self, mail: OutgoingMail) -> Result<(), ChannelError> {
        let message = Self::build_message(&mail)?;
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|e| ChannelError::Unexpected(e.to_string()))?;
        self.limiter.acquire().await;

        self.inner
            .send(message)
            .await
            .map(|_| ())
            .map_err(|e| ChannelError::SendTransport(e.to_string()))
    }
}

/// Sliding one-second window limiting how many sends may start.
struct RateLimiter {
    per_second: u32,
    started: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    const WINDOW: Duration = Duration::from_secs(1);

    fn new(per_second: u32) -> Self {
        Self {
            per_second,
            started: Mutex::new(VecDeque::new()),
        }
    }

    async fn acquire(&self) {
        // Zero disables the cap.
        if self.per_second == 0 {
            return;
        }
        loop {
            let wait = {
                let mut started = self.started.lock().await;
                let now = Instant::now();
                while started
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= Self::WINDOW)
                {
                    started.pop_front();
                }
                if started.len() < self.per_second as usize {
                    started.push_back(now);
                    return;
                }
                match started.front() {
                    Some(oldest) => (*oldest + Self::WINDOW).saturating_duration_since(now),
                    None => Duration::ZERO,
                }
            };
            tokio::time::sleep(wait).await;
        }
    }
}

// =============================================================================
// Email channel
// =============================================================================

/// Sends alerts by email using the settings stored under `emailIntegration`.
pub struct EmailChannel {
    store: Arc<dyn ConfigStore>,
    factory: Arc<dyn MailTransportFactory>,
    transport: Mutex<Option<Arc<dyn MailTransport>>>,
    timeout: Duration,
}

impl EmailChannel {
    /// Creates an `EmailChannel` that builds pooled SMTP transports.
    pub fn new(store: Arc<dyn ConfigStore>, pool: SmtpPoolConfig) -> Self {
        Self::with_factory(store, Arc::new(SmtpTransportFactory::new(pool)))
    }

    /// Creates an `EmailChannel` with a custom transport factory.
    pub fn with_factory(store: Arc<dyn ConfigStore>, factory: Arc<dyn MailTransportFactory>) -> Self {
        Self {
            store,
            factory,
            transport: Mutex::new(None),
            timeout: DEFAULT_SEND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether a transport is currently cached.
    pub async fn has_transport(&self) -> bool {
        self.transport.lock().await.is_some()
    }

    /// Drops the cached transport; the next send builds a new one.
    pub async fn reset_transport(&self) -> bool {
        let mut cached = self.transport.lock().await;
        if cached.take().is_some() {
            info!("Email transport cleared");
        }
        true
    }

    /// Returns the cached transport, building it first if the cache is empty.
    ///
    /// Settings are read before the cache lock is taken; only the synchronous
    /// build runs under it.
    async fn ensure_transport(&self) -> Result<Arc<dyn MailTransport>, ChannelError> {
        if let Some(transport) = self.transport.lock().await.as_ref() {
            return Ok(transport.clone());
        }

        let config: EmailChannelConfig =
            match load_channel_config(self.store.as_ref(), EMAIL_CONFIG_KEY).await {
                Ok(config) => config,
                Err(ChannelError::ConfigMalformed { reason, .. }) => {
                    error!(error = %reason, "Failed to create email transport");
                    return Err(ChannelError::TransportInit(reason));
                }
                Err(e) => return Err(e),
            };

        let mut cached = self.transport.lock().await;
        // Another send may have filled the cache while settings were loading.
        if let Some(transport) = cached.as_ref() {
            return Ok(transport.clone());
        }

        match self.factory.build(&config) {
            Ok(transport) => {
                info!(host = %config.host, port = config.port, "Email transport created");
                *cached = Some(transport.clone());
                Ok(transport)
            }
            Err(e) => {
                error!(error = %e, "Failed to create email transport");
                Err(e)
            }
        }
    }

    async fn try_send(
        &self,
        message: &str,
        alert_type: &AlertType,
        context: &AlertContext,
    ) -> Result<(), ChannelError> {
        let transport = self.ensure_transport().await?;

        // Settings may have changed since the transport was built.
        let config: EmailChannelConfig =
            load_channel_config(self.store.as_ref(), EMAIL_CONFIG_KEY).await?;
        if !config.is_enabled() {
            return Err(ChannelError::ChannelDisabled("email"));
        }

        let from = config
            .sender
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ChannelError::ConfigMalformed {
                key: EMAIL_CONFIG_KEY,
                reason: "missing sender".to_string(),
            })?;
        let to: Vec<String> = config
            .recipient_list()
            .into_iter()
            .map(str::to_string)
            .collect();
        if to.is_empty() {
            return Err(ChannelError::ConfigMalformed {
                key: EMAIL_CONFIG_KEY,
                reason: "no recipients".to_string(),
            });
        }

        let content = render_email(message, alert_type, context);
        let mail = OutgoingMail {
            from,
            to,
            subject: content.subject,
            body: content.body,
        };

        debug!(subject = %mail.subject, recipients = mail.to.len(), "Sending alert email");
        race_with_timeout(async move { transport.send_mail(mail).await }, self.timeout).await
    }
}

#[async_trait]
impl AlertChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    #[instrument(skip(self, message, alert_type, context), fields(alert_type = %alert_type))]
    async fn send(
        &self,
        message: &str,
        alert_type: &AlertType,
        context: &AlertContext,
    ) -> anyhow::Result<bool> {
        let result = self.try_send(message, alert_type, context).await;
        Ok(report_outcome("email", result))
    }

    async fn reset(&self) -> bool {
        self.reset_transport().await
    }
}
