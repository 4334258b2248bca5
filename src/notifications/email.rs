use async_trait::async_trait;
use lettre::{
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{
    config::EmailConfig,
    error::{AppError, Result},
    notifications::{Notification, Notifier},
};

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpNotifier {
    /// Build a STARTTLS transport, or `None` when email is disabled.
    pub fn new(config: &EmailConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let host = config
            .smtp_host
            .as_deref()
            .ok_or_else(|| AppError::Internal("email.smtp_host is required".to_string()))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| AppError::Internal(format!("Invalid SMTP relay: {}", e)))?
            .port(config.smtp_port);
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Some(Self {
            transport: builder.build(),
            from_address: config.from_address.clone(),
        }))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        let (subject, body) = render(notification);

        let message = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|e| AppError::Internal(format!("Invalid from address: {}", e)))?,
            )
            .to(notification
                .recipient()
                .parse()
                .map_err(|e| AppError::BadRequest(format!("Invalid recipient: {}", e)))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| AppError::Internal(format!("Failed to build email: {}", e)))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| AppError::External(format!("SMTP error: {}", e)))?;

        Ok(())
    }
}

/// Used when SMTP isn't configured; keeps a trace of what would be sent.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            template = notification.template_name(),
            to = notification.recipient(),
            "Email delivery disabled, not sending"
        );
        Ok(())
    }
}

fn render(notification: &Notification) -> (String, String) {
    match notification {
        Notification::SignupConfirmation { details, .. } => {
            let subject = match details.waitlist_position {
                Some(_) => format!("Du står på venteliste: {}", details.course_name),
                None => format!("Påmelding bekreftet: {}", details.course_name),
            };
            let mut body = format!(
                "{}\n{} kl. {}\n",
                details.course_name, details.date, details.time
            );
            if let Some(location) = &details.location {
                body.push_str(&format!("Sted: {}\n", location));
            }
            if let Some(position) = details.waitlist_position {
                body.push_str(&format!("Plass på ventelisten: {}\n", position));
            }
            body.push_str(&format!("\nHilsen {}\n", details.organization_name));
            (subject, body)
        }
        Notification::WaitlistOffer { details, .. } => {
            let subject = format!("Ledig plass: {}", details.course_name);
            let body = format!(
                "Det har blitt ledig plass på {} {} kl. {}.\n\
                 Bekreft plassen før {}:\n{}\n\nHilsen {}\n",
                details.course_name,
                details.date,
                details.time,
                details.expires_at,
                details.claim_url,
                details.organization_name
            );
            (subject, body)
        }
    }
}

/// Test notifier that records every message and can be told to fail.
#[cfg(any(test, feature = "test-utils"))]
#[derive(Default)]
pub struct RecordingNotifier {
    sent: std::sync::Mutex<Vec<Notification>>,
    fail: std::sync::atomic::AtomicBool,
}

#[cfg(any(test, feature = "test-utils"))]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        notifier
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
        if self.fail.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(AppError::External("SMTP unavailable".to_string()));
        }
        Ok(())
    }
}
