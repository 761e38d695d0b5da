//! Email delivery.
//!
//! Two providers: an SMTP relay through `lettre` and the SendGrid HTTP API.
//! Callers that treat mail as a side effect wrap these in their own
//! best-effort handling; the service itself reports failures as errors.

use comunimapp_common::config::{EmailProviderKind, EmailSettings};
use comunimapp_common::{AppError, AppResult};
use lettre::message::MultiPart;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde_json::json;

/// Email delivery service.
#[derive(Clone)]
pub struct EmailService {
    settings: Option<EmailSettings>,
    http_client: reqwest::Client,
}

impl EmailService {
    /// Create an email service. `None` settings disable delivery.
    #[must_use]
    pub fn new(settings: Option<EmailSettings>) -> Self {
        Self {
            settings,
            http_client: reqwest::Client::new(),
        }
    }

    /// Whether a provider is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.settings.is_some()
    }

    /// Send an email with plain-text and HTML bodies.
    pub async fn send(&self, to: &str, subject: &str, text: &str, html: &str) -> AppResult<()> {
        let settings = self
            .settings
            .as_ref()
            .ok_or_else(|| AppError::BadRequest("Email delivery not configured".to_string()))?;

        match settings.provider {
            EmailProviderKind::Smtp => self.send_smtp(settings, to, subject, text, html).await,
            EmailProviderKind::Sendgrid => {
                self.send_sendgrid(settings, to, subject, text, html).await
            }
        }
    }

    /// Send the account verification email with the confirmation link.
    pub async fn send_verification(
        &self,
        to: &str,
        username: &str,
        verify_url: &str,
    ) -> AppResult<()> {
        let subject = "Verifica tu cuenta de Comunimapp";
        let text = format!(
            "Hola {username},\n\n\
            Gracias por registrarte en Comunimapp. Para activar tu cuenta, \
            abre el siguiente enlace:\n{verify_url}\n\n\
            Si no creaste esta cuenta, ignora este mensaje."
        );
        let html = format!(
            "<p>Hola <strong>{username}</strong>,</p>\
            <p>Gracias por registrarte en Comunimapp. Para activar tu cuenta, \
            haz clic en el botón:</p>\
            <p><a href=\"{verify_url}\" style=\"display:inline-block;padding:12px 24px;\
            background:#28a745;color:#fff;text-decoration:none;border-radius:4px;\">\
            Verificar cuenta</a></p>\
            <p><small>Si no creaste esta cuenta, ignora este mensaje.</small></p>"
        );
        self.send(to, subject, &text, &html).await
    }

    /// Send a notification email mirroring an in-app notification.
    pub async fn send_notification(&self, to: &str, title: &str, message: &str) -> AppResult<()> {
        let html = format!("<p><strong>{title}</strong></p><p>{message}</p>");
        self.send(to, title, message, &html).await
    }

    async fn send_smtp(
        &self,
        settings: &EmailSettings,
        to: &str,
        subject: &str,
        text: &str,
        html: &str,
    ) -> AppResult<()> {
        let host = settings
            .smtp_host
            .as_deref()
            .ok_or_else(|| AppError::Config("smtp_host missing".to_string()))?;

        let from = format!("{} <{}>", settings.from_name, settings.from_address)
            .parse()
            .map_err(|e| AppError::Config(format!("from address: {e}")))?;
        let to_mailbox = to
            .parse()
            .map_err(|e| AppError::BadRequest(format!("recipient address: {e}")))?;

        let message = Message::builder()
            .from(from)
            .to(to_mailbox)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(
                text.to_string(),
                html.to_string(),
            ))
            .map_err(|e| AppError::Internal(format!("email build: {e}")))?;

        let mut transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| AppError::Config(format!("smtp relay: {e}")))?;
        if let Some(port) = settings.smtp_port {
            transport = transport.port(port);
        }
        if let (Some(username), Some(password)) =
            (&settings.smtp_username, &settings.smtp_password)
        {
            transport = transport.credentials(Credentials::new(username.clone(), password.clone()));
        }

        transport
            .build()
            .send(message)
            .await
            .map_err(|e| AppError::ExternalService(format!("smtp send: {e}")))?;
        Ok(())
    }

    async fn send_sendgrid(
        &self,
        settings: &EmailSettings,
        to: &str,
        subject: &str,
        text: &str,
        html: &str,
    ) -> AppResult<()> {
        let api_key = settings
            .sendgrid_api_key
            .as_deref()
            .ok_or_else(|| AppError::Config("sendgrid_api_key missing".to_string()))?;

        let body = json!({
            "personalizations": [{ "to": [{ "email": to }] }],
            "from": {
                "email": settings.from_address,
                "name": settings.from_name,
            },
            "subject": subject,
            "content": [
                { "type": "text/plain", "value": text },
                { "type": "text/html", "value": html },
            ],
        });

        let response = self
            .http_client
            .post("https://api.sendgrid.com/v3/mail/send")
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("sendgrid: {e}")))?;

        if !response.status().is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!("sendgrid: {detail}")));
        }
        Ok(())
    }
}
