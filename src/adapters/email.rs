use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use crate::adapters::{DeliveryError, EmailAdapter, EmailMessage};

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub from_address: String,
    pub user: Option<String>,
    pub password: Option<String>,
}

/// STARTTLS SMTP relay. The transport pools its connections.
pub struct SmtpEmailAdapter {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailAdapter {
    pub fn new(config: &SmtpConfig) -> anyhow::Result<Self> {
        let from: Mailbox = config.from_address.parse()?;

        let mut transport_builder =
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?.port(config.port);

        if let (Some(user), Some(pass)) = (&config.user, &config.password) {
            transport_builder =
                transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
        }

        Ok(Self {
            mailer: transport_builder.build(),
            from,
        })
    }
}

pub fn build_message(from: &Mailbox, message: EmailMessage) -> Result<Message, DeliveryError> {
    let to: Mailbox = message
        .to
        .parse()
        .map_err(|e| DeliveryError::InvalidRecipient(format!("{}: {e}", message.to)))?;

    Message::builder()
        .from(from.clone())
        .to(to)
        .subject(message.subject)
        .header(ContentType::TEXT_HTML)
        .body(message.html)
        .map_err(|e| DeliveryError::Build(e.to_string()))
}

#[async_trait]
impl EmailAdapter for SmtpEmailAdapter {
    async fn send_email(&self, message: EmailMessage) -> Result<(), DeliveryError> {
        let to = message.to.clone();
        let email = build_message(&self.from, message)?;

        self.mailer
            .send(email)
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        tracing::debug!(to = %to, "notification email sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn from() -> Mailbox {
        "SoundScape <noreply@soundscape.ai>".parse().unwrap()
    }

    #[test]
    fn builds_html_message() {
        let message = build_message(
            &from(),
            EmailMessage {
                to: "ada@example.com".to_string(),
                subject: "Someone liked your track".to_string(),
                html: "<p>Hi</p>".to_string(),
            },
        )
        .unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();
        assert!(raw.contains("Subject: Someone liked your track"));
        assert!(raw.contains("Content-Type: text/html"));
        assert!(raw.contains("To: ada@example.com"));
    }

    #[test]
    fn malformed_recipient_is_rejected() {
        let result = build_message(
            &from(),
            EmailMessage {
                to: "not-an-address".to_string(),
                subject: "s".to_string(),
                html: "h".to_string(),
            },
        );
        assert_matches!(result, Err(DeliveryError::InvalidRecipient(_)));
    }
}
