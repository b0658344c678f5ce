use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{NotificationSender, RenderedMessage, SenderError};
use crate::notifications::credentials::ChannelCredentials;

/// Delivers messages over SMTP. Port 465 gets implicit TLS, everything else
/// STARTTLS.
pub struct EmailSender;

impl Default for EmailSender {
    fn default() -> Self {
        Self::new()
    }
}

impl EmailSender {
    pub fn new() -> Self {
        Self
    }
}

fn classify_smtp(err: lettre::transport::smtp::Error) -> SenderError {
    if err.is_timeout() {
        SenderError::Timeout
    } else if err.is_permanent() {
        SenderError::Rejected(err.to_string())
    } else {
        SenderError::Network(err.to_string())
    }
}

#[async_trait]
impl NotificationSender for EmailSender {
    async fn send(
        &self,
        credentials: &ChannelCredentials,
        message: &RenderedMessage,
    ) -> Result<(), SenderError> {
        let (host, port, username, password, sender, to) = match credentials {
            ChannelCredentials::Email {
                smtp_host,
                smtp_port,
                smtp_username,
                smtp_password,
                sender,
                to,
            } => (smtp_host, *smtp_port, smtp_username, smtp_password, sender, to),
            _ => {
                return Err(SenderError::InvalidConfiguration(
                    "expected email credentials".to_string(),
                ));
            }
        };

        let email = Message::builder()
            .from(sender.parse().map_err(|e| {
                SenderError::InvalidConfiguration(format!("invalid sender address: {e}"))
            })?)
            .to(to.parse().map_err(|e| {
                SenderError::InvalidConfiguration(format!("invalid recipient address: {e}"))
            })?)
            .subject(&message.title)
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .map_err(|e| SenderError::InvalidConfiguration(format!("cannot build email: {e}")))?;

        let builder = if port == 465 {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        }
        .map_err(classify_smtp)?;

        let transport = builder
            .port(port)
            .credentials(Credentials::new(username.clone(), password.clone()))
            .build();

        transport.send(email).await.map_err(classify_smtp)?;
        Ok(())
    }
}
