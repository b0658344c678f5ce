use async_trait::async_trait;
use serde::Serialize;

use super::{HTTP_CLIENT, NotificationSender, RenderedMessage, SenderError, classify_status};
use crate::notifications::credentials::ChannelCredentials;

/// Posts messages to a Slack incoming webhook.
pub struct SlackSender;

impl Default for SlackSender {
    fn default() -> Self {
        Self::new()
    }
}

impl SlackSender {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Serialize)]
struct SlackPayload<'a> {
    text: &'a str,
}

#[async_trait]
impl NotificationSender for SlackSender {
    async fn send(
        &self,
        credentials: &ChannelCredentials,
        message: &RenderedMessage,
    ) -> Result<(), SenderError> {
        let webhook_url = match credentials {
            ChannelCredentials::Slack { webhook_url } => webhook_url,
            _ => {
                return Err(SenderError::InvalidConfiguration(
                    "expected slack credentials".to_string(),
                ));
            }
        };

        let payload = SlackPayload {
            text: &message.body,
        };
        let response = HTTP_CLIENT.post(webhook_url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, "Slack webhook", &error_body));
        }
        Ok(())
    }
}
