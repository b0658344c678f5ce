use async_trait::async_trait;
use serde::Serialize;

use super::{HTTP_CLIENT, NotificationSender, RenderedMessage, SenderError, classify_status};
use crate::notifications::credentials::ChannelCredentials;

/// Delivers messages through the Telegram Bot API.
pub struct TelegramSender;

impl Default for TelegramSender {
    fn default() -> Self {
        Self::new()
    }
}

impl TelegramSender {
    pub fn new() -> Self {
        Self
    }

    /// Escapes text for Telegram MarkdownV2.
    /// Characters to escape: _ * [ ] ( ) ~ ` > # + - = | { } . !
    fn escape_markdown_v2(text: &str) -> String {
        let mut escaped = String::with_capacity(text.len());
        for c in text.chars() {
            match c {
                '_' | '*' | '[' | ']' | '(' | ')' | '~' | '`' | '>' | '#' | '+' | '-' | '='
                | '|' | '{' | '}' | '.' | '!' => {
                    escaped.push('\\');
                    escaped.push(c);
                }
                _ => escaped.push(c),
            }
        }
        escaped
    }
}

#[derive(Serialize)]
struct SendMessageBody<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

#[async_trait]
impl NotificationSender for TelegramSender {
    async fn send(
        &self,
        credentials: &ChannelCredentials,
        message: &RenderedMessage,
    ) -> Result<(), SenderError> {
        let (bot_token, chat_id, parse_mode) = match credentials {
            ChannelCredentials::Telegram {
                bot_token,
                chat_id,
                parse_mode,
            } => (bot_token, chat_id, parse_mode),
            _ => {
                return Err(SenderError::InvalidConfiguration(
                    "expected telegram credentials".to_string(),
                ));
            }
        };

        let parse_mode = parse_mode.as_deref().unwrap_or("MarkdownV2");
        let text = if parse_mode == "MarkdownV2" {
            Self::escape_markdown_v2(&message.body)
        } else {
            message.body.clone()
        };

        let api_url = format!("https://api.telegram.org/bot{bot_token}/sendMessage");
        let body = SendMessageBody {
            chat_id,
            text: &text,
            parse_mode,
        };

        let response = HTTP_CLIENT.post(&api_url).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, "Telegram API", &error_body));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markdown_v2_metacharacters() {
        assert_eq!(
            TelegramSender::escape_markdown_v2("v1.2 done!"),
            "v1\\.2 done\\!"
        );
        assert_eq!(TelegramSender::escape_markdown_v2("plain"), "plain");
    }
}
