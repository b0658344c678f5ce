use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::db::enums::ChannelKind;

/// Credentials for one delivery destination, keyed by transport kind.
///
/// The dispatch engine treats the whole value as opaque: it is validated
/// against the channel's kind when the channel is created or updated, and
/// from then on only ever passed to the matching sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ChannelCredentials {
    Telegram {
        bot_token: String,
        chat_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parse_mode: Option<String>,
    },
    Email {
        smtp_host: String,
        smtp_port: u16,
        smtp_username: String,
        smtp_password: String,
        sender: String,
        to: String,
    },
    Slack {
        webhook_url: String,
    },
    Webhook {
        url: String,
        /// HTTP method, defaults to POST.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        headers: Option<HashMap<String, String>>,
    },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("{kind} credentials are incomplete: {field} must not be empty")]
    MissingField {
        kind: ChannelKind,
        field: &'static str,
    },
    #[error("credentials are for {actual}, channel kind is {expected}")]
    KindMismatch {
        expected: ChannelKind,
        actual: ChannelKind,
    },
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),
}

impl ChannelCredentials {
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelCredentials::Telegram { .. } => ChannelKind::Telegram,
            ChannelCredentials::Email { .. } => ChannelKind::Email,
            ChannelCredentials::Slack { .. } => ChannelKind::Slack,
            ChannelCredentials::Webhook { .. } => ChannelKind::Webhook,
        }
    }

    /// Checks that the credential shape matches `expected` and that every
    /// required field is populated.
    pub fn validate_for(&self, expected: ChannelKind) -> Result<(), CredentialsError> {
        if self.kind() != expected {
            return Err(CredentialsError::KindMismatch {
                expected,
                actual: self.kind(),
            });
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), CredentialsError> {
        let missing = |field| CredentialsError::MissingField {
            kind: self.kind(),
            field,
        };
        match self {
            ChannelCredentials::Telegram {
                bot_token, chat_id, ..
            } => {
                if bot_token.is_empty() {
                    return Err(missing("botToken"));
                }
                if chat_id.is_empty() {
                    return Err(missing("chatId"));
                }
            }
            ChannelCredentials::Email {
                smtp_host,
                smtp_username,
                smtp_password,
                sender,
                to,
                ..
            } => {
                if smtp_host.is_empty() {
                    return Err(missing("smtpHost"));
                }
                if smtp_username.is_empty() {
                    return Err(missing("smtpUsername"));
                }
                if smtp_password.is_empty() {
                    return Err(missing("smtpPassword"));
                }
                if sender.is_empty() {
                    return Err(missing("sender"));
                }
                if to.is_empty() {
                    return Err(missing("to"));
                }
            }
            ChannelCredentials::Slack { webhook_url } => {
                if webhook_url.is_empty() {
                    return Err(missing("webhookUrl"));
                }
            }
            ChannelCredentials::Webhook { url, method, .. } => {
                if url.is_empty() {
                    return Err(missing("url"));
                }
                if let Some(m) = method {
                    match m.to_uppercase().as_str() {
                        "GET" | "POST" | "PUT" => {}
                        other => {
                            return Err(CredentialsError::UnsupportedMethod(other.to_string()));
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_telegram_credentials() {
        let creds: ChannelCredentials = serde_json::from_value(serde_json::json!({
            "type": "telegram",
            "botToken": "123:abc",
            "chatId": "-100200300",
        }))
        .unwrap();
        assert_eq!(creds.kind(), ChannelKind::Telegram);
        assert!(creds.validate_for(ChannelKind::Telegram).is_ok());
    }

    #[test]
    fn rejects_kind_mismatch() {
        let creds = ChannelCredentials::Slack {
            webhook_url: "https://hooks.slack.example/T000/B000".into(),
        };
        let err = creds.validate_for(ChannelKind::Email).unwrap_err();
        assert_eq!(
            err,
            CredentialsError::KindMismatch {
                expected: ChannelKind::Email,
                actual: ChannelKind::Slack,
            }
        );
    }

    #[test]
    fn rejects_incomplete_email_credentials() {
        let creds: ChannelCredentials = serde_json::from_value(serde_json::json!({
            "type": "email",
            "smtpHost": "smtp.example.com",
            "smtpPort": 587,
            "smtpUsername": "mailer",
            "smtpPassword": "",
            "sender": "noreply@example.com",
            "to": "ops@example.com",
        }))
        .unwrap();
        assert!(matches!(
            creds.validate_for(ChannelKind::Email),
            Err(CredentialsError::MissingField {
                field: "smtpPassword",
                ..
            })
        ));
    }

    #[test]
    fn rejects_unknown_webhook_method() {
        let creds = ChannelCredentials::Webhook {
            url: "https://example.com/hook".into(),
            method: Some("TRACE".into()),
            headers: None,
        };
        assert!(matches!(
            creds.validate_for(ChannelKind::Webhook),
            Err(CredentialsError::UnsupportedMethod(_))
        ));
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let res: Result<ChannelCredentials, _> = serde_json::from_value(serde_json::json!({
            "type": "pager",
            "number": "555",
        }));
        assert!(res.is_err());
    }
}
