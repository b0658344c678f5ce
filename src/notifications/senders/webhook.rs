use async_trait::async_trait;
use reqwest::{Method, header};

use super::{HTTP_CLIENT, NotificationSender, RenderedMessage, SenderError, classify_status};
use crate::notifications::credentials::ChannelCredentials;

/// Pushes the rendered message to an arbitrary HTTP endpoint. The routing's
/// template is expected to produce the request body (typically JSON), so it
/// is sent verbatim for POST/PUT; GET requests carry no body.
pub struct WebhookSender;

impl Default for WebhookSender {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookSender {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationSender for WebhookSender {
    async fn send(
        &self,
        credentials: &ChannelCredentials,
        message: &RenderedMessage,
    ) -> Result<(), SenderError> {
        let (url, method, headers) = match credentials {
            ChannelCredentials::Webhook {
                url,
                method,
                headers,
            } => (url, method, headers),
            _ => {
                return Err(SenderError::InvalidConfiguration(
                    "expected webhook credentials".to_string(),
                ));
            }
        };

        let method = match method.as_deref().unwrap_or("POST").to_uppercase().as_str() {
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "GET" => Method::GET,
            other => {
                return Err(SenderError::InvalidConfiguration(format!(
                    "unsupported HTTP method: {other}"
                )));
            }
        };

        let with_body = method != Method::GET;
        let mut request = HTTP_CLIENT.request(method, url);

        let mut header_map = header::HeaderMap::new();
        header_map.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );
        if let Some(overrides) = headers {
            for (key, value) in overrides {
                let name = header::HeaderName::from_bytes(key.as_bytes()).map_err(|e| {
                    SenderError::InvalidConfiguration(format!("invalid header name {key:?}: {e}"))
                })?;
                let value = header::HeaderValue::from_str(value).map_err(|e| {
                    SenderError::InvalidConfiguration(format!("invalid header value for {key}: {e}"))
                })?;
                header_map.insert(name, value);
            }
        }
        request = request.headers(header_map);

        if with_body {
            request = request.body(message.body.clone());
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, "webhook endpoint", &error_body));
        }
        Ok(())
    }
}
