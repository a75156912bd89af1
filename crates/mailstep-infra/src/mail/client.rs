//! HTTP client for the downstream mail API.
//!
//! One call is one HTTP request. Responses are classified for the
//! dispatcher's retry policy:
//!
//! | Outcome | Error |
//! |---|---|
//! | connect / timeout / body read failure | `Transport` (retried) |
//! | 5xx | `Server` (retried) |
//! | 4xx | `Client` (permanent; 401/403 drop the cached token) |
//! | 2xx with unreadable JSON | `InvalidResponse` |

use reqwest::Url;
use secrecy::ExposeSecret;
use serde_json::Value;

use mailstep_core::dispatch::MailClient;
use mailstep_types::config::MailApiConfig;
use mailstep_types::credential::AccessToken;
use mailstep_types::error::{ConfigError, DeliveryError};
use mailstep_types::execution::{DeliveryReceipt, DeliveryRequest};

use super::{build_http_client, truncate_body};

const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

pub struct HttpMailClient {
    client: reqwest::Client,
    base_url: String,
    send_path: String,
    /// `{base_url}{template_path}`; template ids are appended as one
    /// percent-encoded path segment.
    template_base: Url,
}

impl HttpMailClient {
    pub fn from_config(config: &MailApiConfig) -> Result<Self, ConfigError> {
        if config.base_url.trim().is_empty() {
            return Err(ConfigError::Missing("mail.base_url"));
        }
        let base_url = config.base_url.trim_end_matches('/').to_string();
        let template_base = Url::parse(&format!(
            "{base_url}{}",
            config.template_path.trim_end_matches('/')
        ))
        .ok()
        .filter(|url| !url.cannot_be_a_base())
        .ok_or_else(|| ConfigError::Invalid {
            key: "mail.base_url",
            message: format!("'{base_url}' is not an absolute http(s) URL"),
        })?;

        Ok(Self {
            client: build_http_client(config.request_timeout())?,
            base_url,
            send_path: config.send_path.clone(),
            template_base,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn template_url(&self, template: &str) -> Url {
        let mut url = self.template_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(template);
        }
        url
    }
}

impl MailClient for HttpMailClient {
    async fn send(
        &self,
        token: &AccessToken,
        request: &DeliveryRequest,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let response = self
            .client
            .post(self.url(&self.send_path))
            .bearer_auth(token.value().expose_secret())
            .header(IDEMPOTENCY_HEADER, request.idempotency_key.as_str())
            .json(request)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;

        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &body));
        }

        // Some deployments answer 202/204 with no body
        if body.trim().is_empty() {
            return Ok(DeliveryReceipt::default());
        }
        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| DeliveryError::InvalidResponse(e.to_string()))?;

        Ok(DeliveryReceipt {
            delivery_id: first_string(&parsed, &["id", "deliveryId", "messageId"]),
        })
    }

    async fn template_key(
        &self,
        token: &AccessToken,
        template: &str,
    ) -> Result<Option<String>, DeliveryError> {
        let response = self
            .client
            .get(self.template_url(template))
            .bearer_auth(token.value().expose_secret())
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .map_err(|e| DeliveryError::Transport(e.without_url().to_string()))?;
        if !status.is_success() {
            return Err(classify_status(status.as_u16(), &body));
        }

        let parsed: Value = serde_json::from_str(&body)
            .map_err(|e| DeliveryError::InvalidResponse(e.to_string()))?;
        first_string(&parsed, &["externalKey", "external_key", "key"])
            .map(Some)
            .ok_or_else(|| DeliveryError::InvalidResponse("template has no external key".to_string()))
    }
}

fn classify_status(status: u16, body: &str) -> DeliveryError {
    let message = truncate_body(body);
    match status {
        500..=599 => DeliveryError::Server { status, message },
        400..=499 => DeliveryError::Client { status, message },
        _ => DeliveryError::InvalidResponse(format!("unexpected HTTP {status}")),
    }
}

/// First of `keys` holding a string (or number) in a JSON object.
fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match value.get(*key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}
