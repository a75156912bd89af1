//! OAuth2 client-credentials exchanger.
//!
//! Performs exactly one `POST {token_url}` per call. Caching and
//! single-flight live in `mailstep_core::credential::CredentialCache`.
//!
//! The client id and secret are held as [`SecretString`] and only exposed
//! while serializing the request body.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use mailstep_core::credential::{TokenExchanger, TokenGrant};
use mailstep_types::config::MailApiConfig;
use mailstep_types::error::{ConfigError, CredentialExchangeError};

use super::{build_http_client, fingerprint, truncate_body};

#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'static str,
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    account_id: Option<&'a str>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    token_type: Option<String>,
    expires_in: u64,
}

pub struct OAuthTokenExchanger {
    client: reqwest::Client,
    token_url: String,
    client_id: SecretString,
    client_secret: SecretString,
    scope: Option<String>,
    account_id: Option<String>,
}

impl OAuthTokenExchanger {
    pub fn from_config(config: &MailApiConfig) -> Result<Self, ConfigError> {
        if config.token_url.trim().is_empty() {
            return Err(ConfigError::Missing("mail.token_url"));
        }
        let client_id = config
            .client_id
            .clone()
            .ok_or(ConfigError::Missing("mail.client_id"))?;
        let client_secret = config
            .client_secret
            .clone()
            .ok_or(ConfigError::Missing("mail.client_secret"))?;

        Ok(Self {
            client: build_http_client(config.request_timeout())?,
            token_url: config.token_url.clone(),
            client_id,
            client_secret,
            scope: config.scope.clone(),
            account_id: config.account_id.clone(),
        })
    }
}

impl TokenExchanger for OAuthTokenExchanger {
    async fn exchange(&self) -> Result<TokenGrant, CredentialExchangeError> {
        let body = TokenRequest {
            grant_type: "client_credentials",
            client_id: self.client_id.expose_secret(),
            client_secret: self.client_secret.expose_secret(),
            scope: self.scope.as_deref(),
            account_id: self.account_id.as_deref(),
        };

        tracing::debug!(token_url = %self.token_url, "requesting mail API token");
        let response = self
            .client
            .post(&self.token_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| CredentialExchangeError::Transport(e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::warn!(
                status = status.as_u16(),
                body = %truncate_body(&error_body),
                "token endpoint rejected client credentials"
            );
            return Err(CredentialExchangeError::Rejected {
                status: status.as_u16(),
            });
        }

        let parsed: TokenResponse = response
            .json()
            .await
            .map_err(|e| CredentialExchangeError::InvalidResponse(e.without_url().to_string()))?;

        if parsed.access_token.is_empty() {
            return Err(CredentialExchangeError::InvalidResponse(
                "empty access_token".to_string(),
            ));
        }

        let token_type = match parsed.token_type {
            Some(t) if !t.eq_ignore_ascii_case("bearer") => {
                return Err(CredentialExchangeError::InvalidResponse(format!(
                    "unsupported token_type '{t}'"
                )));
            }
            _ => "Bearer".to_string(),
        };

        tracing::debug!(
            token = %fingerprint(&parsed.access_token),
            expires_in_secs = parsed.expires_in,
            "mail API token issued"
        );

        Ok(TokenGrant {
            access_token: SecretString::from(parsed.access_token),
            token_type,
            expires_in: Duration::from_secs(parsed.expires_in),
        })
    }
}
