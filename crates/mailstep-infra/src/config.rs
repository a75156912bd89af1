//! Service configuration loader.
//!
//! Reads `mailstep.toml` (or the `--config` path) into [`RelayConfig`] and
//! layers `MAILSTEP_*` environment variables on top:
//!
//! | Variable | Setting |
//! |---|---|
//! | `MAILSTEP_HOST` | `server.host` |
//! | `MAILSTEP_PORT` (or `PORT`) | `server.port` |
//! | `MAILSTEP_JWT_SECRET` | `orchestrator.jwt_secret` |
//! | `MAILSTEP_MAIL_CLIENT_ID` | `mail.client_id` |
//! | `MAILSTEP_MAIL_CLIENT_SECRET` | `mail.client_secret` |
//! | `MAILSTEP_MAIL_BASE_URL` | `mail.base_url` |
//! | `MAILSTEP_MAIL_TOKEN_URL` | `mail.token_url` |
//!
//! A missing file yields defaults; a file that fails to parse is an error.

use std::path::Path;

use secrecy::{ExposeSecret, SecretString};

use mailstep_types::config::RelayConfig;
use mailstep_types::error::ConfigError;

/// Load configuration from `path`, returning defaults when it does not exist.
pub async fn load_config(path: &Path) -> Result<RelayConfig, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(RelayConfig::default());
        }
        Err(err) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                message: err.to_string(),
            });
        }
    };

    toml::from_str::<RelayConfig>(&content).map_err(|err| ConfigError::Parse {
        path: path.display().to_string(),
        message: err.to_string(),
    })
}

/// Apply `MAILSTEP_*` overrides using `lookup` (normally `std::env::var`).
pub fn apply_env_overrides(
    config: &mut RelayConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(host) = get("MAILSTEP_HOST") {
        config.server.host = host;
    }
    let port = get("MAILSTEP_PORT")
        .map(|value| ("MAILSTEP_PORT", value))
        .or_else(|| get("PORT").map(|value| ("PORT", value)));
    if let Some((key, port)) = port {
        config.server.port = port.trim().parse().map_err(|_| ConfigError::Invalid {
            key,
            message: format!("'{port}' is not a valid port"),
        })?;
    }
    if let Some(secret) = get("MAILSTEP_JWT_SECRET") {
        config.orchestrator.jwt_secret = Some(SecretString::from(secret));
    }
    if let Some(client_id) = get("MAILSTEP_MAIL_CLIENT_ID") {
        config.mail.client_id = Some(SecretString::from(client_id));
    }
    if let Some(client_secret) = get("MAILSTEP_MAIL_CLIENT_SECRET") {
        config.mail.client_secret = Some(SecretString::from(client_secret));
    }
    if let Some(base_url) = get("MAILSTEP_MAIL_BASE_URL") {
        config.mail.base_url = base_url;
    }
    if let Some(token_url) = get("MAILSTEP_MAIL_TOKEN_URL") {
        config.mail.token_url = token_url;
    }
    Ok(())
}

/// Load `path` and apply the process environment.
pub async fn load_with_env(path: &Path) -> Result<RelayConfig, ConfigError> {
    let mut config = load_config(path).await?;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

/// Reject configurations the service cannot start with.
pub fn check_required(config: &RelayConfig) -> Result<(), ConfigError> {
    let blank = |secret: &Option<SecretString>| {
        secret
            .as_ref()
            .is_none_or(|s| s.expose_secret().trim().is_empty())
    };

    if blank(&config.orchestrator.jwt_secret) {
        return Err(ConfigError::Missing("orchestrator.jwt_secret"));
    }
    if blank(&config.mail.client_id) {
        return Err(ConfigError::Missing("mail.client_id"));
    }
    if blank(&config.mail.client_secret) {
        return Err(ConfigError::Missing("mail.client_secret"));
    }
    if config.mail.base_url.trim().is_empty() {
        return Err(ConfigError::Missing("mail.base_url"));
    }
    if config.mail.token_url.trim().is_empty() {
        return Err(ConfigError::Missing("mail.token_url"));
    }
    if config.dispatch.max_attempts == 0 {
        return Err(ConfigError::Invalid {
            key: "dispatch.max_attempts",
            message: "must be at least 1".to_string(),
        });
    }
    let worst_case = config.worst_case_execution();
    if worst_case >= config.dispatch.response_budget() {
        return Err(ConfigError::Invalid {
            key: "dispatch.response_budget_ms",
            message: format!(
                "{} ms does not cover the worst-case execution of {} ms \
                 (one token exchange, max_attempts sends, max_backoff between them)",
                config.dispatch.response_budget_ms,
                worst_case.as_millis()
            ),
        });
    }
    Ok(())
}
