//! Mail API adapters: OAuth client-credentials exchange and the send /
//! template lookup client.

pub mod client;
pub mod oauth;

pub use client::HttpMailClient;
pub use oauth::OAuthTokenExchanger;

use sha2::{Digest, Sha256};

/// Short, non-reversible fingerprint of a secret for correlating log lines.
pub fn fingerprint(secret: &str) -> String {
    let digest = Sha256::digest(secret.as_bytes());
    format!("{digest:x}").chars().take(12).collect()
}

/// Clip a provider response body before it is stored in an error.
pub(crate) fn truncate_body(body: &str) -> String {
    const LIMIT: usize = 200;
    if body.chars().count() <= LIMIT {
        body.to_string()
    } else {
        let clipped: String = body.chars().take(LIMIT).collect();
        format!("{clipped}...")
    }
}

/// Shared HTTP client with the configured per-request timeout.
pub(crate) fn build_http_client(
    timeout: std::time::Duration,
) -> Result<reqwest::Client, mailstep_types::error::ConfigError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| mailstep_types::error::ConfigError::Invalid {
            key: "mail.request_timeout_ms",
            message: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable_and_short() {
        // SHA-256 of "abc" starts with ba7816bf8f01
        assert_eq!(fingerprint("abc"), "ba7816bf8f01");
        assert_ne!(fingerprint("abc"), fingerprint("abd"));
    }

    #[test]
    fn test_truncate_body() {
        assert_eq!(truncate_body("short"), "short");
        let long = "x".repeat(500);
        let clipped = truncate_body(&long);
        assert_eq!(clipped.len(), 203);
        assert!(clipped.ends_with("..."));
    }
}
