use std::fmt;
use std::time::{Duration, Instant};

use secrecy::SecretString;

/// Bearer token for the downstream mail API.
///
/// The value is wrapped in [`SecretString`] and never appears in `Debug`
/// output. Only the credential cache constructs and hands these out.
pub struct AccessToken {
    value: SecretString,
    token_type: String,
    expires_at: Instant,
}

impl AccessToken {
    pub fn new(value: SecretString, token_type: impl Into<String>, expires_at: Instant) -> Self {
        Self {
            value,
            token_type: token_type.into(),
            expires_at,
        }
    }

    pub fn value(&self) -> &SecretString {
        &self.value
    }

    /// Always "Bearer" for client-credentials tokens.
    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    /// Time left before the provider-stated expiry.
    pub fn remaining(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }

    /// Whether the token can still be served with `margin` to spare.
    pub fn is_fresh(&self, now: Instant, margin: Duration) -> bool {
        now + margin < self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
