//! HS256 JWT verifier for orchestrator callbacks.
//!
//! The orchestrator signs every lifecycle and execute callback with the
//! shared secret configured for the activity. The signature and algorithm
//! are checked by `jsonwebtoken`; `iat`/`exp` freshness is applied by
//! [`check_freshness`] so the clock-skew rule is the same for every
//! verifier.

use std::time::Duration;

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use secrecy::{ExposeSecret, SecretString};

use mailstep_core::auth::{CallbackVerifier, check_freshness};
use mailstep_types::callback::CallbackClaims;
use mailstep_types::config::OrchestratorConfig;
use mailstep_types::error::{AuthenticationError, ConfigError};

pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
    max_skew: Duration,
}

impl JwtVerifier {
    pub fn new(secret: &SecretString, max_skew: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is enforced by check_freshness with the configured skew
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.expose_secret().as_bytes()),
            validation,
            max_skew,
        }
    }

    pub fn from_config(config: &OrchestratorConfig) -> Result<Self, ConfigError> {
        let secret = config
            .jwt_secret
            .as_ref()
            .ok_or(ConfigError::Missing("orchestrator.jwt_secret"))?;
        Ok(Self::new(secret, config.max_clock_skew()))
    }

    /// Verify `token` as of `now_secs` (Unix seconds).
    pub fn verify_at(&self, token: &str, now_secs: i64) -> Result<CallbackClaims, AuthenticationError> {
        let data = jsonwebtoken::decode::<CallbackClaims>(token, &self.key, &self.validation)
            .map_err(|err| map_decode_error(err.kind()))?;
        check_freshness(&data.claims, now_secs, self.max_skew)?;
        Ok(data.claims)
    }
}

impl CallbackVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<CallbackClaims, AuthenticationError> {
        self.verify_at(token, chrono::Utc::now().timestamp())
    }
}

fn map_decode_error(kind: &ErrorKind) -> AuthenticationError {
    match kind {
        ErrorKind::InvalidSignature => AuthenticationError::InvalidSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            AuthenticationError::Malformed("unexpected signing algorithm".to_string())
        }
        ErrorKind::Json(err) => {
            let message = err.to_string();
            if message.contains("activityInstanceId") {
                AuthenticationError::MissingClaim("activityInstanceId")
            } else if message.contains("`iat`") {
                AuthenticationError::MissingClaim("iat")
            } else {
                AuthenticationError::Malformed(message)
            }
        }
        other => AuthenticationError::Malformed(format!("{other:?}")),
    }
}
