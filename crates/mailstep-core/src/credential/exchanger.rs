//! TokenExchanger trait definition.

use std::time::Duration;

use secrecy::SecretString;

use mailstep_types::error::CredentialExchangeError;

/// A freshly issued token as reported by the token endpoint.
#[derive(Debug)]
pub struct TokenGrant {
    pub access_token: SecretString,
    pub token_type: String,
    /// Lifetime stated by the provider.
    pub expires_in: Duration,
}

/// Performs one client-credentials exchange against the token endpoint.
///
/// Implementations live in mailstep-infra (e.g. `OAuthTokenExchanger`). The
/// credential cache decides when to call it; implementations must not cache.
pub trait TokenExchanger: Send + Sync {
    fn exchange(
        &self,
    ) -> impl std::future::Future<Output = Result<TokenGrant, CredentialExchangeError>> + Send;
}
