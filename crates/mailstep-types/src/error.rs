use thiserror::Error;

use crate::activity::{ActivityStatus, ConfigIssue};

/// Errors from verifying the signed token on an inbound callback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthenticationError {
    #[error("callback token missing")]
    MissingToken,

    #[error("callback token signature invalid")]
    InvalidSignature,

    #[error("callback token malformed: {0}")]
    Malformed(String),

    #[error("callback token missing claim '{0}'")]
    MissingClaim(&'static str),

    #[error("callback token issued {skew_secs}s away from now, outside the accepted window")]
    Stale { skew_secs: i64 },

    #[error("callback token expired")]
    Expired,
}

/// Errors from activity configuration and lifecycle operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivityError {
    #[error("configuration rejected ({} issue(s))", issues.len())]
    Configuration { issues: Vec<ConfigIssue> },

    #[error("validation failed ({} issue(s))", issues.len())]
    Validation { issues: Vec<ConfigIssue> },

    #[error("invalid lifecycle transition from '{from}' to '{to}'")]
    InvalidTransition {
        from: ActivityStatus,
        to: ActivityStatus,
    },

    #[error("activity instance not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors from the OAuth2 client-credentials exchange.
///
/// Cloneable so that every caller waiting on one exchange receives it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialExchangeError {
    #[error("token endpoint unreachable: {0}")]
    Transport(String),

    #[error("token endpoint rejected credentials (HTTP {status})")]
    Rejected { status: u16 },

    #[error("token endpoint returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("token lifetime of {expires_in_secs}s does not exceed the refresh margin")]
    LifetimeTooShort { expires_in_secs: u64 },
}

/// Errors from one call to the downstream mail API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeliveryError {
    #[error("mail API unreachable: {0}")]
    Transport(String),

    #[error("mail API server error (HTTP {status}): {message}")]
    Server { status: u16, message: String },

    #[error("mail API rejected request (HTTP {status}): {message}")]
    Client { status: u16, message: String },

    #[error("recipient field '{0}' missing or blank in contact data")]
    MissingRecipient(String),

    #[error("mail API returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Credential(#[from] CredentialExchangeError),
}

impl DeliveryError {
    /// Transport failures and 5xx responses are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DeliveryError::Transport(_) | DeliveryError::Server { .. })
    }

    /// Whether the cached bearer token should be dropped after this error.
    pub fn invalidates_token(&self) -> bool {
        matches!(self, DeliveryError::Client { status: 401 | 403, .. })
    }

    /// Stable code reported in execution outcomes.
    pub fn code(&self) -> &'static str {
        match self {
            DeliveryError::Transport(_) => "transport_error",
            DeliveryError::Server { .. } => "server_error",
            DeliveryError::Client { .. } => "client_error",
            DeliveryError::MissingRecipient(_) => "missing_recipient",
            DeliveryError::InvalidResponse(_) => "invalid_response",
            DeliveryError::Credential(_) => "credential_exchange_failed",
        }
    }
}

/// Errors from loading the service configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("required setting '{0}' is missing")]
    Missing(&'static str),

    #[error("invalid setting '{key}': {message}")]
    Invalid { key: &'static str, message: String },
}
