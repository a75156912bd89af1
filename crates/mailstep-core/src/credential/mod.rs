//! OAuth2 client-credentials token handling for the downstream mail API.

pub mod cache;
pub mod exchanger;

pub use cache::{CredentialCache, CredentialStatus};
pub use exchanger::{TokenExchanger, TokenGrant};
