//! Inbound callback authentication.

pub mod verifier;

pub use verifier::{CallbackVerifier, check_freshness};
