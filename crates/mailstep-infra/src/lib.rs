//! Infrastructure adapters for mailstep.
//!
//! Implements the ports defined in `mailstep-core`:
//! - [`auth::JwtVerifier`] for [`mailstep_core::auth::CallbackVerifier`]
//! - [`mail::OAuthTokenExchanger`] for [`mailstep_core::credential::TokenExchanger`]
//! - [`mail::HttpMailClient`] for [`mailstep_core::dispatch::MailClient`]
//! - [`storage::FileActivityRepository`] for [`mailstep_core::activity::ActivityRepository`]
//!
//! plus the TOML/environment configuration loader.

pub mod auth;
pub mod config;
pub mod mail;
pub mod storage;
