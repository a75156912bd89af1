//! Shared domain types for mailstep.
//!
//! Activity instances, execution outcomes, callback claims, OAuth tokens,
//! configuration and the error taxonomy used by every other crate.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror, secrecy.

pub mod activity;
pub mod callback;
pub mod config;
pub mod credential;
pub mod error;
pub mod execution;
