//! Business logic and port traits for mailstep.
//!
//! This crate implements the custom-activity execution core: callback
//! verification (behind [`auth::CallbackVerifier`]), the activity
//! configuration store, the OAuth credential cache, the execution
//! dispatcher and the lifecycle handler tying them together.
//!
//! It depends only on `mailstep-types` -- never on `mailstep-infra`, an HTTP
//! client or a web framework. Network adapters implement the traits defined
//! here.

pub mod activity;
pub mod auth;
pub mod credential;
pub mod dispatch;
pub mod lifecycle;

#[cfg(test)]
mod testing;
