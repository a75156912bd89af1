//! HTTP transport for orchestrator callbacks.
//!
//! Six POST routes (trailing slash optional), a health check, and the
//! configuration UI served as static files. Security headers are applied to
//! every response.

pub mod extractors;
pub mod handlers;
pub mod router;
