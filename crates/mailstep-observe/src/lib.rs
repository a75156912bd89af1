//! Observability setup shared by the mailstep binaries.

pub mod tracing_setup;
