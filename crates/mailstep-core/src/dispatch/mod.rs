//! Per-contact execution: building the send, retrying it, and sharing one
//! outcome between every caller of the same execution id.

pub mod dispatcher;
pub mod inflight;
pub mod mail;
pub mod retry;

pub use dispatcher::ExecutionDispatcher;
pub use inflight::InflightMap;
pub use mail::MailClient;
pub use retry::RetryPolicy;
