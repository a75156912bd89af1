//! Orchestrator callback handling: authenticate, act on the activity
//! instance named by the token, and shape the reply.

pub mod handler;
pub mod response;

pub use handler::LifecycleHandler;
pub use response::{CallbackResponse, ErrorItem, ReplyStatus};
