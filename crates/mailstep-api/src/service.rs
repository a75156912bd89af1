//! The six callback operations exposed to the transport.
//!
//! Each takes a parsed `CallbackRequest` and returns the HTTP status and JSON
//! body to send back. Routing, header and body parsing live in `http`.

use axum::Json;
use axum::http::StatusCode;
use serde_json::Value;

use mailstep_core::lifecycle::{CallbackResponse, ReplyStatus};
use mailstep_types::callback::{CallbackRequest, CallbackStage};

use crate::state::Handler;

pub type Reply = (StatusCode, Json<Value>);

pub struct CallbackService {
    handler: Handler,
}

impl CallbackService {
    pub fn new(handler: Handler) -> Self {
        Self { handler }
    }

    pub async fn client_credentials(&self, request: CallbackRequest) -> Reply {
        into_reply(self.handler.client_credentials(request).await)
    }

    pub async fn fetch_external_key(&self, request: CallbackRequest) -> Reply {
        into_reply(self.handler.fetch_external_key(request).await)
    }

    pub async fn save(&self, request: CallbackRequest) -> Reply {
        self.stage(CallbackStage::Save, request).await
    }

    pub async fn validate(&self, request: CallbackRequest) -> Reply {
        self.stage(CallbackStage::Validate, request).await
    }

    pub async fn publish(&self, request: CallbackRequest) -> Reply {
        self.stage(CallbackStage::Publish, request).await
    }

    pub async fn execute(&self, request: CallbackRequest) -> Reply {
        self.stage(CallbackStage::Execute, request).await
    }

    async fn stage(&self, stage: CallbackStage, request: CallbackRequest) -> Reply {
        into_reply(self.handler.handle(stage, request).await)
    }
}

/// Map a transport-neutral reply onto an HTTP status and JSON body.
pub fn into_reply(response: CallbackResponse) -> Reply {
    let status = match response.status {
        ReplyStatus::Ok => StatusCode::OK,
        ReplyStatus::BadRequest => StatusCode::BAD_REQUEST,
        ReplyStatus::Unauthorized => StatusCode::UNAUTHORIZED,
    };
    (status, Json(response.body))
}
