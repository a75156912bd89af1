//! Lenient JSON body extractor.
//!
//! Accepts any content type. An empty body becomes `Value::Null` so the
//! lifecycle handler can report what is missing; a non-JSON body is rejected
//! with the same `{"success": false, "errors": [..]}` shape as every other
//! callback failure.

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

use mailstep_core::lifecycle::CallbackResponse;

use crate::service::into_reply;

pub struct CallbackBody(pub Value);

impl<S> FromRequest<S> for CallbackBody
where
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        parse_body(&bytes)
            .map(Self)
            .map_err(|rejected| into_reply(rejected).into_response())
    }
}

pub fn parse_body(bytes: &[u8]) -> Result<Value, CallbackResponse> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(bytes).map_err(|e| {
        tracing::debug!(error = %e, "callback body is not JSON");
        CallbackResponse::bad_request("malformed_request", "request body is not valid JSON")
    })
}
