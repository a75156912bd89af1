//! Route handlers. Each one turns the extracted token and body into a
//! `CallbackRequest` and forwards it to the `CallbackService`.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use mailstep_types::callback::CallbackRequest;

use crate::service::Reply;
use crate::state::AppState;

use super::extractors::{CallbackBody, CallbackToken};

pub async fn client_credentials(
    State(state): State<AppState>,
    CallbackToken(token): CallbackToken,
    CallbackBody(body): CallbackBody,
) -> Reply {
    state
        .service
        .client_credentials(CallbackRequest::new(token, body))
        .await
}

pub async fn fetch_external_key(
    State(state): State<AppState>,
    CallbackToken(token): CallbackToken,
    CallbackBody(body): CallbackBody,
) -> Reply {
    state
        .service
        .fetch_external_key(CallbackRequest::new(token, body))
        .await
}

pub async fn save(
    State(state): State<AppState>,
    CallbackToken(token): CallbackToken,
    CallbackBody(body): CallbackBody,
) -> Reply {
    state.service.save(CallbackRequest::new(token, body)).await
}

pub async fn validate(
    State(state): State<AppState>,
    CallbackToken(token): CallbackToken,
    CallbackBody(body): CallbackBody,
) -> Reply {
    state.service.validate(CallbackRequest::new(token, body)).await
}

pub async fn publish(
    State(state): State<AppState>,
    CallbackToken(token): CallbackToken,
    CallbackBody(body): CallbackBody,
) -> Reply {
    state.service.publish(CallbackRequest::new(token, body)).await
}

pub async fn execute(
    State(state): State<AppState>,
    CallbackToken(token): CallbackToken,
    CallbackBody(body): CallbackBody,
) -> Reply {
    state.service.execute(CallbackRequest::new(token, body)).await
}

/// GET /health
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
