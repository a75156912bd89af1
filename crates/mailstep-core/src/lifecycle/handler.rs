//! Lifecycle handler.
//!
//! Every callback runs the same pipeline:
//!
//! ```text
//! verify token -> act on the instance named by the claims -> reply
//! ```
//!
//! Authentication failure short-circuits before any store access. After
//! that, configuration and lifecycle problems are returned as data in an
//! HTTP 200 reply, so the orchestrator can show them to the journey author.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::Instrument;

use mailstep_types::activity::{ActivityInstance, ActivityInstanceId, ActivityStatus};
use mailstep_types::callback::{CallbackClaims, CallbackRequest, CallbackStage};
use mailstep_types::config::DispatchConfig;
use mailstep_types::error::{ActivityError, AuthenticationError, DeliveryError};
use mailstep_types::execution::{ExecutionId, ExecutionOutcome, OutcomeStatus};

use crate::activity::ActivityConfigStore;
use crate::auth::CallbackVerifier;
use crate::credential::{CredentialCache, TokenExchanger};
use crate::dispatch::dispatcher::outcome_message;
use crate::dispatch::{ExecutionDispatcher, MailClient};

use super::response::{CallbackResponse, ErrorItem};

pub struct LifecycleHandler<E, M> {
    verifier: Arc<dyn CallbackVerifier>,
    store: Arc<ActivityConfigStore>,
    credentials: Arc<CredentialCache<E>>,
    mail: Arc<M>,
    dispatcher: ExecutionDispatcher<E, M>,
}

impl<E, M> LifecycleHandler<E, M>
where
    E: TokenExchanger + 'static,
    M: MailClient,
{
    pub fn new(
        verifier: Arc<dyn CallbackVerifier>,
        store: Arc<ActivityConfigStore>,
        credentials: Arc<CredentialCache<E>>,
        mail: Arc<M>,
        dispatch: &DispatchConfig,
    ) -> Self {
        let dispatcher = ExecutionDispatcher::new(
            Arc::clone(&store),
            Arc::clone(&credentials),
            Arc::clone(&mail),
            dispatch,
        );
        Self {
            verifier,
            store,
            credentials,
            mail,
            dispatcher,
        }
    }

    pub async fn save(&self, request: CallbackRequest) -> CallbackResponse {
        self.handle(CallbackStage::Save, request).await
    }

    pub async fn validate(&self, request: CallbackRequest) -> CallbackResponse {
        self.handle(CallbackStage::Validate, request).await
    }

    pub async fn publish(&self, request: CallbackRequest) -> CallbackResponse {
        self.handle(CallbackStage::Publish, request).await
    }

    pub async fn execute(&self, request: CallbackRequest) -> CallbackResponse {
        self.handle(CallbackStage::Execute, request).await
    }

    /// Single entry point for all four lifecycle stages.
    pub async fn handle(&self, stage: CallbackStage, request: CallbackRequest) -> CallbackResponse {
        let span = tracing::info_span!("callback", stage = %stage, activity_id = tracing::field::Empty);
        async move {
            let claims = match self.authenticate(&request) {
                Ok(claims) => claims,
                Err(response) => return response,
            };
            let id = claims.activity_instance_id;
            tracing::Span::current().record("activity_id", tracing::field::display(&id));

            match stage {
                CallbackStage::Save => self.on_save(&id, &request.body),
                CallbackStage::Validate => self.on_transition(&id, self.store.validate(&id)),
                CallbackStage::Publish => self.on_transition(&id, self.store.publish(&id)),
                CallbackStage::Execute => self.on_execute(&id, request.body).await,
            }
        }
        .instrument(span)
        .await
    }

    /// Report token health without revealing the token.
    pub async fn client_credentials(&self, request: CallbackRequest) -> CallbackResponse {
        if let Err(response) = self.authenticate(&request) {
            return response;
        }

        match self.credentials.status().await {
            Ok(status) => CallbackResponse::ok(json!({
                "success": true,
                "tokenType": status.token_type,
                "expiresInSecs": status.expires_in.as_secs(),
            })),
            Err(err) => {
                let err = DeliveryError::from(err);
                CallbackResponse::rejected(vec![ErrorItem::new(err.code(), outcome_message(&err))])
            }
        }
    }

    /// Resolve `{"template": ...}` to the mail API's external key.
    pub async fn fetch_external_key(&self, request: CallbackRequest) -> CallbackResponse {
        if let Err(response) = self.authenticate(&request) {
            return response;
        }

        let Some(template) = request
            .body
            .get("template")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
        else {
            return CallbackResponse::bad_request("malformed_request", "template is required");
        };

        let result = match self.credentials.get_token().await {
            Ok(token) => self.mail.template_key(&token, template).await,
            Err(err) => Err(DeliveryError::from(err)),
        };

        match result {
            Ok(Some(key)) => CallbackResponse::ok(json!({
                "success": true,
                "template": template,
                "externalKey": key,
            })),
            Ok(None) => CallbackResponse::ok(json!({
                "success": false,
                "template": template,
                "errors": [ErrorItem::new("not_found", format!("template '{template}' does not exist"))],
            })),
            Err(err) => {
                if err.invalidates_token() {
                    self.credentials.invalidate();
                }
                tracing::warn!(error = %err, template, "template lookup failed");
                CallbackResponse::ok(json!({
                    "success": false,
                    "template": template,
                    "errors": [ErrorItem::new(err.code(), outcome_message(&err))],
                }))
            }
        }
    }

    fn authenticate(&self, request: &CallbackRequest) -> Result<CallbackClaims, CallbackResponse> {
        let Some(token) = request.token.as_deref().filter(|t| !t.trim().is_empty()) else {
            tracing::warn!(error = %AuthenticationError::MissingToken, "callback rejected");
            return Err(CallbackResponse::unauthorized());
        };

        self.verifier.verify(token).map_err(|err| {
            tracing::warn!(error = %err, "callback authentication failed");
            CallbackResponse::unauthorized()
        })
    }

    fn on_save(&self, id: &ActivityInstanceId, body: &Value) -> CallbackResponse {
        // Accept both `{"configuration": {...}}` and the bare payload
        let payload = body.get("configuration").unwrap_or(body);
        self.on_transition(id, self.store.save(id, payload))
    }

    fn on_transition(
        &self,
        id: &ActivityInstanceId,
        result: Result<Arc<ActivityInstance>, ActivityError>,
    ) -> CallbackResponse {
        match result {
            Ok(instance) => {
                tracing::info!(status = %instance.status, "activity transition applied");
                CallbackResponse::activity(id, instance.status)
            }
            Err(err) => {
                if let ActivityError::Storage(detail) = &err {
                    tracing::error!(error = %detail, "activity store failure");
                } else {
                    tracing::info!(error = %err, "activity transition rejected");
                }
                let status = self.store.status_of(id);
                CallbackResponse::activity_rejected(id, status, ErrorItem::from_activity_error(&err))
            }
        }
    }

    async fn on_execute(&self, id: &ActivityInstanceId, body: Value) -> CallbackResponse {
        let Value::Object(mut body) = body else {
            return CallbackResponse::bad_request("malformed_request", "execute body must be a JSON object");
        };

        let Some(execution_id) = body
            .get("executionId")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(ExecutionId::new)
        else {
            return CallbackResponse::bad_request("malformed_request", "executionId is required");
        };

        let contact_data = match body.remove("contactData") {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(data)) => data,
            Some(_) => {
                return CallbackResponse::bad_request(
                    "malformed_request",
                    "contactData must be a JSON object",
                );
            }
        };

        let outcome = match self.dispatcher.execute(id, execution_id.clone(), contact_data).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::info!(error = %err, execution_id = %execution_id, "execution refused");
                let code = ErrorItem::from_activity_error(&err)
                    .first()
                    .map(|item| item.code.clone())
                    .unwrap_or_else(|| "invalid_lifecycle_transition".to_string());
                ExecutionOutcome::failed(execution_id, 0, code, err.to_string())
            }
        };

        execution_reply(&outcome)
    }
}

fn execution_reply(outcome: &ExecutionOutcome) -> CallbackResponse {
    let mut body = serde_json::to_value(outcome).unwrap_or_else(|_| json!({}));
    if let Value::Object(fields) = &mut body {
        fields.insert(
            "success".to_string(),
            Value::Bool(outcome.status != OutcomeStatus::Failed),
        );
    }
    CallbackResponse::ok(body)
}

impl<E, M> LifecycleHandler<E, M> {
    /// Current lifecycle status of `id`, `unconfigured` when never saved.
    pub fn status_of(&self, id: &ActivityInstanceId) -> ActivityStatus {
        self.store.status_of(id)
    }
}
