//! Execution dispatcher.
//!
//! Turns one execute callback into at most one logical mail send:
//! 1. The activity must be published.
//! 2. Concurrent and repeated callbacks for one execution id share a single
//!    flight through [`InflightMap`].
//! 3. The flight builds the send from the saved configuration and the
//!    contact data, then retries transport errors and 5xx responses.
//! 4. Callers wait at most `response_budget`; past that they get `pending`
//!    while the flight keeps running.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tracing::Instrument;

use mailstep_types::activity::{ActivityConfig, ActivityInstance, ActivityInstanceId, ActivityStatus};
use mailstep_types::config::DispatchConfig;
use mailstep_types::error::{ActivityError, DeliveryError};
use mailstep_types::execution::{DeliveryRequest, ExecutionId, ExecutionOutcome};

use crate::activity::ActivityConfigStore;
use crate::credential::{CredentialCache, TokenExchanger};

use super::inflight::{InflightMap, OutcomeFlight};
use super::mail::MailClient;
use super::retry::RetryPolicy;

pub struct ExecutionDispatcher<E, M> {
    store: Arc<ActivityConfigStore>,
    credentials: Arc<CredentialCache<E>>,
    mail: Arc<M>,
    policy: RetryPolicy,
    inflight: InflightMap,
    response_budget: Duration,
}

impl<E, M> ExecutionDispatcher<E, M>
where
    E: TokenExchanger + 'static,
    M: MailClient,
{
    pub fn new(
        store: Arc<ActivityConfigStore>,
        credentials: Arc<CredentialCache<E>>,
        mail: Arc<M>,
        config: &DispatchConfig,
    ) -> Self {
        Self {
            store,
            credentials,
            mail,
            policy: RetryPolicy::from_config(config),
            inflight: InflightMap::new(config.dedup_retention()),
            response_budget: config.response_budget(),
        }
    }

    /// Run (or join) the send for `execution_id`.
    ///
    /// Errors only when the activity is not published; every delivery
    /// problem is reported inside the returned outcome.
    pub async fn execute(
        &self,
        activity_id: &ActivityInstanceId,
        execution_id: ExecutionId,
        contact_data: Map<String, Value>,
    ) -> Result<ExecutionOutcome, ActivityError> {
        self.inflight.prune(Instant::now());

        // A redelivered callback shares the original flight even when the
        // activity left `published` after that flight started.
        if let Some(flight) = self.inflight.join(&execution_id) {
            return Ok(self.within_budget(execution_id, flight).await);
        }

        let instance = match self.store.get(activity_id) {
            Ok(instance) => instance,
            Err(ActivityError::NotFound) => {
                return Err(ActivityError::InvalidTransition {
                    from: ActivityStatus::Unconfigured,
                    to: ActivityStatus::Published,
                });
            }
            Err(err) => return Err(err),
        };
        if instance.status != ActivityStatus::Published {
            return Err(ActivityError::InvalidTransition {
                from: instance.status,
                to: ActivityStatus::Published,
            });
        }

        let flight = self.inflight.join_or_start(&execution_id, || {
            let span = tracing::info_span!(
                "execution",
                activity_id = %activity_id,
                execution_id = %execution_id,
            );
            deliver(
                Arc::clone(&self.credentials),
                Arc::clone(&self.mail),
                self.policy.clone(),
                execution_id.clone(),
                instance,
                contact_data,
            )
            .instrument(span)
        });

        Ok(self.within_budget(execution_id, flight).await)
    }

    /// Wait for `flight` up to the response budget, then answer `pending`.
    async fn within_budget(&self, execution_id: ExecutionId, flight: OutcomeFlight) -> ExecutionOutcome {
        match tokio::time::timeout(self.response_budget, flight).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::info!(
                    execution_id = %execution_id,
                    budget_ms = self.response_budget.as_millis() as u64,
                    "execution still in flight, answering pending"
                );
                ExecutionOutcome::pending(execution_id)
            }
        }
    }
}

/// Build the mail send for one contact from the saved configuration.
///
/// The contact field mapped to `email` is the recipient; every other mapping
/// entry becomes a template field, skipped when the contact lacks it.
pub fn build_request(
    config: &ActivityConfig,
    execution_id: &ExecutionId,
    contact_data: &Map<String, Value>,
) -> Result<DeliveryRequest, DeliveryError> {
    let source = config
        .recipient_source()
        .unwrap_or(ActivityConfig::RECIPIENT_FIELD);
    let to = contact_data
        .get(source)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| DeliveryError::MissingRecipient(source.to_string()))?;

    let fields = config
        .mapping
        .iter()
        .filter(|(name, _)| name.as_str() != ActivityConfig::RECIPIENT_FIELD)
        .filter_map(|(name, source)| {
            contact_data
                .get(source)
                .map(|value| (name.clone(), value.clone()))
        })
        .collect();

    Ok(DeliveryRequest {
        template: config.template.clone(),
        to: to.to_string(),
        subject: config.subject.clone(),
        fields,
        metadata: config.metadata.clone(),
        idempotency_key: execution_id.to_string(),
    })
}

async fn deliver<E, M>(
    credentials: Arc<CredentialCache<E>>,
    mail: Arc<M>,
    policy: RetryPolicy,
    execution_id: ExecutionId,
    instance: Arc<ActivityInstance>,
    contact_data: Map<String, Value>,
) -> ExecutionOutcome
where
    E: TokenExchanger + 'static,
    M: MailClient,
{
    let request = match build_request(&instance.config, &execution_id, &contact_data) {
        Ok(request) => request,
        Err(err) => {
            tracing::warn!(error = %err, "execution rejected before sending");
            return failed(execution_id, 0, &err);
        }
    };

    let mut attempt = 0;
    loop {
        let token = match credentials.get_token().await {
            Ok(token) => token,
            Err(err) => {
                let err = DeliveryError::from(err);
                tracing::warn!(error = %err, attempts = attempt, "no mail API token, execution failed");
                return failed(execution_id, attempt, &err);
            }
        };

        attempt += 1;
        match mail.send(&token, &request).await {
            Ok(receipt) => {
                tracing::info!(
                    attempts = attempt,
                    delivery_id = receipt.delivery_id.as_deref().unwrap_or("-"),
                    "mail sent"
                );
                return ExecutionOutcome::sent(execution_id, attempt, receipt.delivery_id);
            }
            Err(err) => {
                if err.invalidates_token() {
                    credentials.invalidate();
                }
                if policy.should_retry(attempt, &err) {
                    let delay = policy.backoff(attempt);
                    tracing::warn!(
                        error = %err,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "mail send failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                tracing::warn!(error = %err, attempts = attempt, "mail send failed");
                return failed(execution_id, attempt, &err);
            }
        }
    }
}

fn failed(execution_id: ExecutionId, attempts: u32, err: &DeliveryError) -> ExecutionOutcome {
    ExecutionOutcome::failed(execution_id, attempts, err.code(), outcome_message(err))
}

/// Short message for the orchestrator; provider bodies stay in the logs.
pub(crate) fn outcome_message(err: &DeliveryError) -> String {
    match err {
        DeliveryError::Transport(_) => "mail API unreachable".to_string(),
        DeliveryError::Server { status, .. } => format!("mail API returned HTTP {status}"),
        DeliveryError::Client { status, .. } => {
            format!("mail API rejected the request (HTTP {status})")
        }
        DeliveryError::MissingRecipient(_) => err.to_string(),
        DeliveryError::InvalidResponse(_) => "mail API returned an unreadable response".to_string(),
        DeliveryError::Credential(_) => "could not obtain mail API credentials".to_string(),
    }
}
