//! In-process doubles for the core ports, shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::{Value, json};

use mailstep_types::activity::ActivityInstanceId;
use mailstep_types::callback::CallbackClaims;
use mailstep_types::credential::AccessToken;
use mailstep_types::error::{AuthenticationError, CredentialExchangeError, DeliveryError};
use mailstep_types::execution::{DeliveryReceipt, DeliveryRequest};

use crate::activity::{ActivityConfigStore, InMemoryActivityRepository, SchemaRules};
use crate::auth::CallbackVerifier;
use crate::credential::{TokenExchanger, TokenGrant};
use crate::dispatch::MailClient;

/// Hands out numbered bearer tokens, or fails every time when `fail` is set.
pub struct StubExchanger {
    pub calls: Arc<AtomicUsize>,
    pub fail: bool,
}

impl StubExchanger {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }
}

impl TokenExchanger for StubExchanger {
    async fn exchange(&self) -> Result<TokenGrant, CredentialExchangeError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail {
            return Err(CredentialExchangeError::Rejected { status: 401 });
        }
        Ok(TokenGrant {
            access_token: SecretString::from(format!("token-{n}")),
            token_type: "Bearer".to_string(),
            expires_in: Duration::from_secs(3_600),
        })
    }
}

/// Mail client answering from a script; once the script runs out every send
/// succeeds with a numbered delivery id.
pub struct ScriptedMail {
    pub calls: Arc<AtomicUsize>,
    pub delay: Duration,
    script: Mutex<VecDeque<Result<DeliveryReceipt, DeliveryError>>>,
    requests: Mutex<Vec<(String, DeliveryRequest)>>,
    templates: Vec<(String, String)>,
}

impl ScriptedMail {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(AtomicUsize::new(0)),
            delay: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            templates: Vec::new(),
        }
    }

    pub fn with_script(
        script: impl IntoIterator<Item = Result<DeliveryReceipt, DeliveryError>>,
    ) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_template(mut self, template: &str, key: &str) -> Self {
        self.templates.push((template.to_string(), key.to_string()));
        self
    }

    pub fn sends(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests seen so far, with the bearer token each one carried.
    pub fn requests(&self) -> Vec<(String, DeliveryRequest)> {
        self.requests.lock().unwrap().clone()
    }
}

impl MailClient for ScriptedMail {
    async fn send(
        &self,
        token: &AccessToken,
        request: &DeliveryRequest,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests
            .lock()
            .unwrap()
            .push((token.value().expose_secret().to_string(), request.clone()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| {
            Ok(DeliveryReceipt {
                delivery_id: Some(format!("d-{n}")),
            })
        })
    }

    async fn template_key(
        &self,
        _token: &AccessToken,
        template: &str,
    ) -> Result<Option<String>, DeliveryError> {
        Ok(self
            .templates
            .iter()
            .find(|(name, _)| name == template)
            .map(|(_, key)| key.clone()))
    }
}

/// Accepts `valid:<activity id>` and rejects everything else.
pub struct StubVerifier;

impl CallbackVerifier for StubVerifier {
    fn verify(&self, token: &str) -> Result<CallbackClaims, AuthenticationError> {
        let id = token
            .strip_prefix("valid:")
            .ok_or(AuthenticationError::InvalidSignature)?;
        Ok(CallbackClaims {
            activity_instance_id: ActivityInstanceId::new(id),
            iat: 0,
            exp: None,
            journey_id: None,
            jti: None,
        })
    }
}

pub fn store() -> Arc<ActivityConfigStore> {
    Arc::new(ActivityConfigStore::new(
        Arc::new(InMemoryActivityRepository::new()),
        SchemaRules::default(),
    ))
}

pub fn config_payload() -> Value {
    json!({
        "template": "T1",
        "mapping": {"email": "ContactEmail", "first_name": "FirstName"},
        "subject": "Hello"
    })
}

/// Store with `id` saved, validated and published.
pub fn published_store(id: &ActivityInstanceId) -> Arc<ActivityConfigStore> {
    let store = store();
    store.save(id, &config_payload()).unwrap();
    store.validate(id).unwrap();
    store.publish(id).unwrap();
    store
}
