//! Application state wiring.
//!
//! `AppState` is built once at startup and cloned into every axum handler.
//! All services behind it are `Arc`-wrapped, so clones are cheap.

use std::sync::Arc;

use mailstep_core::activity::{
    ActivityConfigStore, ActivityRepository, InMemoryActivityRepository, SchemaRules,
};
use mailstep_core::credential::CredentialCache;
use mailstep_core::lifecycle::LifecycleHandler;
use mailstep_infra::auth::JwtVerifier;
use mailstep_infra::config::check_required;
use mailstep_infra::mail::{HttpMailClient, OAuthTokenExchanger};
use mailstep_infra::storage::FileActivityRepository;
use mailstep_types::config::{RelayConfig, ServerConfig};

use crate::service::CallbackService;

/// Concrete lifecycle handler type used by the server.
pub type Handler = LifecycleHandler<OAuthTokenExchanger, HttpMailClient>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CallbackService>,
    pub server: ServerConfig,
}

impl AppState {
    /// Wire every adapter from the loaded configuration.
    ///
    /// Fails when a required secret or endpoint is missing, or when the
    /// activity data file exists but cannot be read.
    pub fn build(config: &RelayConfig) -> anyhow::Result<Self> {
        check_required(config)?;

        let verifier = JwtVerifier::from_config(&config.orchestrator)?;

        let repo: Arc<dyn ActivityRepository> = match &config.activity.data_file {
            Some(path) => {
                let repo = FileActivityRepository::open(path)?;
                tracing::info!(path = %repo.path().display(), "activity records loaded");
                Arc::new(repo)
            }
            None => {
                tracing::warn!("no activity data_file configured; records are kept in memory only");
                Arc::new(InMemoryActivityRepository::new())
            }
        };
        let rules = SchemaRules::new(config.activity.known_templates.iter().cloned());
        let store = Arc::new(ActivityConfigStore::new(repo, rules));

        let credentials = Arc::new(CredentialCache::new(
            OAuthTokenExchanger::from_config(&config.mail)?,
            config.credentials.refresh_margin(),
        ));
        let mail = Arc::new(HttpMailClient::from_config(&config.mail)?);

        let handler = LifecycleHandler::new(
            Arc::new(verifier),
            store,
            credentials,
            mail,
            &config.dispatch,
        );

        Ok(Self {
            service: Arc::new(CallbackService::new(handler)),
            server: config.server.clone(),
        })
    }
}
