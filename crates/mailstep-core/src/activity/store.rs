//! Activity configuration store.
//!
//! Owns the save/validate/publish transitions for activity instances:
//!
//! ```text
//! unconfigured --save--> saved --validate--> validated --publish--> published
//!                          ^                     |                      |
//!                          +------- save --------+-------- save --------+
//! ```
//!
//! Validate may be re-run from saved, validated or published; a re-save
//! always regresses to saved so the orchestrator must validate again before
//! publishing.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use mailstep_types::activity::{ActivityInstance, ActivityInstanceId, ActivityStatus};
use mailstep_types::error::ActivityError;

use super::repository::ActivityRepository;
use super::schema::{SchemaRules, cross_check, parse_config};

pub struct ActivityConfigStore {
    repo: Arc<dyn ActivityRepository>,
    rules: SchemaRules,
}

impl ActivityConfigStore {
    pub fn new(repo: Arc<dyn ActivityRepository>, rules: SchemaRules) -> Self {
        Self { repo, rules }
    }

    /// Check and store a configuration payload; status becomes `saved`.
    ///
    /// On schema failure nothing is written and every issue is returned.
    pub fn save(
        &self,
        id: &ActivityInstanceId,
        payload: &Value,
    ) -> Result<Arc<ActivityInstance>, ActivityError> {
        let config =
            parse_config(payload).map_err(|issues| ActivityError::Configuration { issues })?;

        let saved = self.repo.update(id, &mut |existing| {
            if let Some(previous) = existing {
                if previous.status == ActivityStatus::Published {
                    tracing::info!(activity_id = %id, "re-save of published activity, status regresses to saved");
                }
            }
            Ok(ActivityInstance {
                id: id.clone(),
                config: config.clone(),
                status: ActivityStatus::Saved,
                updated_at: Utc::now(),
            })
        })?;

        tracing::debug!(activity_id = %id, template = %saved.config.template, "activity configuration saved");
        Ok(saved)
    }

    /// Re-run schema and cross-field checks on the stored payload; status
    /// becomes `validated` when everything passes.
    pub fn validate(&self, id: &ActivityInstanceId) -> Result<Arc<ActivityInstance>, ActivityError> {
        self.repo.update(id, &mut |existing| {
            let Some(current) = existing else {
                return Err(ActivityError::InvalidTransition {
                    from: ActivityStatus::Unconfigured,
                    to: ActivityStatus::Validated,
                });
            };

            let payload = serde_json::to_value(&current.config)
                .map_err(|e| ActivityError::Storage(e.to_string()))?;
            let config =
                parse_config(&payload).map_err(|issues| ActivityError::Validation { issues })?;

            let issues = cross_check(&config, &self.rules);
            if !issues.is_empty() {
                return Err(ActivityError::Validation { issues });
            }

            Ok(ActivityInstance {
                status: ActivityStatus::Validated,
                updated_at: Utc::now(),
                ..current.clone()
            })
        })
    }

    /// Promote a validated instance to `published`.
    pub fn publish(&self, id: &ActivityInstanceId) -> Result<Arc<ActivityInstance>, ActivityError> {
        self.repo.update(id, &mut |existing| {
            let from = existing.map_or(ActivityStatus::Unconfigured, |c| c.status);
            match existing {
                Some(current) if current.status == ActivityStatus::Validated => Ok(ActivityInstance {
                    status: ActivityStatus::Published,
                    updated_at: Utc::now(),
                    ..current.clone()
                }),
                _ => Err(ActivityError::InvalidTransition {
                    from,
                    to: ActivityStatus::Published,
                }),
            }
        })
    }

    pub fn get(&self, id: &ActivityInstanceId) -> Result<Arc<ActivityInstance>, ActivityError> {
        self.repo.get(id)?.ok_or(ActivityError::NotFound)
    }

    /// Current status, `unconfigured` for instances never saved.
    pub fn status_of(&self, id: &ActivityInstanceId) -> ActivityStatus {
        match self.repo.get(id) {
            Ok(Some(instance)) => instance.status,
            _ => ActivityStatus::Unconfigured,
        }
    }
}
