//! Transport-neutral callback replies.

use serde::Serialize;
use serde_json::{Value, json};

use mailstep_types::activity::{ActivityInstanceId, ActivityStatus};
use mailstep_types::error::ActivityError;

/// Reply class; the API layer maps it onto an HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Ok,
    BadRequest,
    Unauthorized,
}

/// One entry of the `errors` array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorItem {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    pub message: String,
}

impl ErrorItem {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            field: None,
            message: message.into(),
        }
    }

    /// Expand an activity error into one item per reported problem.
    pub fn from_activity_error(err: &ActivityError) -> Vec<Self> {
        match err {
            ActivityError::Configuration { issues } | ActivityError::Validation { issues } => issues
                .iter()
                .map(|issue| Self {
                    code: issue.kind.code().to_string(),
                    field: Some(issue.field.clone()),
                    message: issue.message.clone(),
                })
                .collect(),
            ActivityError::InvalidTransition { .. } => {
                vec![Self::new("invalid_lifecycle_transition", err.to_string())]
            }
            ActivityError::NotFound => vec![Self::new("not_found", err.to_string())],
            ActivityError::Storage(_) => {
                vec![Self::new("storage_error", "activity store unavailable")]
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallbackResponse {
    pub status: ReplyStatus,
    pub body: Value,
}

impl CallbackResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: ReplyStatus::Ok,
            body,
        }
    }

    /// Successful lifecycle transition.
    pub fn activity(id: &ActivityInstanceId, status: ActivityStatus) -> Self {
        Self::ok(json!({
            "success": true,
            "activityInstanceId": id,
            "status": status,
        }))
    }

    /// Rejected lifecycle call; HTTP 200 with the problems as data.
    pub fn activity_rejected(id: &ActivityInstanceId, status: ActivityStatus, errors: Vec<ErrorItem>) -> Self {
        Self::ok(json!({
            "success": false,
            "activityInstanceId": id,
            "status": status,
            "errors": errors,
        }))
    }

    pub fn bad_request(code: &str, message: impl Into<String>) -> Self {
        Self::failure(ReplyStatus::BadRequest, ErrorItem::new(code, message))
    }

    pub fn unauthorized() -> Self {
        Self::failure(
            ReplyStatus::Unauthorized,
            ErrorItem::new("authentication_failed", "callback token rejected"),
        )
    }

    /// HTTP 200 failure outside the activity lifecycle (auxiliary calls).
    pub fn rejected(errors: Vec<ErrorItem>) -> Self {
        Self::ok(json!({"success": false, "errors": errors}))
    }

    fn failure(status: ReplyStatus, error: ErrorItem) -> Self {
        Self {
            status,
            body: json!({"success": false, "errors": [error]}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailstep_types::activity::{ConfigIssue, IssueKind};

    #[test]
    fn test_issues_become_field_errors() {
        let err = ActivityError::Validation {
            issues: vec![
                ConfigIssue::new("mapping.email", IssueKind::MissingMapping, "recipient required"),
                ConfigIssue::new("template", IssueKind::UnknownTemplate, "template 'T9' does not exist"),
            ],
        };
        let items = ErrorItem::from_activity_error(&err);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].code, "missing_mapping");
        assert_eq!(items[0].field.as_deref(), Some("mapping.email"));
    }

    #[test]
    fn test_storage_detail_is_not_exposed() {
        let items = ErrorItem::from_activity_error(&ActivityError::Storage("/var/lib/mailstep: EACCES".into()));
        assert_eq!(items[0].code, "storage_error");
        assert!(!items[0].message.contains("EACCES"));
    }

    #[test]
    fn test_unauthorized_shape() {
        let response = CallbackResponse::unauthorized();
        assert_eq!(response.status, ReplyStatus::Unauthorized);
        assert_eq!(response.body["success"], false);
        assert_eq!(response.body["errors"][0]["code"], "authentication_failed");
        assert!(response.body["errors"][0].get("field").is_none());
    }

    #[test]
    fn test_activity_reply_shape() {
        let response = CallbackResponse::activity(&ActivityInstanceId::new("act-1"), ActivityStatus::Saved);
        assert_eq!(
            response.body,
            json!({"success": true, "activityInstanceId": "act-1", "status": "saved"})
        );
    }
}
