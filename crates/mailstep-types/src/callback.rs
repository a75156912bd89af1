//! Types carried by orchestrator lifecycle callbacks.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::activity::ActivityInstanceId;

/// Decoded claim set of the signed token attached to every callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackClaims {
    /// The activity placement this callback concerns.
    pub activity_instance_id: ActivityInstanceId,
    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journey_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

/// A lifecycle callback as handed over by the transport layer.
#[derive(Debug, Clone, Default)]
pub struct CallbackRequest {
    /// Signed callback token, if the transport found one.
    pub token: Option<String>,
    /// Parsed JSON body (`Null` when the body was empty).
    pub body: Value,
}

impl CallbackRequest {
    pub fn new(token: Option<String>, body: Value) -> Self {
        Self { token, body }
    }
}

/// The lifecycle stage a callback belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallbackStage {
    Save,
    Validate,
    Publish,
    Execute,
}

impl fmt::Display for CallbackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackStage::Save => write!(f, "save"),
            CallbackStage::Validate => write!(f, "validate"),
            CallbackStage::Publish => write!(f, "publish"),
            CallbackStage::Execute => write!(f, "execute"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_claims_use_camel_case_names() {
        let claims: CallbackClaims = serde_json::from_value(json!({
            "activityInstanceId": "act-1",
            "iat": 1_700_000_000,
            "journeyId": "j-9"
        }))
        .unwrap();
        assert_eq!(claims.activity_instance_id.as_str(), "act-1");
        assert_eq!(claims.journey_id.as_deref(), Some("j-9"));
        assert!(claims.exp.is_none());
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(CallbackStage::Execute.to_string(), "execute");
        assert_eq!(CallbackStage::Save.to_string(), "save");
    }
}
