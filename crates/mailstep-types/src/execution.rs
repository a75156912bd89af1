//! Per-contact execution types: outcomes and the outbound delivery request.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque identifier of one contact passing through one activity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(pub String);

impl ExecutionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// The send is still in flight.
    Pending,
    Sent,
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutcomeStatus::Pending => write!(f, "pending"),
            OutcomeStatus::Sent => write!(f, "sent"),
            OutcomeStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Machine-readable failure detail carried back to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeError {
    pub code: String,
    pub message: String,
}

/// Result of one execution, shared by every caller of the same execution id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub execution_id: ExecutionId,
    #[serde(rename = "outcome")]
    pub status: OutcomeStatus,
    /// Downstream send attempts actually issued.
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
}

impl ExecutionOutcome {
    pub fn sent(execution_id: ExecutionId, attempts: u32, delivery_id: Option<String>) -> Self {
        Self {
            execution_id,
            status: OutcomeStatus::Sent,
            attempts,
            delivery_id,
            error: None,
        }
    }

    pub fn failed(
        execution_id: ExecutionId,
        attempts: u32,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            execution_id,
            status: OutcomeStatus::Failed,
            attempts,
            delivery_id: None,
            error: Some(OutcomeError {
                code: code.into(),
                message: message.into(),
            }),
        }
    }

    pub fn pending(execution_id: ExecutionId) -> Self {
        Self {
            execution_id,
            status: OutcomeStatus::Pending,
            attempts: 0,
            delivery_id: None,
            error: None,
        }
    }

    pub fn is_sent(&self) -> bool {
        self.status == OutcomeStatus::Sent
    }
}

/// Body of one send call to the mail API.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryRequest {
    pub template: String,
    /// Recipient address.
    pub to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Mail field -> contact value.
    pub fields: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    /// Sent as the `Idempotency-Key` header, not in the body.
    #[serde(skip)]
    pub idempotency_key: String,
}

/// Successful send acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeliveryReceipt {
    pub delivery_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outcome_wire_shape() {
        let outcome = ExecutionOutcome::sent(ExecutionId::new("ex-1"), 1, Some("d-42".into()));
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(
            value,
            json!({"executionId": "ex-1", "outcome": "sent", "attempts": 1, "deliveryId": "d-42"})
        );
    }

    #[test]
    fn test_failed_outcome_carries_error() {
        let outcome = ExecutionOutcome::failed(ExecutionId::new("ex-2"), 1, "client_error", "HTTP 422");
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["outcome"], "failed");
        assert_eq!(value["error"]["code"], "client_error");
        assert!(value.get("deliveryId").is_none());
    }

    #[test]
    fn test_delivery_request_skips_idempotency_key() {
        let request = DeliveryRequest {
            template: "T1".into(),
            to: "a@example.com".into(),
            subject: None,
            fields: BTreeMap::new(),
            metadata: None,
            idempotency_key: "ex-1".into(),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value, json!({"template": "T1", "to": "a@example.com", "fields": {}}));
    }
}
