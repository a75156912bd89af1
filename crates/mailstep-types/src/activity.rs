use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque identifier the orchestrator assigns to one activity placement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityInstanceId(pub String);

impl ActivityInstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActivityInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Activity instance lifecycle states.
///
/// - Unconfigured: never saved (no record exists)
/// - Saved: configuration stored, not yet checked for cross-field consistency
/// - Validated: configuration passed all checks, ready to publish
/// - Published: live in a running journey, contacts may be executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Unconfigured,
    Saved,
    Validated,
    Published,
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActivityStatus::Unconfigured => write!(f, "unconfigured"),
            ActivityStatus::Saved => write!(f, "saved"),
            ActivityStatus::Validated => write!(f, "validated"),
            ActivityStatus::Published => write!(f, "published"),
        }
    }
}

impl FromStr for ActivityStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unconfigured" => Ok(ActivityStatus::Unconfigured),
            "saved" => Ok(ActivityStatus::Saved),
            "validated" => Ok(ActivityStatus::Validated),
            "published" => Ok(ActivityStatus::Published),
            other => Err(format!("invalid activity status: '{other}'")),
        }
    }
}

impl Default for ActivityStatus {
    fn default() -> Self {
        ActivityStatus::Unconfigured
    }
}

/// Configuration payload saved for one activity instance.
///
/// `mapping` maps a mail field name to the contact data field that supplies
/// it. The `email` entry names the recipient field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivityConfig {
    /// Mailing template reference in the downstream mail API.
    pub template: String,
    /// Mail field -> contact data field.
    pub mapping: BTreeMap<String, String>,
    /// Optional subject override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Opaque values forwarded with every send.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl ActivityConfig {
    /// Mapping key that names the recipient address field.
    pub const RECIPIENT_FIELD: &'static str = "email";

    /// The contact data field holding the recipient address, if mapped.
    pub fn recipient_source(&self) -> Option<&str> {
        self.mapping.get(Self::RECIPIENT_FIELD).map(String::as_str)
    }
}

/// One configured placement of the custom activity within a journey.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityInstance {
    pub id: ActivityInstanceId,
    pub config: ActivityConfig,
    pub status: ActivityStatus,
    pub updated_at: DateTime<Utc>,
}

/// Category of a configuration problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Missing,
    InvalidType,
    Blank,
    UnknownField,
    UnknownTemplate,
    MissingMapping,
}

impl IssueKind {
    /// Same string the serde representation uses.
    pub fn code(&self) -> &'static str {
        match self {
            IssueKind::Missing => "missing",
            IssueKind::InvalidType => "invalid_type",
            IssueKind::Blank => "blank",
            IssueKind::UnknownField => "unknown_field",
            IssueKind::UnknownTemplate => "unknown_template",
            IssueKind::MissingMapping => "missing_mapping",
        }
    }
}

/// A single problem found while checking an activity configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigIssue {
    /// Dotted path of the offending field (e.g. `mapping.email`).
    pub field: String,
    pub kind: IssueKind,
    pub message: String,
}

impl ConfigIssue {
    pub fn new(field: impl Into<String>, kind: IssueKind, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
