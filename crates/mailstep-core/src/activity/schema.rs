//! Configuration payload schema.
//!
//! Two layers of checks:
//! - [`parse_config`] -- structural checks run at save time (types, required
//!   fields, unknown fields). Every problem is collected, not just the first.
//! - [`cross_check`] -- consistency checks run at validate time (recipient
//!   mapping present, template known, no blank references).

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use mailstep_types::activity::{ActivityConfig, ConfigIssue, IssueKind};

const KNOWN_FIELDS: [&str; 4] = ["template", "mapping", "subject", "metadata"];

/// Deployment-specific validation rules.
#[derive(Debug, Clone, Default)]
pub struct SchemaRules {
    /// Accepted template references. Empty accepts any template.
    pub known_templates: BTreeSet<String>,
}

impl SchemaRules {
    pub fn new(known_templates: impl IntoIterator<Item = String>) -> Self {
        Self {
            known_templates: known_templates.into_iter().collect(),
        }
    }
}

/// Parse and structurally check a saved configuration payload.
pub fn parse_config(payload: &Value) -> Result<ActivityConfig, Vec<ConfigIssue>> {
    let Some(object) = payload.as_object() else {
        return Err(vec![ConfigIssue::new(
            "$",
            IssueKind::InvalidType,
            "configuration must be a JSON object",
        )]);
    };

    let mut issues = Vec::new();

    for key in object.keys() {
        if !KNOWN_FIELDS.contains(&key.as_str()) {
            issues.push(ConfigIssue::new(
                key.clone(),
                IssueKind::UnknownField,
                format!("unrecognized field '{key}'"),
            ));
        }
    }

    let template = match object.get("template") {
        None | Some(Value::Null) => {
            issues.push(ConfigIssue::new("template", IssueKind::Missing, "template is required"));
            None
        }
        Some(Value::String(s)) if s.trim().is_empty() => {
            issues.push(ConfigIssue::new("template", IssueKind::Blank, "template must not be blank"));
            None
        }
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            issues.push(ConfigIssue::new("template", IssueKind::InvalidType, "template must be a string"));
            None
        }
    };

    let mapping = match object.get("mapping") {
        None | Some(Value::Null) => {
            issues.push(ConfigIssue::new("mapping", IssueKind::Missing, "mapping is required"));
            None
        }
        Some(Value::Object(entries)) => parse_mapping(entries, &mut issues),
        Some(_) => {
            issues.push(ConfigIssue::new("mapping", IssueKind::InvalidType, "mapping must be an object"));
            None
        }
    };

    let subject = match object.get("subject") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => {
            issues.push(ConfigIssue::new("subject", IssueKind::InvalidType, "subject must be a string"));
            None
        }
    };

    let metadata = match object.get("metadata") {
        None | Some(Value::Null) => None,
        Some(Value::Object(m)) => Some(m.clone()),
        Some(_) => {
            issues.push(ConfigIssue::new("metadata", IssueKind::InvalidType, "metadata must be an object"));
            None
        }
    };

    match (template, mapping) {
        (Some(template), Some(mapping)) if issues.is_empty() => Ok(ActivityConfig {
            template,
            mapping,
            subject,
            metadata,
        }),
        _ => Err(issues),
    }
}

fn parse_mapping(
    entries: &Map<String, Value>,
    issues: &mut Vec<ConfigIssue>,
) -> Option<BTreeMap<String, String>> {
    let before = issues.len();
    let mut mapping = BTreeMap::new();

    for (name, source) in entries {
        if name.trim().is_empty() {
            issues.push(ConfigIssue::new("mapping", IssueKind::Blank, "mapping keys must not be blank"));
            continue;
        }
        match source {
            Value::String(s) => {
                mapping.insert(name.clone(), s.clone());
            }
            _ => issues.push(ConfigIssue::new(
                format!("mapping.{name}"),
                IssueKind::InvalidType,
                "mapping values must be contact field names (strings)",
            )),
        }
    }

    (issues.len() == before).then_some(mapping)
}

/// Cross-field consistency checks. Returns every problem found.
pub fn cross_check(config: &ActivityConfig, rules: &SchemaRules) -> Vec<ConfigIssue> {
    let mut issues = Vec::new();

    if config.recipient_source().is_none() {
        issues.push(ConfigIssue::new(
            format!("mapping.{}", ActivityConfig::RECIPIENT_FIELD),
            IssueKind::MissingMapping,
            "a contact field must be mapped to the recipient address",
        ));
    }

    for (name, source) in &config.mapping {
        if source.trim().is_empty() {
            issues.push(ConfigIssue::new(
                format!("mapping.{name}"),
                IssueKind::Blank,
                "mapped contact field must not be blank",
            ));
        }
    }

    if !rules.known_templates.is_empty() && !rules.known_templates.contains(&config.template) {
        issues.push(ConfigIssue::new(
            "template",
            IssueKind::UnknownTemplate,
            format!("template '{}' does not exist", config.template),
        ));
    }

    if config.subject.as_deref().is_some_and(|s| s.trim().is_empty()) {
        issues.push(ConfigIssue::new("subject", IssueKind::Blank, "subject must not be blank when set"));
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn kinds(issues: &[ConfigIssue]) -> Vec<(String, IssueKind)> {
        issues.iter().map(|i| (i.field.clone(), i.kind)).collect()
    }

    // -------------------------------------------------------------------
    // parse_config
    // -------------------------------------------------------------------

    #[test]
    fn test_parse_minimal_config() {
        let config = parse_config(&json!({
            "template": "T1",
            "mapping": {"email": "ContactEmail"}
        }))
        .unwrap();
        assert_eq!(config.template, "T1");
        assert_eq!(config.recipient_source(), Some("ContactEmail"));
        assert!(config.subject.is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(&json!({
            "template": "T1",
            "mapping": {"email": "ContactEmail", "first_name": "FirstName"},
            "subject": "Hello",
            "metadata": {"campaign": "spring"}
        }))
        .unwrap();
        assert_eq!(config.mapping.len(), 2);
        assert_eq!(config.subject.as_deref(), Some("Hello"));
        assert_eq!(config.metadata.unwrap()["campaign"], "spring");
    }

    #[test]
    fn test_parse_rejects_non_object() {
        let issues = parse_config(&json!(["T1"])).unwrap_err();
        assert_eq!(kinds(&issues), vec![("$".to_string(), IssueKind::InvalidType)]);
    }

    #[test]
    fn test_parse_collects_every_issue() {
        let issues = parse_config(&json!({
            "template": 7,
            "mapping": {"email": 3},
            "subject": false,
            "extra": true
        }))
        .unwrap_err();
        let found = kinds(&issues);
        assert!(found.contains(&("extra".to_string(), IssueKind::UnknownField)));
        assert!(found.contains(&("template".to_string(), IssueKind::InvalidType)));
        assert!(found.contains(&("mapping.email".to_string(), IssueKind::InvalidType)));
        assert!(found.contains(&("subject".to_string(), IssueKind::InvalidType)));
        assert_eq!(found.len(), 4);
    }

    #[test]
    fn test_parse_missing_required_fields() {
        let issues = parse_config(&json!({})).unwrap_err();
        assert_eq!(
            kinds(&issues),
            vec![
                ("template".to_string(), IssueKind::Missing),
                ("mapping".to_string(), IssueKind::Missing),
            ]
        );
    }

    #[test]
    fn test_parse_blank_template() {
        let issues = parse_config(&json!({"template": "  ", "mapping": {}})).unwrap_err();
        assert_eq!(kinds(&issues), vec![("template".to_string(), IssueKind::Blank)]);
    }

    // -------------------------------------------------------------------
    // cross_check
    // -------------------------------------------------------------------

    #[test]
    fn test_cross_check_passes_valid_config() {
        let config = parse_config(&json!({
            "template": "T1",
            "mapping": {"email": "ContactEmail"}
        }))
        .unwrap();
        assert!(cross_check(&config, &SchemaRules::default()).is_empty());
        assert!(cross_check(&config, &SchemaRules::new(["T1".to_string()])).is_empty());
    }

    #[test]
    fn test_cross_check_reports_all_problems() {
        let config = parse_config(&json!({
            "template": "T9",
            "mapping": {"first_name": " "},
            "subject": ""
        }))
        .unwrap();
        let issues = cross_check(&config, &SchemaRules::new(["T1".to_string()]));
        let found = kinds(&issues);
        assert!(found.contains(&("mapping.email".to_string(), IssueKind::MissingMapping)));
        assert!(found.contains(&("mapping.first_name".to_string(), IssueKind::Blank)));
        assert!(found.contains(&("template".to_string(), IssueKind::UnknownTemplate)));
        assert!(found.contains(&("subject".to_string(), IssueKind::Blank)));
        assert_eq!(found.len(), 4);
    }
}
