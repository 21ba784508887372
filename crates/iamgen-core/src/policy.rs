//! IAM policy model.
//!
//! These types mirror the Google Cloud IAM policy resource. `Policy` is what
//! the generator produces; `ExternalPolicy` is what the live store returns and
//! carries provider metadata that must survive a read-modify-write cycle.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Member prefixes accepted by the generator contract.
pub const MEMBER_PREFIXES: [&str; 4] = ["user:", "serviceAccount:", "group:", "domain:"];

static ROLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(roles/[A-Za-z0-9_.]+|custom\.[A-Za-z0-9_.]+|(projects|organizations)/[A-Za-z0-9_.\-]+/roles/[A-Za-z0-9_.]+)$",
    )
    .expect("role pattern must compile")
});

/// IAM condition attached to a binding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub expression: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// A role granted to a set of members, optionally under a condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl Binding {
    pub fn new(role: impl Into<String>, members: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            role: role.into(),
            members: members.into_iter().map(Into::into).collect(),
            condition: None,
        }
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Advisory shape check for role name and member prefixes.
    ///
    /// This is not a policy validator: role existence, least privilege and
    /// member validity are judged by the validation model and finally by the
    /// store. Callers use the returned notes for logging only.
    pub fn lint_shape(&self) -> Vec<String> {
        let mut notes = Vec::new();
        if !ROLE_PATTERN.is_match(&self.role) {
            notes.push(format!("role '{}' is not a predefined or custom role name", self.role));
        }
        for member in &self.members {
            if !MEMBER_PREFIXES.iter().any(|p| member.starts_with(p)) {
                notes.push(format!(
                    "member '{}' in role '{}' has no recognised prefix",
                    member, self.role
                ));
            }
        }
        notes
    }
}

/// Ordered list of bindings as produced by the generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

impl Policy {
    pub fn new(bindings: Vec<Binding>) -> Self {
        Self { bindings }
    }

    /// Pretty JSON rendering returned to HTTP callers and fed back to models.
    pub fn to_pretty_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Bindings that carry a condition, paired with it.
pub fn conditional_bindings(
    bindings: &[Binding],
) -> impl Iterator<Item = (&Binding, &Condition)> {
    bindings
        .iter()
        .filter_map(|b| b.condition.as_ref().map(|c| (b, c)))
}

/// Live policy fetched from the store.
///
/// Everything except `bindings` is opaque to iamgen and is written back
/// exactly as it was read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExternalPolicy {
    #[serde(default)]
    pub bindings: Vec<Binding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// auditConfigs and any field a newer API version adds.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// One finding from the policy linter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LintResult {
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub debug_message: String,
    #[serde(default)]
    pub field_name: String,
}

impl LintResult {
    /// `[severity] message (field: fieldName)`
    pub fn describe(&self) -> String {
        format!(
            "[{}] {} (field: {})",
            self.severity, self.debug_message, self.field_name
        )
    }
}

/// A project the caller can apply policies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
}

/// Full resource name used by the IAM linter for a project.
pub fn project_resource_name(project_id: &str) -> String {
    format!("//cloudresourcemanager.googleapis.com/projects/{}", project_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn external_policy_round_trips_unknown_fields() {
        let raw = json!({
            "version": 1,
            "etag": "BwXhqDNcXyk=",
            "bindings": [{"role": "roles/owner", "members": ["user:alice@x.com"]}],
            "auditConfigs": [{"service": "allServices", "auditLogConfigs": [{"logType": "DATA_READ"}]}]
        });

        let policy: ExternalPolicy = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(policy.etag.as_deref(), Some("BwXhqDNcXyk="));
        assert!(policy.extra.contains_key("auditConfigs"));

        let back = serde_json::to_value(&policy).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn binding_without_members_deserializes_empty() {
        let b: Binding = serde_json::from_value(json!({"role": "roles/viewer"})).unwrap();
        assert!(b.members.is_empty());
        assert!(b.condition.is_none());
    }

    #[test]
    fn lint_shape_accepts_predefined_and_custom_roles() {
        for role in [
            "roles/viewer",
            "roles/bigquery.dataViewer",
            "custom.auditor",
            "projects/my-proj/roles/deployer",
            "organizations/1234/roles/secops",
        ] {
            let b = Binding::new(role, ["user:bob@x.com"]);
            assert!(b.lint_shape().is_empty(), "{role} should pass");
        }
    }

    #[test]
    fn lint_shape_flags_bad_role_and_member() {
        let b = Binding::new("viewer", ["bob@x.com", "group:ops@x.com"]);
        let notes = b.lint_shape();
        assert_eq!(notes.len(), 2);
        assert!(notes[0].contains("viewer"));
        assert!(notes[1].contains("bob@x.com"));
    }

    #[test]
    fn lint_result_uses_wire_names() {
        let r: LintResult = serde_json::from_value(json!({
            "severity": "ERROR",
            "debugMessage": "Unexpected token",
            "fieldName": "condition.expression",
            "level": "CONDITION"
        }))
        .unwrap();
        assert_eq!(
            r.describe(),
            "[ERROR] Unexpected token (field: condition.expression)"
        );
    }

    #[test]
    fn conditional_bindings_skips_plain_bindings() {
        let policy = Policy::new(vec![
            Binding::new("roles/viewer", ["user:a@x.com"]),
            Binding::new("roles/editor", ["user:b@x.com"]).with_condition(Condition {
                title: "expires".into(),
                description: None,
                expression: "request.time < timestamp(\"2030-01-01T00:00:00Z\")".into(),
                location: None,
            }),
        ]);
        let roles: Vec<_> = conditional_bindings(&policy.bindings)
            .map(|(b, _)| b.role.as_str())
            .collect();
        assert_eq!(roles, vec!["roles/editor"]);
    }
}
