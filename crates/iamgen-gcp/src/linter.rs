//! IAM `iamPolicies:lintPolicy`.

use crate::auth::AccessTokenSource;
use crate::http::send_json;
use async_trait::async_trait;
use iamgen_core::{Condition, LintResult};
use iamgen_policy::{PolicyLinter, StoreError};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

pub struct IamPolicyLinter {
    http: reqwest::Client,
    endpoint: String,
    tokens: Arc<AccessTokenSource>,
}

impl IamPolicyLinter {
    pub fn new(http: reqwest::Client, iam_url: &str, tokens: Arc<AccessTokenSource>) -> Self {
        Self {
            http,
            endpoint: format!("{}/iamPolicies:lintPolicy", iam_url.trim_end_matches('/')),
            tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LintResponse {
    #[serde(default)]
    lint_results: Vec<LintResult>,
}

fn lint_body(resource_name: &str, condition: &Condition) -> Value {
    json!({
        "fullResourceName": resource_name,
        "condition": condition,
    })
}

#[async_trait]
impl PolicyLinter for IamPolicyLinter {
    async fn lint(
        &self,
        resource_name: &str,
        condition: &Condition,
    ) -> Result<Vec<LintResult>, StoreError> {
        let token = self.tokens.token().await?;
        let request = self
            .http
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(&lint_body(resource_name, condition));
        let response: LintResponse = send_json(request, "lintPolicy").await?;
        Ok(response.lint_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn body_carries_resource_and_condition() {
        let condition = Condition {
            title: "expires".into(),
            description: Some("temporary".into()),
            expression: "request.time < timestamp(\"2030-01-01T00:00:00Z\")".into(),
            location: None,
        };
        let body = lint_body("//cloudresourcemanager.googleapis.com/projects/p", &condition);
        assert_eq!(
            body,
            json!({
                "fullResourceName": "//cloudresourcemanager.googleapis.com/projects/p",
                "condition": {
                    "title": "expires",
                    "description": "temporary",
                    "expression": "request.time < timestamp(\"2030-01-01T00:00:00Z\")"
                }
            })
        );
    }

    #[test]
    fn response_without_results_is_clean() {
        let parsed: LintResponse = serde_json::from_value(json!({})).unwrap();
        assert!(parsed.lint_results.is_empty());

        let parsed: LintResponse = serde_json::from_value(json!({
            "lintResults": [{
                "level": "CONDITION",
                "validationUnitName": "LintValidationUnits/ConditionSyntax",
                "severity": "ERROR",
                "fieldName": "condition.expression",
                "location": {"start": 0},
                "debugMessage": "Parse error"
            }]
        }))
        .unwrap();
        assert_eq!(parsed.lint_results[0].severity, "ERROR");
        assert_eq!(parsed.lint_results[0].debug_message, "Parse error");
    }
}
