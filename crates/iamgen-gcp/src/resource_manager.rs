//! Cloud Resource Manager v1: project IAM policies and project listing.

use crate::auth::AccessTokenSource;
use crate::http::send_json;
use async_trait::async_trait;
use iamgen_core::{ExternalPolicy, ProjectSummary};
use iamgen_policy::{PolicyStore, ProjectDirectory, StoreError};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

/// Policy version that supports conditional bindings.
const CONDITIONAL_POLICY_VERSION: i64 = 3;

pub struct CloudResourceManager {
    http: reqwest::Client,
    base_url: String,
    tokens: Arc<AccessTokenSource>,
}

impl CloudResourceManager {
    pub fn new(http: reqwest::Client, base_url: &str, tokens: Arc<AccessTokenSource>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
        }
    }

    fn project_url(&self, project_id: &str, method: &str) -> String {
        format!("{}/projects/{}:{}", self.base_url, project_id, method)
    }
}

#[async_trait]
impl PolicyStore for CloudResourceManager {
    async fn get_policy(&self, resource_id: &str) -> Result<ExternalPolicy, StoreError> {
        let token = self.tokens.token().await?;
        let request = self
            .http
            .post(self.project_url(resource_id, "getIamPolicy"))
            .bearer_auth(token)
            .json(&json!({"options": {"requestedPolicyVersion": CONDITIONAL_POLICY_VERSION}}));
        let policy: ExternalPolicy = send_json(request, "getIamPolicy").await?;
        tracing::debug!(
            project_id = resource_id,
            bindings = policy.bindings.len(),
            version = ?policy.version,
            "Fetched IAM policy"
        );
        Ok(policy)
    }

    async fn set_policy(
        &self,
        resource_id: &str,
        policy: &ExternalPolicy,
    ) -> Result<ExternalPolicy, StoreError> {
        let token = self.tokens.token().await?;
        let request = self
            .http
            .post(self.project_url(resource_id, "setIamPolicy"))
            .bearer_auth(token)
            .json(&set_policy_body(policy));
        send_json(request, "setIamPolicy").await
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectsPage {
    #[serde(default)]
    projects: Vec<ProjectEntry>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProjectEntry {
    project_id: String,
    #[serde(default)]
    name: String,
}

impl From<ProjectEntry> for ProjectSummary {
    fn from(entry: ProjectEntry) -> Self {
        ProjectSummary {
            id: entry.project_id,
            name: entry.name,
        }
    }
}

#[async_trait]
impl ProjectDirectory for CloudResourceManager {
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, StoreError> {
        let url = format!("{}/projects", self.base_url);
        let mut projects = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let token = self.tokens.token().await?;
            let mut request = self.http.get(&url).bearer_auth(token);
            if let Some(page) = &page_token {
                request = request.query(&[("pageToken", page)]);
            }
            let page: ProjectsPage = send_json(request, "projects.list").await?;
            projects.extend(page.projects.into_iter().map(ProjectSummary::from));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => page_token = Some(next),
                None => break,
            }
        }

        tracing::info!(count = projects.len(), "Fetched projects");
        Ok(projects)
    }
}

/// `setIamPolicy` request body.
///
/// A policy with conditional bindings must be written as version 3, even
/// when the live policy was still at an older version.
fn set_policy_body(policy: &ExternalPolicy) -> Value {
    let mut policy = policy.clone();
    let has_conditions = policy.bindings.iter().any(|b| b.condition.is_some());
    if has_conditions && policy.version.unwrap_or(1) < CONDITIONAL_POLICY_VERSION {
        policy.version = Some(CONDITIONAL_POLICY_VERSION);
    }
    json!({ "policy": policy })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credentials;
    use iamgen_core::{Binding, Condition};
    use pretty_assertions::assert_eq;

    fn manager(base: &str) -> CloudResourceManager {
        let http = reqwest::Client::new();
        let tokens = Arc::new(AccessTokenSource::new(http.clone(), Credentials::Static("t".into())));
        CloudResourceManager::new(http, base, tokens)
    }

    #[test]
    fn project_urls_use_custom_methods() {
        let crm = manager("https://cloudresourcemanager.googleapis.com/v1/");
        assert_eq!(
            crm.project_url("demo-123", "getIamPolicy"),
            "https://cloudresourcemanager.googleapis.com/v1/projects/demo-123:getIamPolicy"
        );
    }

    #[test]
    fn projects_page_maps_to_summaries() {
        let page: ProjectsPage = serde_json::from_value(json!({
            "projects": [
                {"projectNumber": "1", "projectId": "demo-123", "name": "Demo", "lifecycleState": "ACTIVE"},
                {"projectId": "other"}
            ],
            "nextPageToken": "abc"
        }))
        .unwrap();

        assert_eq!(page.next_page_token.as_deref(), Some("abc"));
        let summaries: Vec<ProjectSummary> = page.projects.into_iter().map(Into::into).collect();
        assert_eq!(
            summaries,
            vec![
                ProjectSummary { id: "demo-123".into(), name: "Demo".into() },
                ProjectSummary { id: "other".into(), name: String::new() },
            ]
        );
    }

    #[test]
    fn empty_listing_has_no_next_page() {
        let page: ProjectsPage = serde_json::from_value(json!({})).unwrap();
        assert!(page.projects.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn set_body_wraps_policy_and_keeps_metadata() {
        let policy: ExternalPolicy = serde_json::from_value(json!({
            "version": 1,
            "etag": "BwXyZ",
            "bindings": [{"role": "roles/viewer", "members": ["user:bob@x.com"]}],
            "auditConfigs": []
        }))
        .unwrap();
        let body = set_policy_body(&policy);

        assert_eq!(body["policy"]["etag"], "BwXyZ");
        assert_eq!(body["policy"]["version"], 1);
        assert_eq!(body["policy"]["auditConfigs"], json!([]));
    }

    #[test]
    fn conditional_policy_is_written_as_version_three() {
        let policy = ExternalPolicy {
            bindings: vec![Binding::new("roles/viewer", ["user:bob@x.com"]).with_condition(
                Condition {
                    title: "t".into(),
                    description: None,
                    expression: "true".into(),
                    location: None,
                },
            )],
            version: Some(1),
            ..Default::default()
        };
        assert_eq!(set_policy_body(&policy)["policy"]["version"], 3);
    }
}
