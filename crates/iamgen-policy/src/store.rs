//! Contracts for the live policy store and the project directory.

use async_trait::async_trait;
use iamgen_core::{ExternalPolicy, ProjectSummary};
use thiserror::Error;

/// Failure reported by the policy store, linter or project directory.
///
/// `status` is the provider's HTTP status when there was one, 500 otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct StoreError {
    pub status: u16,
    pub message: String,
}

impl StoreError {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    /// Build from a non-success provider response, cleaning the body.
    pub fn from_response(status: u16, body: &str) -> Self {
        Self::new(status, describe_provider_error(body))
    }

    /// Transport-level failure with no provider status.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(500, message)
    }
}

/// Reads and writes IAM policies for a resource.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn get_policy(&self, resource_id: &str) -> Result<ExternalPolicy, StoreError>;

    /// Replace the resource's policy with `policy` and return what the store
    /// now holds.
    async fn set_policy(
        &self,
        resource_id: &str,
        policy: &ExternalPolicy,
    ) -> Result<ExternalPolicy, StoreError>;
}

/// Lists the projects visible to the service's credentials.
#[async_trait]
pub trait ProjectDirectory: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<ProjectSummary>, StoreError>;
}

/// Reduce a provider error body to a message fit for an end user.
///
/// Tries the Google JSON error envelope (`error.message`), then the text
/// between `returned "` and `".`, then falls back to the trimmed input.
pub fn describe_provider_error(raw: &str) -> String {
    let envelope = serde_json::from_str::<serde_json::Value>(raw).ok();
    if let Some(message) = envelope
        .as_ref()
        .and_then(|v| v.pointer("/error/message"))
        .and_then(serde_json::Value::as_str)
    {
        return message.to_string();
    }

    const START: &str = "returned \"";
    const END: &str = "\".";
    if let Some(start) = raw.find(START) {
        let rest = &raw[start + START.len()..];
        if let Some(end) = rest.find(END) {
            return rest[..end].to_string();
        }
    }

    raw.trim().to_string()
}
