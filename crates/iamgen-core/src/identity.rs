//! Caller identity verification contract.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Verified caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub subject: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub audience: String,
}

/// Reasons a bearer token is not accepted.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing or invalid token")]
    Missing,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token expired")]
    Expired,

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// The identity provider could not be reached.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Verifies OAuth ID tokens presented by callers.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError>;

    /// Exchange a refresh token for a fresh ID token.
    async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError>;
}

/// Verify `token`, falling back to one refresh when it has expired.
pub async fn verify_with_refresh(
    verifier: &dyn IdentityVerifier,
    token: &str,
    refresh_token: Option<&str>,
) -> Result<Identity, AuthError> {
    match verifier.verify(token).await {
        Err(AuthError::Expired) => {
            let Some(refresh_token) = refresh_token else {
                return Err(AuthError::Expired);
            };
            let renewed = verifier.refresh(refresh_token).await?;
            verifier.verify(&renewed).await
        }
        other => other,
    }
}
