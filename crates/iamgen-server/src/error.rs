//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use iamgen_core::AuthError;
use iamgen_policy::{ApplyError, StoreError};
use serde_json::json;
use thiserror::Error;

/// Errors returned by the API, rendered as `{"detail": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request body or missing header.
    #[error("{0}")]
    BadRequest(String),

    /// Missing, invalid or expired bearer token.
    #[error("{0}")]
    Unauthorized(String),

    /// A Google API rejected the call. Its 4xx/5xx status is passed through;
    /// anything else becomes 502.
    #[error("{message}")]
    Upstream { status: u16, message: String },

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Upstream { status, .. } => StatusCode::from_u16(*status)
                .ok()
                .filter(|s| s.is_client_error() || s.is_server_error())
                .unwrap_or(StatusCode::BAD_GATEWAY),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Missing => ApiError::Unauthorized("Missing or invalid token".into()),
            other => ApiError::Unauthorized(format!("Invalid token: {}", other)),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Upstream {
            status: err.status,
            message: err.message,
        }
    }
}

impl From<ApplyError> for ApiError {
    fn from(err: ApplyError) -> Self {
        match err {
            ApplyError::Lint(failure) => ApiError::BadRequest(failure.to_string()),
            err @ ApplyError::LintUnavailable(_) => ApiError::Internal(err.to_string()),
            ApplyError::Store(store) => store.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Request failed");
        } else {
            tracing::info!(status = status.as_u16(), error = %self, "Request rejected");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use iamgen_core::LintResult;
    use iamgen_policy::LintFailure;

    #[test]
    fn lint_findings_are_bad_requests() {
        let err: ApiError = ApplyError::Lint(LintFailure {
            issues: vec![LintResult {
                severity: "ERROR".into(),
                debug_message: "bad".into(),
                field_name: "condition.expression".into(),
            }],
        })
        .into();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "[ERROR] bad (field: condition.expression)");
    }

    #[test]
    fn store_status_passes_through() {
        let err: ApiError = ApplyError::Store(StoreError::new(403, "denied")).into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);

        let err: ApiError = StoreError::new(0, "weird").into();
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn non_error_store_statuses_become_bad_gateway() {
        for status in [200, 302, 304] {
            let err: ApiError = StoreError::new(status, "moved").into();
            assert_eq!(err.status(), StatusCode::BAD_GATEWAY, "{status}");
        }
        let err: ApiError = StoreError::new(503, "busy").into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn auth_errors_are_unauthorized() {
        let err: ApiError = AuthError::Expired.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.to_string(), "Invalid token: token expired");
    }
}
