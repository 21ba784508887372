//! Bearer-token authentication for API routes.

use crate::error::ApiError;
use crate::state::AppState;
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use iamgen_core::{AuthError, Identity, verify_with_refresh};

pub const REFRESH_TOKEN_HEADER: &str = "x-refresh-token";
pub const PROJECT_ID_HEADER: &str = "project-id";

/// Verify the caller's Google ID token, refreshing it once if it has expired
/// and an `x-refresh-token` header was sent.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Identity, ApiError> {
    let token = bearer_token(headers).ok_or(AuthError::Missing)?;
    let refresh = header_value(headers, REFRESH_TOKEN_HEADER);
    let identity = verify_with_refresh(state.verifier(), token, refresh).await?;
    tracing::debug!(subject = %identity.subject, email = ?identity.email, "Caller authenticated");
    Ok(identity)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Trimmed, non-empty header value.
pub fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn extracts_bearer_token() {
        assert_eq!(
            bearer_token(&headers(&[("authorization", "Bearer abc.def.ghi")])),
            Some("abc.def.ghi")
        );
        assert_eq!(bearer_token(&headers(&[("authorization", "Basic xyz")])), None);
        assert_eq!(bearer_token(&headers(&[("authorization", "Bearer   ")])), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    #[test]
    fn blank_headers_are_absent() {
        let map = headers(&[(PROJECT_ID_HEADER, " demo-123 "), (REFRESH_TOKEN_HEADER, "")]);
        assert_eq!(header_value(&map, PROJECT_ID_HEADER), Some("demo-123"));
        assert_eq!(header_value(&map, REFRESH_TOKEN_HEADER), None);
    }
}
