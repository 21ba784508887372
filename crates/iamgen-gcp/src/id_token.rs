//! Google OAuth ID token verification and refresh.
//!
//! Expiry is read from the token's own payload so an expired token can be
//! refreshed without a round trip. Everything else (signature, audience,
//! issuer) is checked against Google's `tokeninfo` endpoint.

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Utc;
use iamgen_core::{AuthError, ConfigError, GoogleConfig, Identity, IdentityVerifier};
use iamgen_policy::describe_provider_error;
use serde::Deserialize;

const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

#[derive(Debug, Deserialize)]
struct UnverifiedClaims {
    #[serde(default)]
    exp: Option<i64>,
}

/// `tokeninfo` reply; every value arrives as a string.
#[derive(Debug, Deserialize)]
struct TokenInfo {
    #[serde(default)]
    aud: String,
    #[serde(default)]
    iss: String,
    #[serde(default)]
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    id_token: Option<String>,
}

pub struct GoogleIdTokenVerifier {
    http: reqwest::Client,
    client_id: String,
    client_secret: Option<String>,
    tokeninfo_uri: String,
    token_uri: String,
}

impl GoogleIdTokenVerifier {
    pub fn new(http: reqwest::Client, config: &GoogleConfig) -> Result<Self, ConfigError> {
        let client_id = config
            .client_id
            .clone()
            .ok_or(ConfigError::Missing("GOOGLE_CLIENT_ID"))?;
        Ok(Self {
            http,
            client_id,
            client_secret: config.client_secret.clone(),
            tokeninfo_uri: config.tokeninfo_uri.clone(),
            token_uri: config.token_uri.clone(),
        })
    }

    fn check_claims(&self, info: TokenInfo) -> Result<Identity, AuthError> {
        if info.aud != self.client_id {
            return Err(AuthError::Invalid("token audience does not match".into()));
        }
        if !GOOGLE_ISSUERS.contains(&info.iss.as_str()) {
            return Err(AuthError::Invalid(format!("unexpected issuer '{}'", info.iss)));
        }
        Ok(Identity {
            subject: info.sub,
            email: info.email,
            audience: info.aud,
        })
    }
}

#[async_trait]
impl IdentityVerifier for GoogleIdTokenVerifier {
    async fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let claims = decode_unverified(token)?;
        if is_expired(&claims, Utc::now().timestamp()) {
            return Err(AuthError::Expired);
        }

        let response = self
            .http
            .get(&self.tokeninfo_uri)
            .query(&[("id_token", token)])
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(AuthError::Unavailable(format!("tokeninfo returned {}", status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Invalid(describe_provider_error(&body)));
        }

        let info: TokenInfo = response
            .json()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;
        let identity = self.check_claims(info)?;
        tracing::debug!(subject = %identity.subject, "Verified ID token");
        Ok(identity)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let Some(client_secret) = &self.client_secret else {
            return Err(AuthError::RefreshFailed(
                "GOOGLE_CLIENT_SECRET is not configured".into(),
            ));
        };

        let response = self
            .http
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", self.client_id.as_str()),
                ("client_secret", client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::RefreshFailed(describe_provider_error(&body)));
        }

        let refreshed: RefreshResponse = response
            .json()
            .await
            .map_err(|e| AuthError::RefreshFailed(e.to_string()))?;
        tracing::info!("Refreshed expired ID token");
        refreshed
            .id_token
            .ok_or_else(|| AuthError::RefreshFailed("token endpoint returned no id_token".into()))
    }
}

/// Read the JWT payload without checking the signature.
fn decode_unverified(token: &str) -> Result<UnverifiedClaims, AuthError> {
    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::Malformed("expected three dot-separated segments".into()));
    };

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::Malformed(format!("payload is not base64url: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::Malformed(format!("payload is not JSON: {}", e)))
}

/// Tokens without `exp` are left for `tokeninfo` to judge.
fn is_expired(claims: &UnverifiedClaims, now: i64) -> bool {
    claims.exp.is_some_and(|exp| exp <= now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jwt(payload: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
        let body = URL_SAFE_NO_PAD.encode(payload.to_string());
        format!("{}.{}.sig", header, body)
    }

    fn verifier() -> GoogleIdTokenVerifier {
        let config = GoogleConfig {
            client_id: Some("client-123.apps.googleusercontent.com".into()),
            ..Default::default()
        };
        GoogleIdTokenVerifier::new(reqwest::Client::new(), &config).unwrap()
    }

    #[test]
    fn decodes_exp_from_payload() {
        let claims = decode_unverified(&jwt(json!({"exp": 1700000000, "sub": "42"}))).unwrap();
        assert_eq!(claims.exp, Some(1700000000));
        assert!(is_expired(&claims, 1700000000));
        assert!(!is_expired(&claims, 1699999999));
    }

    #[test]
    fn rejects_malformed_tokens() {
        assert!(matches!(decode_unverified("abc"), Err(AuthError::Malformed(_))));
        assert!(matches!(decode_unverified("a.b.c.d"), Err(AuthError::Malformed(_))));
        assert!(matches!(decode_unverified("a.!!!.c"), Err(AuthError::Malformed(_))));
    }

    #[test]
    fn missing_exp_is_not_expired() {
        let claims = decode_unverified(&jwt(json!({"sub": "42"}))).unwrap();
        assert!(!is_expired(&claims, i64::MAX));
    }

    #[tokio::test]
    async fn expired_token_is_reported_before_any_network_call() {
        let err = verifier()
            .verify(&jwt(json!({"exp": 1000})))
            .await
            .unwrap_err();
        assert_eq!(err, AuthError::Expired);
    }

    #[test]
    fn audience_and_issuer_are_checked() {
        let v = verifier();
        let ok = v
            .check_claims(TokenInfo {
                aud: "client-123.apps.googleusercontent.com".into(),
                iss: "https://accounts.google.com".into(),
                sub: "42".into(),
                email: Some("bob@x.com".into()),
            })
            .unwrap();
        assert_eq!(ok.subject, "42");
        assert_eq!(ok.email.as_deref(), Some("bob@x.com"));

        let wrong_aud = v.check_claims(TokenInfo {
            aud: "someone-else".into(),
            iss: "accounts.google.com".into(),
            sub: "42".into(),
            email: None,
        });
        assert!(matches!(wrong_aud, Err(AuthError::Invalid(_))));

        let wrong_iss = v.check_claims(TokenInfo {
            aud: "client-123.apps.googleusercontent.com".into(),
            iss: "https://evil.example".into(),
            sub: "42".into(),
            email: None,
        });
        assert!(matches!(wrong_iss, Err(AuthError::Invalid(_))));
    }

    #[tokio::test]
    async fn refresh_needs_client_secret() {
        let err = verifier().refresh("1//rt").await.unwrap_err();
        assert!(matches!(err, AuthError::RefreshFailed(_)));
    }

    #[test]
    fn client_id_is_required() {
        let err = GoogleIdTokenVerifier::new(reqwest::Client::new(), &GoogleConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::Missing("GOOGLE_CLIENT_ID")));
    }
}
