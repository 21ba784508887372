//! Access tokens for outbound Google API calls.
//!
//! Credentials are resolved once at start-up, in order:
//!
//! 1. `GOOGLE_OAUTH_ACCESS_TOKEN`: a pre-minted token, used as-is.
//! 2. An `authorized_user` credentials file from `GOOGLE_APPLICATION_CREDENTIALS`
//!    or gcloud's application-default location.
//! 3. The GCE metadata server.
//!
//! Minted tokens are cached until shortly before they expire.

use chrono::{DateTime, Duration, Utc};
use iamgen_policy::StoreError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens closer than this to expiry are refreshed.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Static(String),
    AuthorizedUser {
        client_id: String,
        client_secret: String,
        refresh_token: String,
        token_uri: String,
    },
    Metadata,
}

impl Credentials {
    fn kind(&self) -> &'static str {
        match self {
            Credentials::Static(_) => "static",
            Credentials::AuthorizedUser { .. } => "authorized_user",
            Credentials::Metadata => "metadata",
        }
    }
}

#[derive(Debug, Deserialize)]
struct CredentialsFile {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    client_id: Option<String>,
    #[serde(default)]
    client_secret: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    3600
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(EXPIRY_MARGIN_SECS) < self.expires_at
    }
}

pub struct AccessTokenSource {
    http: reqwest::Client,
    credentials: Credentials,
    cache: RwLock<Option<CachedToken>>,
}

impl AccessTokenSource {
    pub fn new(http: reqwest::Client, credentials: Credentials) -> Self {
        tracing::info!(credentials = credentials.kind(), "Google credentials resolved");
        Self {
            http,
            credentials,
            cache: RwLock::new(None),
        }
    }

    /// Resolve credentials from the process environment.
    pub fn from_env(http: reqwest::Client, token_uri: &str) -> Result<Self, StoreError> {
        let credentials = resolve_credentials(|key| std::env::var(key).ok(), token_uri)?;
        Ok(Self::new(http, credentials))
    }

    /// A bearer token valid for at least the next minute.
    pub async fn token(&self) -> Result<String, StoreError> {
        if let Credentials::Static(token) = &self.credentials {
            return Ok(token.clone());
        }

        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.is_fresh(Utc::now()) {
                return Ok(cached.token.clone());
            }
        }

        let mut slot = self.cache.write().await;
        // Another task may have refreshed while we waited for the lock.
        if let Some(cached) = slot.as_ref() {
            if cached.is_fresh(Utc::now()) {
                return Ok(cached.token.clone());
            }
        }

        let minted = self.mint().await?;
        tracing::debug!(expires_at = %minted.expires_at, "Minted Google access token");
        let token = minted.token.clone();
        *slot = Some(minted);
        Ok(token)
    }

    async fn mint(&self) -> Result<CachedToken, StoreError> {
        let request = match &self.credentials {
            Credentials::Static(token) => {
                return Ok(CachedToken {
                    token: token.clone(),
                    expires_at: DateTime::<Utc>::MAX_UTC,
                });
            }
            Credentials::AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
                token_uri,
            } => self.http.post(token_uri).form(&[
                ("grant_type", "refresh_token"),
                ("client_id", client_id.as_str()),
                ("client_secret", client_secret.as_str()),
                ("refresh_token", refresh_token.as_str()),
            ]),
            Credentials::Metadata => self
                .http
                .get(METADATA_TOKEN_URL)
                .header("Metadata-Flavor", "Google"),
        };

        let response = request.send().await.map_err(|e| {
            StoreError::internal(format!("Failed to obtain Google access token: {}", e))
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::from_response(status.as_u16(), &body));
        }
        let parsed: TokenResponse = response.json().await.map_err(|e| {
            StoreError::internal(format!("Invalid Google token response: {}", e))
        })?;

        Ok(CachedToken {
            token: parsed.access_token,
            expires_at: Utc::now() + Duration::seconds(parsed.expires_in),
        })
    }
}

fn resolve_credentials<F>(lookup: F, token_uri: &str) -> Result<Credentials, StoreError>
where
    F: Fn(&str) -> Option<String>,
{
    let present = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(token) = present("GOOGLE_OAUTH_ACCESS_TOKEN") {
        return Ok(Credentials::Static(token));
    }

    let explicit = present("GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from);
    let path = explicit.clone().or_else(|| {
        present("HOME").map(|home| {
            Path::new(&home).join(".config/gcloud/application_default_credentials.json")
        })
    });

    match path {
        Some(path) if explicit.is_some() || path.exists() => read_credentials_file(&path, token_uri),
        _ => Ok(Credentials::Metadata),
    }
}

fn read_credentials_file(path: &Path, token_uri: &str) -> Result<Credentials, StoreError> {
    let raw = std::fs::read_to_string(path).map_err(|e| {
        StoreError::internal(format!("Cannot read credentials {}: {}", path.display(), e))
    })?;
    parse_credentials_file(&raw, token_uri)
}

fn parse_credentials_file(raw: &str, token_uri: &str) -> Result<Credentials, StoreError> {
    let file: CredentialsFile = serde_json::from_str(raw)
        .map_err(|e| StoreError::internal(format!("Invalid credentials file: {}", e)))?;

    if file.kind != "authorized_user" {
        return Err(StoreError::internal(format!(
            "Unsupported credentials type '{}'; use an authorized_user file, \
             GOOGLE_OAUTH_ACCESS_TOKEN or the metadata server",
            file.kind
        )));
    }

    match (file.client_id, file.client_secret, file.refresh_token) {
        (Some(client_id), Some(client_secret), Some(refresh_token)) => {
            Ok(Credentials::AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
                token_uri: token_uri.to_string(),
            })
        }
        _ => Err(StoreError::internal(
            "authorized_user credentials need client_id, client_secret and refresh_token",
        )),
    }
}
