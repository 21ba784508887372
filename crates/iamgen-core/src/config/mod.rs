//! Configuration for iamgen.
//!
//! Settings come from an optional TOML file (`$IAMGEN_CONFIG`, else
//! `iamgen.toml` in the working directory) and are then overridden by
//! environment variables. Secrets (API keys, OAuth client secret) are only
//! read from the environment. Everything is read once at start-up; a missing
//! required key fails there rather than on the first request.

pub mod google;
pub mod model;

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use google::GoogleConfig;
pub use model::{ModelConfig, ModelProvider};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Complete iamgen configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub google: GoogleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address, e.g. "0.0.0.0:8000"
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Browser origins allowed to call the API with credentials.
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            cors_origins: default_cors_origins(),
        }
    }
}

impl AppConfig {
    /// Load from file (if any) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let mut cfg = match config_path() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        cfg.apply_env(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Apply environment overrides through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("IAMGEN_BIND") {
            self.server.bind = v;
        }
        if let Some(v) = get("IAMGEN_CORS_ORIGINS") {
            self.server.cors_origins = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(v) = get("IAMGEN_MODEL_PROVIDER") {
            self.model.provider = ModelProvider::parse(&v).ok_or(ConfigError::Invalid {
                key: "IAMGEN_MODEL_PROVIDER",
                reason: format!("unknown provider '{}' (expected groq or openai)", v),
            })?;
        }
        if let Some(v) = get("IAMGEN_MODEL") {
            self.model.model = v;
        }
        if let Some(v) = get("IAMGEN_VALIDATION_MODEL") {
            self.model.validation_model = Some(v);
        }
        if let Some(v) = get("IAMGEN_MODEL_BASE_URL") {
            self.model.base_url = Some(v);
        }
        if let Some(v) = get("IAMGEN_TEMPERATURE") {
            self.model.temperature = v.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "IAMGEN_TEMPERATURE",
                reason: format!("'{}' is not a number", v),
            })?;
        }
        if let Some(v) = get("IAMGEN_MAX_REGENERATIONS") {
            self.model.max_regenerations = v.trim().parse().map_err(|_| ConfigError::Invalid {
                key: "IAMGEN_MAX_REGENERATIONS",
                reason: format!("'{}' is not a non-negative integer", v),
            })?;
        }
        self.model.groq_api_key = get("GROQ_API_KEY").or(self.model.groq_api_key.take());
        self.model.openai_api_key = get("OPENAI_API_KEY").or(self.model.openai_api_key.take());

        if let Some(v) = get("GOOGLE_CLIENT_ID") {
            self.google.client_id = Some(v);
        }
        self.google.client_secret = get("GOOGLE_CLIENT_SECRET").or(self.google.client_secret.take());
        if let Some(v) = get("GOOGLE_TOKEN_URI") {
            self.google.token_uri = v;
        }

        Ok(())
    }

    /// Checks needed to talk to the model provider.
    pub fn validate_model(&self) -> Result<(), ConfigError> {
        if self.model.api_key().is_none() {
            return Err(ConfigError::Missing(self.model.provider.api_key_env()));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::Invalid {
                key: "IAMGEN_TEMPERATURE",
                reason: format!("{} is outside 0.0..=2.0", self.model.temperature),
            });
        }
        if self.model.model.trim().is_empty() {
            return Err(ConfigError::Missing("IAMGEN_MODEL"));
        }
        Ok(())
    }

    /// Checks needed to serve the full HTTP API.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_model()?;
        if self.google.client_id.is_none() {
            return Err(ConfigError::Missing("GOOGLE_CLIENT_ID"));
        }
        Ok(())
    }
}

fn config_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("IAMGEN_CONFIG") {
        return Some(PathBuf::from(p));
    }
    let local = PathBuf::from("iamgen.toml");
    local.exists().then_some(local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_hosted_setup() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.bind, "0.0.0.0:8000");
        assert_eq!(cfg.model.provider, ModelProvider::Groq);
        assert_eq!(cfg.model.model, "llama-3.3-70b-versatile");
        assert_eq!(cfg.model.max_regenerations, 1);
        assert_eq!(cfg.google.token_uri, "https://oauth2.googleapis.com/token");
        assert_eq!(cfg.server.cors_origins.len(), 2);
    }

    #[test]
    fn env_overrides_file_values() {
        let mut cfg = AppConfig::from_toml(
            r#"
            [server]
            bind = "127.0.0.1:9000"

            [model]
            provider = "openai"
            model = "gpt-4o-mini"
            "#,
        )
        .unwrap();

        cfg.apply_env(env(&[
            ("IAMGEN_BIND", "0.0.0.0:8080"),
            ("IAMGEN_CORS_ORIGINS", "https://a.example, https://b.example"),
            ("OPENAI_API_KEY", "sk-test"),
            ("IAMGEN_TEMPERATURE", "0.3"),
        ]))
        .unwrap();

        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
        assert_eq!(
            cfg.server.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(cfg.model.provider, ModelProvider::OpenAi);
        assert_eq!(cfg.model.model, "gpt-4o-mini");
        assert_eq!(cfg.model.api_key(), Some("sk-test"));
        assert_eq!(cfg.model.base_url(), "https://api.openai.com/v1");
        assert!((cfg.model.temperature - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn missing_provider_key_fails_validation() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[("GOOGLE_CLIENT_ID", "client")])).unwrap();
        match cfg.validate() {
            Err(ConfigError::Missing(key)) => assert_eq!(key, "GROQ_API_KEY"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn missing_client_id_only_matters_for_the_api() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[("GROQ_API_KEY", "gsk")])).unwrap();
        assert!(cfg.validate_model().is_ok());
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::Missing("GOOGLE_CLIENT_ID"))
        ));
    }

    #[test]
    fn rejects_unknown_provider_and_bad_numbers() {
        let mut cfg = AppConfig::default();
        assert!(matches!(
            cfg.apply_env(env(&[("IAMGEN_MODEL_PROVIDER", "anthropic")])),
            Err(ConfigError::Invalid { key: "IAMGEN_MODEL_PROVIDER", .. })
        ));
        assert!(matches!(
            cfg.apply_env(env(&[("IAMGEN_MAX_REGENERATIONS", "-1")])),
            Err(ConfigError::Invalid { key: "IAMGEN_MAX_REGENERATIONS", .. })
        ));
    }

    #[test]
    fn out_of_range_temperature_fails_validation() {
        let mut cfg = AppConfig::default();
        cfg.apply_env(env(&[("GROQ_API_KEY", "gsk"), ("IAMGEN_TEMPERATURE", "3.5")]))
            .unwrap();
        assert!(matches!(
            cfg.validate_model(),
            Err(ConfigError::Invalid { key: "IAMGEN_TEMPERATURE", .. })
        ));
    }
}
