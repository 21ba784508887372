//! Model provider configuration.

use serde::{Deserialize, Serialize};

/// Chat-completion provider. Both speak the OpenAI wire format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    #[default]
    Groq,
    OpenAi,
}

impl ModelProvider {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "groq" => Some(Self::Groq),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::OpenAi => "https://api.openai.com/v1",
        }
    }

    /// Environment variable holding this provider's API key.
    pub fn api_key_env(self) -> &'static str {
        match self {
            Self::Groq => "GROQ_API_KEY",
            Self::OpenAi => "OPENAI_API_KEY",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: ModelProvider,

    /// Model used for generation and regeneration.
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for validation. Defaults to `model`.
    #[serde(default)]
    pub validation_model: Option<String>,

    /// Overrides the provider's endpoint, e.g. for a local gateway.
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Regeneration attempts after a failed validation.
    #[serde(default = "default_max_regenerations")]
    pub max_regenerations: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Never read from the config file; comes from the provider's env var.
    #[serde(skip)]
    pub groq_api_key: Option<String>,

    #[serde(skip)]
    pub openai_api_key: Option<String>,
}

fn default_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_regenerations() -> u32 {
    1
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: ModelProvider::default(),
            model: default_model(),
            validation_model: None,
            base_url: None,
            temperature: default_temperature(),
            max_regenerations: default_max_regenerations(),
            timeout_secs: default_timeout_secs(),
            groq_api_key: None,
            openai_api_key: None,
        }
    }
}

impl ModelConfig {
    pub fn api_key(&self) -> Option<&str> {
        match self.provider {
            ModelProvider::Groq => self.groq_api_key.as_deref(),
            ModelProvider::OpenAi => self.openai_api_key.as_deref(),
        }
    }

    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url())
    }

    pub fn validation_model(&self) -> &str {
        self.validation_model.as_deref().unwrap_or(&self.model)
    }
}
