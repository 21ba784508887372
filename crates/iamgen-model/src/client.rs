//! OpenAI-compatible `/chat/completions` client (Groq, OpenAI).

use crate::{ChatRequest, ModelClient, ModelError};
use async_trait::async_trait;
use iamgen_core::ModelConfig;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

pub struct ChatCompletionsClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl ChatCompletionsClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
        })
    }

    /// Build a client for the configured provider.
    ///
    /// The caller is expected to have run `AppConfig::validate_model` first.
    pub fn from_config(cfg: &ModelConfig) -> Result<Self, ModelError> {
        let api_key = cfg
            .api_key()
            .ok_or_else(|| ModelError::NotConfigured(cfg.provider.api_key_env()))?;
        Self::new(cfg.base_url(), api_key, Duration::from_secs(cfg.timeout_secs))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ModelClient for ChatCompletionsClient {
    async fn chat(&self, request: &ChatRequest) -> Result<String, ModelError> {
        tracing::debug!(
            model = %request.model,
            json_mode = request.json_mode,
            "Sending chat completion"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request_body(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = response.json().await?;
        extract_content(payload)
    }
}

fn request_body(request: &ChatRequest) -> Value {
    let mut body = json!({
        "model": request.model,
        "messages": [
            {"role": "system", "content": request.system_prompt},
            {"role": "user", "content": request.user_prompt},
        ],
        "temperature": request.temperature,
    });
    if request.json_mode {
        body["response_format"] = json!({"type": "json_object"});
    }
    body
}

#[derive(Debug, Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    content: Option<String>,
}

fn extract_content(payload: Value) -> Result<String, ModelError> {
    let completion: Completion =
        serde_json::from_value(payload).map_err(|e| ModelError::Decode(e.to_string()))?;
    completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .filter(|c| !c.trim().is_empty())
        .ok_or(ModelError::EmptyResponse)
}
