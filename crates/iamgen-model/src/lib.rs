//! # iamgen-model
//!
//! The model boundary: one system message, one user message, raw text back.
//! Parsing and interpretation of the reply belong to `iamgen-runtime`.

pub mod client;

use async_trait::async_trait;
use thiserror::Error;

pub use client::ChatCompletionsClient;

/// A single chat-completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub system_prompt: String,
    pub user_prompt: String,
    pub temperature: f32,
    /// Ask the provider to constrain output to a JSON object.
    pub json_mode: bool,
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model returned no content")]
    EmptyResponse,

    #[error("could not decode model response: {0}")]
    Decode(String),

    #[error("model client not configured: {0} is not set")]
    NotConfigured(&'static str),
}

/// Sends a system+user message pair and returns the raw reply text.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<String, ModelError>;
}
