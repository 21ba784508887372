//! Structured-JSON contracts exchanged with the generation and validation
//! models, and the request/response pair of the generation endpoint.

use crate::policy::Policy;
use serde::{Deserialize, Serialize};

/// Natural-language request for a policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRequest {
    pub prompt: String,
}

impl PolicyRequest {
    /// Returns the prompt if it has any non-whitespace content.
    pub fn prompt(&self) -> Option<&str> {
        let trimmed = self.prompt.trim();
        (!trimmed.is_empty()).then_some(self.prompt.as_str())
    }
}

/// Output of a generation (or regeneration) call.
///
/// `policy == None` means the model is asking for clarification. That is a
/// finished answer, not a failure, and nothing may be merged from it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<Policy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_response: Option<String>,
    #[serde(default)]
    pub validate: bool,
}

impl GenerationResult {
    /// A result that only carries a message for the user.
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            policy: None,
            chat_response: Some(text.into()),
            validate: false,
        }
    }
}

/// Output of a validation call.
///
/// The validator is instructed to echo back the `chat_response` it was given;
/// whatever it returns there is treated as authoritative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_response: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_fixes: Option<Policy>,
}

impl ValidationResult {
    pub fn rejected(feedback: impl Into<String>) -> Self {
        Self {
            valid: false,
            feedback: Some(feedback.into()),
            chat_response: None,
            suggested_fixes: None,
        }
    }
}

/// Final answer of the generation pipeline.
///
/// `policy` is the pretty-printed JSON of the final policy, kept as a string
/// so the client can show and edit it before applying.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyOutcome {
    pub policy: Option<String>,
    pub chat_response: Option<String>,
}
