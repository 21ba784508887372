//! Generate → validate → regenerate pipeline.
//!
//! ```text
//! Generating ──(no policy)──────────────────────────► Done
//!     │
//!     ▼
//! Generated ──(validate = false)────────────────────► Done
//!     │
//!     ▼
//! Validating ──(valid)──────────────────────────────► Done
//!     │
//!     ▼ (invalid)
//! Regenerating ─────────────────────────────────────► Done
//! ```
//!
//! With the default options this makes at most three model calls. Every
//! model or parse failure is absorbed by the stage that hit it and turned
//! into that stage's fallback result, so a bad reply degrades the answer
//! instead of failing the request.

use crate::parser::{self, ParseError};
use crate::prompts;
use iamgen_core::{GenerationResult, ModelConfig, Policy, PolicyOutcome, ValidationResult};
use iamgen_model::{ChatRequest, ModelClient, ModelError};
use std::fmt;
use std::sync::Arc;

const PREVIEW_CHARS: usize = 100;

/// Tunables for [`PolicyPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub generation_model: String,
    pub validation_model: String,
    pub temperature: f32,
    /// Regenerations allowed after a rejected validation. Each extra
    /// regeneration beyond the first is preceded by another validation.
    pub max_regenerations: u32,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from_config(&ModelConfig::default())
    }
}

impl PipelineOptions {
    pub fn from_config(cfg: &ModelConfig) -> Self {
        Self {
            generation_model: cfg.model.clone(),
            validation_model: cfg.validation_model().to_string(),
            temperature: cfg.temperature,
            max_regenerations: cfg.max_regenerations,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Generation,
    Validation,
    Regeneration,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Generation => "generation",
            Stage::Validation => "validation",
            Stage::Regeneration => "regeneration",
        })
    }
}

#[derive(Debug)]
enum StageFailure {
    Model(ModelError),
    Parse(ParseError),
}

/// Turns a natural-language request into a reviewed IAM policy.
pub struct PolicyPipeline {
    model: Arc<dyn ModelClient>,
    options: PipelineOptions,
}

impl PolicyPipeline {
    pub fn new(model: Arc<dyn ModelClient>, options: PipelineOptions) -> Self {
        Self { model, options }
    }

    /// Run the pipeline for one request.
    ///
    /// Errors only on internal faults (policy serialization); model and parse
    /// failures are reported through `chat_response`.
    pub async fn produce_policy(&self, prompt: &str) -> anyhow::Result<PolicyOutcome> {
        tracing::info!(prompt = %preview(prompt, 50), "Generating policy");

        let generated = self.generate(prompt).await;
        let mut chat_response = generated.chat_response;

        let Some(mut policy) = generated.policy else {
            tracing::info!("No policy generated; returning clarification");
            return Ok(PolicyOutcome {
                policy: None,
                chat_response,
            });
        };
        log_shape_notes(&policy);

        if !generated.validate {
            tracing::info!("Generator skipped validation");
            return finish(&policy, chat_response);
        }

        let mut regenerations = 0;
        loop {
            let policy_json = policy.to_pretty_json()?;
            let verdict = self
                .validate(prompt, &policy_json, chat_response.as_deref())
                .await;

            if verdict.chat_response.is_some() {
                chat_response = verdict.chat_response;
            }
            if verdict.valid {
                tracing::info!("Policy passed validation");
                break;
            }

            let feedback = verdict.feedback.unwrap_or_default();
            tracing::info!(
                feedback = %preview(&feedback, 50),
                regenerations,
                "Validation rejected policy"
            );
            if regenerations >= self.options.max_regenerations {
                break;
            }
            regenerations += 1;

            let regenerated = self
                .regenerate(prompt, &feedback, &policy_json, chat_response.as_deref())
                .await;
            let has_policy = regenerated.policy.is_some();
            if let Some(p) = regenerated.policy {
                log_shape_notes(&p);
                policy = p;
            }
            if let Some(text) = regenerated.chat_response {
                chat_response = Some(append_feedback(text, &feedback));
            }

            if !has_policy || regenerations >= self.options.max_regenerations {
                break;
            }
        }

        finish(&policy, chat_response)
    }

    async fn generate(&self, prompt: &str) -> GenerationResult {
        let stage = Stage::Generation;
        let reply = self
            .call(
                stage,
                &self.options.generation_model,
                prompts::GENERATION_SYSTEM_PROMPT,
                prompt.to_string(),
            )
            .await;
        match reply.and_then(|raw| parser::parse_generation(&raw).map_err(StageFailure::Parse)) {
            Ok(result) => result,
            Err(failure) => {
                log_failure(stage, &failure);
                GenerationResult::message(match failure {
                    StageFailure::Parse(_) => {
                        "I encountered an error generating a valid policy. Please try rephrasing your request."
                            .to_string()
                    }
                    StageFailure::Model(e) => format!("An error occurred: {}", e),
                })
            }
        }
    }

    async fn validate(
        &self,
        prompt: &str,
        policy_json: &str,
        chat_response: Option<&str>,
    ) -> ValidationResult {
        let stage = Stage::Validation;
        let reply = self
            .call(
                stage,
                &self.options.validation_model,
                prompts::VALIDATION_SYSTEM_PROMPT,
                prompts::validation_message(prompt, policy_json, chat_response),
            )
            .await;
        match reply.and_then(|raw| parser::parse_validation(&raw).map_err(StageFailure::Parse)) {
            Ok(result) => result,
            Err(failure) => {
                log_failure(stage, &failure);
                ValidationResult::rejected(match failure {
                    StageFailure::Parse(_) => {
                        "I encountered an error validating the policy.".to_string()
                    }
                    StageFailure::Model(e) => {
                        format!("An error occurred during validation: {}", e)
                    }
                })
            }
        }
    }

    async fn regenerate(
        &self,
        prompt: &str,
        feedback: &str,
        previous_policy: &str,
        chat_response: Option<&str>,
    ) -> GenerationResult {
        let stage = Stage::Regeneration;
        let reply = self
            .call(
                stage,
                &self.options.generation_model,
                prompts::GENERATION_SYSTEM_PROMPT,
                prompts::regeneration_message(prompt, previous_policy, feedback, chat_response),
            )
            .await;
        match reply.and_then(|raw| parser::parse_generation(&raw).map_err(StageFailure::Parse)) {
            Ok(result) => result,
            Err(failure) => {
                log_failure(stage, &failure);
                GenerationResult::message(match failure {
                    StageFailure::Parse(_) => {
                        "I encountered an error regenerating a valid policy based on the feedback."
                            .to_string()
                    }
                    StageFailure::Model(e) => {
                        format!("An error occurred during regeneration: {}", e)
                    }
                })
            }
        }
    }

    async fn call(
        &self,
        stage: Stage,
        model: &str,
        system_prompt: &str,
        user_prompt: String,
    ) -> Result<String, StageFailure> {
        let request = ChatRequest {
            model: model.to_string(),
            system_prompt: system_prompt.to_string(),
            user_prompt,
            temperature: self.options.temperature,
            json_mode: true,
        };
        let raw = self
            .model
            .chat(&request)
            .await
            .map_err(StageFailure::Model)?;
        tracing::info!(%stage, reply = %preview(&raw, PREVIEW_CHARS), "Model replied");
        Ok(raw)
    }
}

fn finish(policy: &Policy, chat_response: Option<String>) -> anyhow::Result<PolicyOutcome> {
    let outcome = PolicyOutcome {
        policy: Some(policy.to_pretty_json()?),
        chat_response,
    };
    tracing::info!(
        policy_exists = outcome.policy.is_some(),
        chat_response_exists = outcome.chat_response.is_some(),
        "Returning generated policy"
    );
    Ok(outcome)
}

/// Keep validator feedback visible when the regenerated message drops it.
fn append_feedback(chat_response: String, feedback: &str) -> String {
    if feedback.is_empty() || chat_response.contains(feedback) {
        chat_response
    } else if chat_response.is_empty() {
        format!("Validation feedback: {}", feedback)
    } else {
        format!("{}\n\nValidation feedback: {}", chat_response, feedback)
    }
}

fn log_failure(stage: Stage, failure: &StageFailure) {
    match failure {
        StageFailure::Model(e) => {
            tracing::error!(%stage, error = %e, "Model call failed");
        }
        StageFailure::Parse(e) => {
            tracing::error!(%stage, error = %e, "Could not parse model reply");
        }
    }
}

fn log_shape_notes(policy: &Policy) {
    for binding in &policy.bindings {
        for note in binding.lint_shape() {
            tracing::debug!(role = %binding.role, "{}", note);
        }
    }
}

fn preview(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
