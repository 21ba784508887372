//! # iamgen-core
//!
//! Shared vocabulary for iamgen: the IAM policy model, the JSON contracts
//! exchanged with the generation and validation models, the identity
//! verification contract, and process configuration.

pub mod config;
pub mod contract;
pub mod identity;
pub mod policy;

pub use config::{AppConfig, ConfigError, GoogleConfig, ModelConfig, ModelProvider, ServerConfig};
pub use contract::{GenerationResult, PolicyOutcome, PolicyRequest, ValidationResult};
pub use identity::{AuthError, Identity, IdentityVerifier, verify_with_refresh};
pub use policy::{
    Binding, Condition, ExternalPolicy, LintResult, MEMBER_PREFIXES, Policy, ProjectSummary,
    conditional_bindings, project_resource_name,
};
