//! # iamgen-gcp
//!
//! Google Cloud implementations of the iamgen collaborator traits:
//!
//! - [`CloudResourceManager`]: `PolicyStore` and `ProjectDirectory`
//! - [`IamPolicyLinter`]: `PolicyLinter`
//! - [`GoogleIdTokenVerifier`]: `IdentityVerifier`

pub mod auth;
mod http;
pub mod id_token;
pub mod linter;
pub mod resource_manager;

use anyhow::Context;
use iamgen_core::GoogleConfig;
use std::sync::Arc;
use std::time::Duration;

pub use auth::{AccessTokenSource, Credentials};
pub use id_token::GoogleIdTokenVerifier;
pub use linter::IamPolicyLinter;
pub use resource_manager::CloudResourceManager;

/// All Google adapters, sharing one HTTP client and one token cache.
pub struct GoogleServices {
    pub resource_manager: Arc<CloudResourceManager>,
    pub linter: Arc<IamPolicyLinter>,
    pub verifier: Arc<GoogleIdTokenVerifier>,
}

impl GoogleServices {
    pub fn from_config(config: &GoogleConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("building Google HTTP client")?;

        let tokens = Arc::new(
            AccessTokenSource::from_env(http.clone(), &config.token_uri)
                .map_err(|e| anyhow::anyhow!(e.message))
                .context("resolving Google credentials")?,
        );

        Ok(Self {
            resource_manager: Arc::new(CloudResourceManager::new(
                http.clone(),
                &config.resource_manager_url,
                tokens.clone(),
            )),
            linter: Arc::new(IamPolicyLinter::new(http.clone(), &config.iam_url, tokens)),
            verifier: Arc::new(GoogleIdTokenVerifier::new(http, config)?),
        })
    }
}
