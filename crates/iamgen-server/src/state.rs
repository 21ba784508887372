//! Shared application state.

use anyhow::Context;
use iamgen_core::{AppConfig, IdentityVerifier};
use iamgen_gcp::GoogleServices;
use iamgen_model::ChatCompletionsClient;
use iamgen_policy::{PolicyApplier, ProjectDirectory};
use iamgen_runtime::{PipelineOptions, PolicyPipeline};
use std::sync::Arc;

/// Collaborators shared read-only by every request.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    pipeline: PolicyPipeline,
    applier: PolicyApplier,
    verifier: Arc<dyn IdentityVerifier>,
    projects: Arc<dyn ProjectDirectory>,
}

impl AppState {
    pub fn new(
        pipeline: PolicyPipeline,
        applier: PolicyApplier,
        verifier: Arc<dyn IdentityVerifier>,
        projects: Arc<dyn ProjectDirectory>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                pipeline,
                applier,
                verifier,
                projects,
            }),
        }
    }

    /// Wire the production collaborators: the configured model provider and
    /// the Google Cloud adapters.
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let model = ChatCompletionsClient::from_config(&config.model)
            .context("building model client")?;
        tracing::info!(
            provider = ?config.model.provider,
            model = %config.model.model,
            endpoint = model.endpoint(),
            "Model client ready"
        );
        let pipeline = PolicyPipeline::new(
            Arc::new(model),
            PipelineOptions::from_config(&config.model),
        );

        let google = GoogleServices::from_config(&config.google)?;
        let applier = PolicyApplier::new(google.resource_manager.clone(), google.linter);

        Ok(Self::new(
            pipeline,
            applier,
            google.verifier,
            google.resource_manager,
        ))
    }

    pub fn pipeline(&self) -> &PolicyPipeline {
        &self.inner.pipeline
    }

    pub fn applier(&self) -> &PolicyApplier {
        &self.inner.applier
    }

    pub fn verifier(&self) -> &dyn IdentityVerifier {
        self.inner.verifier.as_ref()
    }

    pub fn projects(&self) -> &dyn ProjectDirectory {
        self.inner.projects.as_ref()
    }
}
