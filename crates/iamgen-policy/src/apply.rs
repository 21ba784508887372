//! Lint → fetch → merge → write.

use crate::lint::{LintFailure, LintOutcome, PolicyLinter, lint_bindings};
use crate::merge::merge;
use crate::store::{PolicyStore, StoreError};
use iamgen_core::{Binding, ExternalPolicy};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApplyError {
    /// The linter reported findings for at least one conditional binding.
    #[error("Policy validation failed: {0}")]
    Lint(LintFailure),

    /// The linter could not be reached or returned an error.
    #[error("Failed to lint policy: {0}")]
    LintUnavailable(StoreError),

    /// Reading or writing the live policy failed.
    #[error("{0}")]
    Store(StoreError),
}

/// Applies generated bindings to a project's live policy.
pub struct PolicyApplier {
    store: Arc<dyn PolicyStore>,
    linter: Arc<dyn PolicyLinter>,
}

impl PolicyApplier {
    pub fn new(store: Arc<dyn PolicyStore>, linter: Arc<dyn PolicyLinter>) -> Self {
        Self { store, linter }
    }

    /// Merge `bindings` into the project's current policy and write it back.
    ///
    /// Nothing is read or written when linting rejects the bindings. The
    /// write is a single `set_policy` with the full merged body; a concurrent
    /// change is reported by the store rather than retried.
    pub async fn apply(
        &self,
        project_id: &str,
        bindings: &[Binding],
    ) -> Result<ExternalPolicy, ApplyError> {
        match lint_bindings(self.linter.as_ref(), project_id, bindings)
            .await
            .map_err(ApplyError::LintUnavailable)?
        {
            LintOutcome::Clean => {}
            LintOutcome::Rejected(failure) => return Err(ApplyError::Lint(failure)),
        }

        let current = self
            .store
            .get_policy(project_id)
            .await
            .map_err(ApplyError::Store)?;
        let merged = merge(&current, bindings);

        tracing::info!(
            project_id,
            before = current.bindings.len(),
            after = merged.bindings.len(),
            "Writing merged policy"
        );

        self.store
            .set_policy(project_id, &merged)
            .await
            .map_err(ApplyError::Store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use iamgen_core::{Condition, LintResult};
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        policy: Mutex<ExternalPolicy>,
        writes: Mutex<u32>,
        fail_set: Option<StoreError>,
    }

    #[async_trait]
    impl PolicyStore for MemoryStore {
        async fn get_policy(&self, _resource_id: &str) -> Result<ExternalPolicy, StoreError> {
            Ok(self.policy.lock().unwrap().clone())
        }

        async fn set_policy(
            &self,
            _resource_id: &str,
            policy: &ExternalPolicy,
        ) -> Result<ExternalPolicy, StoreError> {
            if let Some(err) = &self.fail_set {
                return Err(err.clone());
            }
            *self.writes.lock().unwrap() += 1;
            *self.policy.lock().unwrap() = policy.clone();
            Ok(policy.clone())
        }
    }

    enum LinterMode {
        Clean,
        Error,
        Down,
    }

    struct FixedLinter(LinterMode);

    #[async_trait]
    impl PolicyLinter for FixedLinter {
        async fn lint(
            &self,
            _resource_name: &str,
            _condition: &Condition,
        ) -> Result<Vec<LintResult>, StoreError> {
            match self.0 {
                LinterMode::Clean => Ok(Vec::new()),
                LinterMode::Error => Ok(vec![LintResult {
                    severity: "ERROR".into(),
                    debug_message: "bad CEL".into(),
                    field_name: "condition.expression".into(),
                }]),
                LinterMode::Down => Err(StoreError::new(503, "linter unavailable")),
            }
        }
    }

    fn applier(store: Arc<MemoryStore>, mode: LinterMode) -> PolicyApplier {
        PolicyApplier::new(store, Arc::new(FixedLinter(mode)))
    }

    fn conditional_viewer() -> Binding {
        Binding::new("roles/viewer", ["user:bob@x.com"]).with_condition(Condition {
            title: "expires".into(),
            description: None,
            expression: "request.time < timestamp(\"2030-01-01T00:00:00Z\")".into(),
            location: None,
        })
    }

    #[tokio::test]
    async fn merges_and_writes_once() {
        let store = Arc::new(MemoryStore {
            policy: Mutex::new(ExternalPolicy {
                bindings: vec![Binding::new("roles/owner", ["user:alice@x.com"])],
                etag: Some("e1".into()),
                ..Default::default()
            }),
            ..Default::default()
        });
        let updated = applier(store.clone(), LinterMode::Clean)
            .apply("demo", &[Binding::new("roles/viewer", ["user:bob@x.com"])])
            .await
            .unwrap();

        assert_eq!(
            updated.bindings,
            vec![
                Binding::new("roles/owner", ["user:alice@x.com"]),
                Binding::new("roles/viewer", ["user:bob@x.com"]),
            ]
        );
        assert_eq!(updated.etag.as_deref(), Some("e1"));
        assert_eq!(*store.writes.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn lint_findings_block_the_write() {
        let store = Arc::new(MemoryStore::default());
        let err = applier(store.clone(), LinterMode::Error)
            .apply("demo", &[conditional_viewer()])
            .await
            .unwrap_err();

        assert!(matches!(err, ApplyError::Lint(_)));
        assert!(err.to_string().contains("[ERROR] bad CEL"));
        assert_eq!(*store.writes.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn linter_outage_is_distinct_from_findings() {
        let store = Arc::new(MemoryStore::default());
        let err = applier(store, LinterMode::Down)
            .apply("demo", &[conditional_viewer()])
            .await
            .unwrap_err();

        assert!(matches!(err, ApplyError::LintUnavailable(_)));
        assert_eq!(err.to_string(), "Failed to lint policy: linter unavailable");
    }

    #[tokio::test]
    async fn unconditional_bindings_skip_a_broken_linter() {
        let store = Arc::new(MemoryStore::default());
        let updated = applier(store, LinterMode::Down)
            .apply("demo", &[Binding::new("roles/viewer", ["user:bob@x.com"])])
            .await
            .unwrap();
        assert_eq!(updated.bindings.len(), 1);
    }

    #[tokio::test]
    async fn store_errors_keep_their_status() {
        let store = Arc::new(MemoryStore {
            fail_set: Some(StoreError::new(400, "User bob@x.com does not exist.")),
            ..Default::default()
        });
        let err = applier(store, LinterMode::Clean)
            .apply("demo", &[Binding::new("roles/viewer", ["user:bob@x.com"])])
            .await
            .unwrap_err();

        match err {
            ApplyError::Store(e) => assert_eq!(e.status, 400),
            other => panic!("unexpected {other:?}"),
        }
    }
}
