//! Pre-flight linting of conditional bindings.

use crate::store::StoreError;
use async_trait::async_trait;
use iamgen_core::{
    Binding, Condition, LintResult, conditional_bindings, project_resource_name,
};
use std::fmt;

/// Checks an IAM condition against the resource it will be attached to.
#[async_trait]
pub trait PolicyLinter: Send + Sync {
    async fn lint(
        &self,
        resource_name: &str,
        condition: &Condition,
    ) -> Result<Vec<LintResult>, StoreError>;
}

/// Every finding the linter reported across all conditional bindings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintFailure {
    pub issues: Vec<LintResult>,
}

impl fmt::Display for LintFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let described: Vec<String> = self.issues.iter().map(LintResult::describe).collect();
        f.write_str(&described.join(" | "))
    }
}

impl std::error::Error for LintFailure {}

#[derive(Debug)]
pub enum LintOutcome {
    Clean,
    Rejected(LintFailure),
}

/// Lint every binding that carries a condition.
///
/// Unconditional bindings are not sent to the linter. Findings of any
/// severity reject the policy.
pub async fn lint_bindings(
    linter: &dyn PolicyLinter,
    project_id: &str,
    bindings: &[Binding],
) -> Result<LintOutcome, StoreError> {
    let resource = project_resource_name(project_id);
    let mut issues = Vec::new();

    for (binding, condition) in conditional_bindings(bindings) {
        let found = linter.lint(&resource, condition).await?;
        if !found.is_empty() {
            tracing::info!(
                role = %binding.role,
                condition = %condition.title,
                count = found.len(),
                "Linter reported issues"
            );
        }
        issues.extend(found);
    }

    if issues.is_empty() {
        Ok(LintOutcome::Clean)
    } else {
        Ok(LintOutcome::Rejected(LintFailure { issues }))
    }
}
