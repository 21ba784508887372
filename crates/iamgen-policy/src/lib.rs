//! # iamgen-policy
//!
//! Applying a generated policy to a live project: the additive merge engine,
//! pre-flight linting of conditional bindings, and the store contracts the
//! Google adapters implement.

pub mod apply;
pub mod lint;
pub mod merge;
pub mod store;

pub use apply::{ApplyError, PolicyApplier};
pub use lint::{LintFailure, LintOutcome, PolicyLinter, lint_bindings};
pub use merge::merge;
pub use store::{PolicyStore, ProjectDirectory, StoreError, describe_provider_error};
