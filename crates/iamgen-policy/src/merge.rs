//! Additive merge of generated bindings into a live policy.
//!
//! The merge never removes a binding or a member. A binding in the live
//! policy is only touched when a new binding targets the same role under the
//! same condition, and then only by appending members it does not have yet.

use iamgen_core::{Binding, ExternalPolicy};

/// Merge `new_bindings` into a copy of `existing`.
///
/// Everything but `bindings` (etag, version, auditConfigs, unknown fields) is
/// carried over untouched so the result can be written back as-is.
pub fn merge(existing: &ExternalPolicy, new_bindings: &[Binding]) -> ExternalPolicy {
    let mut merged = existing.clone();

    for incoming in new_bindings {
        let target = merged
            .bindings
            .iter_mut()
            .find(|b| b.role == incoming.role && b.condition == incoming.condition);

        match target {
            Some(current) => {
                let before = current.members.len();
                extend_unique(&mut current.members, &incoming.members);
                tracing::debug!(
                    role = %incoming.role,
                    added = current.members.len() - before,
                    "Merged members into existing binding"
                );
            }
            None => {
                let mut binding = incoming.clone();
                binding.members = Vec::with_capacity(incoming.members.len());
                extend_unique(&mut binding.members, &incoming.members);
                tracing::debug!(
                    role = %incoming.role,
                    conditional = binding.condition.is_some(),
                    "Appended new binding"
                );
                merged.bindings.push(binding);
            }
        }
    }

    merged
}

fn extend_unique(members: &mut Vec<String>, additions: &[String]) {
    for member in additions {
        if !members.contains(member) {
            members.push(member.clone());
        }
    }
}
