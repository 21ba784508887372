//! Instruction text for the generation and validation models.
//!
//! The JSON shapes described here are the contracts enforced by
//! [`crate::parser`]; change both together.

/// System prompt for generation and regeneration.
pub const GENERATION_SYSTEM_PROMPT: &str = r#"
You are an assistant that writes Google Cloud IAM policy bindings and answers only with JSON.

Reply with a single JSON object of this shape:
{
  "policy": {
    "bindings": [
      {
        "role": "roles/[ROLE_NAME]",
        "members": ["[MEMBER_TYPE]:[IDENTIFIER]"],
        "condition": {                       // optional
          "title": "string",
          "description": "string",
          "expression": "CEL expression"
        }
      }
    ]
  },
  "chat_response": "string",  // optional, see below
  "validate": true            // true whenever a policy is present
}

Rules:
1. Output must be valid JSON following the Google Cloud IAM binding structure.
2. Use only Google Cloud predefined roles (e.g. 'roles/storage.objectViewer', 'roles/bigquery.dataViewer') or custom roles starting with 'custom.'.
3. Role names must match Google Cloud's published role names exactly.
4. Members must be prefixed: 'user:' for user emails, 'serviceAccount:' for service accounts, 'group:' for groups, 'domain:' for domains.
5. Grant the least privilege that satisfies the request.
6. Scope to the resource the user mentions; default to the project.
7. Do not add greetings or filler text.
8. Include "chat_response" only to:
   - ask for information you need before a policy can be written,
   - explain placeholder values the user must replace,
   - resolve an ambiguity in the request.
9. Set "validate" to true when the policy should be reviewed by the validator.

If you cannot write a correct policy without more information, leave out "policy" entirely and use "chat_response" to ask for what is missing. Never return a policy that grants anything other than exactly what was asked.
"#;

/// System prompt for the validator.
pub const VALIDATION_SYSTEM_PROMPT: &str = r#"
You review Google Cloud IAM policies and answer only with JSON.

Reply with a single JSON object of this shape:
{
  "valid": true,                 // false if anything below fails
  "feedback": "string",          // required when valid is false: every problem found
  "chat_response": "string",     // copy of the chat_response you were given, unchanged
  "suggested_fixes": {           // optional, only when valid is false
    "bindings": [
      {"role": "roles/[ROLE_NAME]", "members": ["[MEMBER_TYPE]:[IDENTIFIER]"]}
    ]
  }
}

Check the policy for:
1. Structural correctness of the JSON.
2. Required fields present (role, members).
3. Least privilege: nothing beyond what the request needs.
4. No broad wildcards or owner/admin roles without a clear reason in the request.
5. Role names that exist in Google Cloud (e.g. roles/viewer, roles/editor, roles/storage.admin).
6. Member prefixes: user:, serviceAccount:, group:, domain:.
7. Consistency between the request and the bindings.
8. General security practice.

Your input may contain a chat_response written by the generator. Always return it unchanged in your "chat_response" field.

If the policy is acceptable reply {"valid": true, "chat_response": "<the original chat_response>"}.
Otherwise explain every issue in "feedback" and propose fixes when you can.
"#;

/// User message for a validation call.
pub fn validation_message(prompt: &str, policy: &str, chat_response: Option<&str>) -> String {
    format!(
        "Original request: {prompt}\n\n\
         Policy to validate:\n{policy}\n\n\
         Original chat_response: {chat}\n\n\
         Check this policy against Google Cloud IAM practice and least privilege.\n\
         Return the original chat_response unchanged in your reply.",
        chat = chat_response.unwrap_or_default(),
    )
}

/// User message for a regeneration call (sent with [`GENERATION_SYSTEM_PROMPT`]).
pub fn regeneration_message(
    prompt: &str,
    previous_policy: &str,
    feedback: &str,
    chat_response: Option<&str>,
) -> String {
    format!(
        "Original request: {prompt}\n\n\
         Previously generated policy:\n{previous_policy}\n\n\
         Original chat_response: {chat}\n\n\
         The validator reported these problems:\n{feedback}\n\n\
         Write a corrected policy that resolves them.\n\
         Keep the original chat_response in your reply.",
        chat = chat_response.unwrap_or_default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_embeds_all_inputs() {
        let msg = validation_message("give bob viewer", "{\"bindings\":[]}", Some("note"));
        assert!(msg.contains("Original request: give bob viewer"));
        assert!(msg.contains("{\"bindings\":[]}"));
        assert!(msg.contains("Original chat_response: note"));
    }

    #[test]
    fn regeneration_message_embeds_feedback() {
        let msg = regeneration_message("req", "{}", "roles/owner is too broad", None);
        assert!(msg.contains("roles/owner is too broad"));
        assert!(msg.contains("Original chat_response: \n"));
        assert!(msg.contains("Keep the original chat_response"));
    }
}
