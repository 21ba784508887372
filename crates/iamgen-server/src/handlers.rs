//! Route handlers.

use crate::auth::{PROJECT_ID_HEADER, authenticate, header_value};
use crate::error::ApiError;
use crate::state::AppState;
use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderMap;
use iamgen_core::{PolicyOutcome, PolicyRequest, ProjectSummary};
use iamgen_runtime::parser;
use serde_json::{Value, json};

pub async fn healthz() -> Json<Value> {
    Json(json!({ "ok": true, "service": "iamgen-server" }))
}

/// `POST /generate_policy`
pub async fn generate_policy(
    State(state): State<AppState>,
    body: Result<Json<PolicyRequest>, JsonRejection>,
) -> Result<Json<PolicyOutcome>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let prompt = request
        .prompt()
        .ok_or_else(|| ApiError::BadRequest("Prompt must not be empty".into()))?;

    let outcome = state
        .pipeline()
        .produce_policy(prompt)
        .await
        .map_err(|e| ApiError::Internal(format!("Error generating policy: {}", e)))?;
    Ok(Json(outcome))
}

/// `POST /apply_policy`
///
/// Checks run in a fixed order: payload, token, project id, lint, store.
pub async fn apply_policy(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let payload = match body.get("policy") {
        None | Some(Value::Null) => {
            return Err(ApiError::BadRequest("Missing policy payload".into()));
        }
        Some(Value::String(text)) if text.trim().is_empty() => {
            return Err(ApiError::BadRequest("Missing policy payload".into()));
        }
        Some(payload) => payload,
    };
    let policy = parser::parse_policy(payload)
        .map_err(|e| ApiError::BadRequest(format!("Invalid policy JSON: {}", e)))?;

    let identity = authenticate(&state, &headers).await?;

    let project_id = header_value(&headers, PROJECT_ID_HEADER)
        .ok_or_else(|| ApiError::BadRequest("Missing project-id".into()))?;

    tracing::info!(
        subject = %identity.subject,
        project_id,
        bindings = policy.bindings.len(),
        "Applying policy"
    );

    let updated = state.applier().apply(project_id, &policy.bindings).await?;

    Ok(Json(json!({
        "status": "Policy applied",
        "updated_policy": updated,
    })))
}

/// `GET /get_projects`
pub async fn get_projects(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ProjectSummary>>, ApiError> {
    authenticate(&state, &headers).await?;

    let projects = state
        .projects()
        .list_projects()
        .await
        .map_err(|e| ApiError::Internal(format!("Failed to fetch projects: {}", e)))?;
    Ok(Json(projects))
}
