//! # iamgen-server
//!
//! HTTP API for iamgen:
//!
//! | route | purpose |
//! |---|---|
//! | `GET /healthz` | liveness |
//! | `POST /generate_policy` | natural language → reviewed policy |
//! | `POST /apply_policy` | lint, merge and write a policy to a project |
//! | `GET /get_projects` | projects visible to the service |

pub mod auth;
pub mod error;
pub mod handlers;
pub mod state;

use axum::Router;
use axum::extract::Request;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

pub use error::ApiError;
pub use state::AppState;

pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/generate_policy", post(handlers::generate_policy))
        .route("/apply_policy", post(handlers::apply_policy))
        .route("/get_projects", get(handlers::get_projects))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
            tracing::info_span!(
                "http",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %uuid::Uuid::new_v4(),
            )
        }))
        .with_state(state)
}

/// Credentialed CORS for the configured browser origins.
///
/// Wildcards cannot be combined with credentials, so methods and headers
/// mirror the preflight request instead.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) if origin != "*" => Some(value),
            _ => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}
