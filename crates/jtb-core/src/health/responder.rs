use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};

pub const HEALTH_PATH: &str = "/health";

#[derive(Clone)]
struct HealthState {
    body: Arc<str>,
}

/// The exact body served on `/health`.
pub fn health_body(bot_identifier: &str) -> String {
    format!(
        r#"{{"status": "healthy", "bot": {}}}"#,
        serde_json::Value::from(bot_identifier)
    )
}

/// Router answering only `GET /health`, matched on the full request target:
/// `/health?x=1` is a different path and gets 404. No tracing layer is
/// attached so probes do not show up in the logs.
pub fn router(bot_identifier: &str) -> Router {
    let state = HealthState {
        body: health_body(bot_identifier).into(),
    };
    Router::new()
        .route(HEALTH_PATH, get(health).fallback(method_not_allowed))
        .fallback(not_found)
        .with_state(state)
}

async fn health(State(state): State<HealthState>, uri: Uri) -> Response {
    if uri.query().is_some() {
        return StatusCode::NOT_FOUND.into_response();
    }
    (
        [(header::CONTENT_TYPE, "application/json")],
        state.body.to_string(),
    )
        .into_response()
}

async fn method_not_allowed() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
