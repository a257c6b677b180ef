use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use aerolens_agent::QueryPort;

const DEFAULT_SESSION_ID: &str = "default_session";

#[derive(Clone)]
pub struct ApiState {
    engine: Arc<dyn QueryPort>,
}

/// Ingress payload. Callers in the wild spell the prompt field several ways;
/// all of them land on `prompt`.
#[derive(Debug, Deserialize)]
pub struct SubmitQueryPayload {
    #[serde(default, alias = "message", alias = "query", alias = "text")]
    prompt: Option<String>,
    #[serde(default)]
    session_id: Option<String>,
}

pub fn router(engine: Arc<dyn QueryPort>) -> Router {
    Router::new().route("/v1/queries", post(submit_query)).with_state(ApiState { engine })
}

pub async fn submit_query(
    State(state): State<ApiState>,
    Json(payload): Json<SubmitQueryPayload>,
) -> Response {
    let prompt = payload.prompt.unwrap_or_default();
    if prompt.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "request must include a non-empty prompt (aliases: message, query, text)"
            })),
        )
            .into_response();
    }

    let session_id = payload
        .session_id
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_SESSION_ID.to_string());

    info!(
        event_name = "ingress.query_accepted",
        session_id = %session_id,
        text_chars = prompt.chars().count(),
        "query accepted"
    );

    let response = state.engine.submit_query(&prompt, &session_id).await;
    let status = if response.is_error() { StatusCode::BAD_GATEWAY } else { StatusCode::OK };
    (status, Json(response)).into_response()
}
