//! Job runner webhook (`/api/inngest`).
//!
//! GET describes this app, PUT pushes the function manifest to the runner,
//! POST executes one function for one event. Responses are plain JSON; the
//! runner reads the status code to decide whether to retry.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use crate::services::jobs::{manifest, InvocationEvent, JobError, FUNCTIONS};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvokeParams {
    pub fn_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InvocationBody {
    event: InvocationEvent,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Introspection {
    pub app_id: String,
    pub function_count: usize,
    pub has_event_key: bool,
    pub has_signing_key: bool,
    pub mode: &'static str,
}

fn reply(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

/// GET /api/inngest
pub async fn introspect(State(state): State<AppState>) -> Json<Introspection> {
    Json(Introspection {
        app_id: state.jobs.app_id.clone(),
        function_count: FUNCTIONS.len(),
        has_event_key: !state.jobs.event_key.trim().is_empty(),
        has_signing_key: state.verifier.has_signing_key(),
        mode: if state.verifier.is_dev_mode() { "dev" } else { "cloud" },
    })
}

/// PUT /api/inngest
pub async fn register(State(state): State<AppState>) -> Response {
    let functions = manifest(&state.jobs.app_id, &state.jobs.serve_url);
    let count = functions.len();

    match state.queue.register(functions).await {
        Ok(()) => {
            info!("Job functions registered ({})", count);
            Json(json!({ "message": "Successfully registered", "functions": count })).into_response()
        }
        Err(e) => {
            error!("Job function registration failed: {}", e);
            reply(StatusCode::INTERNAL_SERVER_ERROR, "Registration failed")
        }
    }
}

/// POST /api/inngest?fnId=
pub async fn invoke(
    State(state): State<AppState>,
    Query(params): Query<InvokeParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(e) = state.verifier.verify(&headers, &body) {
        warn!("Rejected webhook call: {}", e);
        return reply(StatusCode::UNAUTHORIZED, e.to_string());
    }

    let Some(fn_id) = params.fn_id.filter(|id| !id.trim().is_empty()) else {
        return reply(StatusCode::BAD_REQUEST, "Missing fnId");
    };

    let invocation: InvocationBody = match serde_json::from_slice(&body) {
        Ok(invocation) => invocation,
        Err(e) => return reply(StatusCode::BAD_REQUEST, format!("Invalid invocation body: {e}")),
    };

    match state.executor.invoke(&fn_id, invocation.event).await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(err @ JobError::UnknownFunction(_)) => reply(StatusCode::NOT_FOUND, err.to_string()),
        Err(err @ JobError::InvalidEvent(_)) => reply(StatusCode::BAD_REQUEST, err.to_string()),
        Err(err) => {
            error!("Job {} failed, leaving it to the runner to retry: {}", fn_id, err);
            reply(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}
