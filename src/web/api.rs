use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::json;
use thiserror::Error;

use crate::models::{demo_analysis, demo_documents, Session};
use crate::session::guard::{guard, GuardOutcome, CHECKING_MESSAGE};
use crate::telemetry::{ErrorReport, TELEMETRY_PATH};

/// Read-only view of the client state the server was started with.
#[derive(Debug, Default)]
pub struct AppState {
    pub session: Option<Session>,
    pub loading: bool,
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
        };
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));
        (status, body).into_response()
    }
}

pub fn routes(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/session", get(get_session))
        .route("/api/documents", get(get_documents))
        .route("/api/documents/:id/analysis", get(get_analysis))
        .route(TELEMETRY_PATH, post(receive_error))
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn get_session(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let session = state.session.as_ref().filter(|s| s.is_valid());
    Json(json!({
        "loading": state.loading,
        "signedIn": session.is_some(),
        "user": session.map(|s| json!({
            "id": s.user.id,
            "email": s.user.email,
            "tenantId": s.tenant_id(),
        })),
    }))
}

/// Guard response for a protected route, or `None` when access is allowed.
fn protect(state: &AppState, uri: &Uri) -> Option<Response> {
    let from = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let outcome = guard(state.session.as_ref(), state.loading, from);
    match &outcome {
        GuardOutcome::Checking => Some(
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "checking", "message": CHECKING_MESSAGE })),
            )
                .into_response(),
        ),
        GuardOutcome::Redirect { .. } => {
            let location = outcome.redirect_location().unwrap_or_default();
            tracing::debug!(from, "redirecting unauthenticated request");
            Some((StatusCode::SEE_OTHER, [(header::LOCATION, location)]).into_response())
        }
        GuardOutcome::Allow(_) => None,
    }
}

async fn get_documents(State(state): State<SharedState>, uri: Uri) -> Response {
    if let Some(denied) = protect(&state, &uri) {
        return denied;
    }
    Json(json!({ "documents": demo_documents() })).into_response()
}

async fn get_analysis(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    uri: Uri,
) -> Result<Response, ApiError> {
    if let Some(denied) = protect(&state, &uri) {
        return Ok(denied);
    }
    let analysis = demo_analysis(&id)
        .ok_or_else(|| ApiError::NotFound(format!("No analysis for document {}", id)))?;
    Ok(Json(json!({ "documentId": id, "analysis": analysis })).into_response())
}

async fn receive_error(Json(report): Json<ErrorReport>) -> StatusCode {
    tracing::error!(
        error = %report.message,
        stack = ?report.stack,
        component = ?report.component_stack,
        user_agent = ?report.user_agent,
        timestamp = %report.timestamp,
        "client error reported"
    );
    StatusCode::ACCEPTED
}
