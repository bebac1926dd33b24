//! API route definitions.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use super::error::ApiError;
use super::state::AppState;
use crate::record::{OutcomeKind, TestRecord};
use crate::relay::classify::NO_RESPONSE_MESSAGE;
use crate::relay::{Outcome, RawTestRequest};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/test", post(run_test))
        .route("/test/{id}", get(get_test))
        .route("/history", get(history))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    let store = if state.history.store_available().await {
        "ok"
    } else {
        "unavailable"
    };

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "store": store,
        "persistenceFailures": state.recorder.persistence_failures(),
    }))
}

async fn run_test(
    State(state): State<AppState>,
    payload: Result<Json<RawTestRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(raw) = payload.map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
    let completed = state.relay.run(raw).await?;
    Ok(Json(test_reply(&completed.outcome)))
}

async fn get_test(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TestRecord>, ApiError> {
    Ok(Json(state.history.get_by_id(&id).await?))
}

async fn history(State(state): State<AppState>) -> Result<Json<Vec<TestRecord>>, ApiError> {
    let records = state
        .history
        .list_recent(state.history_limit)
        .await
        .map_err(|e| ApiError::internal("Failed to fetch test history", e))?;
    Ok(Json(records))
}

/// Body returned by `POST /api/test` for a classified outcome.
///
/// Failures are still answered with 200; the failure lives in the body.
pub fn test_reply(outcome: &Outcome) -> Value {
    let message = outcome.error_message.as_deref().unwrap_or_default();

    match outcome.kind {
        OutcomeKind::Success => json!({
            "status": outcome.status,
            "data": outcome.body,
            "responseTime": outcome.response_time_ms,
            "headers": outcome.headers,
            "saved": true,
        }),
        OutcomeKind::HttpError => json!({
            "error": true,
            "message": message,
            "status": outcome.status,
            "data": outcome.body,
        }),
        OutcomeKind::NetworkError => json!({
            "error": true,
            "message": message,
            "status": outcome.status,
            "data": NO_RESPONSE_MESSAGE,
        }),
        OutcomeKind::SetupError => json!({
            "error": true,
            "message": message,
        }),
    }
}
