use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::Json;
use tracing::info;

use touchline_agent::answer_question;

use crate::error::ApiError;
use crate::middleware::ValidQuestion;
use crate::state::AppState;

// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// POST /api/chat
//
// One workflow instance per request. If the client goes away axum drops
// this future, which drops the run and aborts any in-flight branches.
pub async fn chat(
    State(state): State<Arc<AppState>>,
    ValidQuestion(question): ValidQuestion,
) -> Result<Json<serde_json::Value>, ApiError> {
    let start = Instant::now();
    let cancel = state.shutdown.child_token();
    let answer = answer_question(&state.executor, &question, cancel).await?;
    info!(elapsed_ms = start.elapsed().as_millis() as u64, "Chat answered");
    Ok(Json(serde_json::json!({
        "data": { "answer": answer }
    })))
}
