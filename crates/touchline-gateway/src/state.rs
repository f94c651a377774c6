use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use touchline_agent::WorkflowExecutor;

/// Shared application state for axum handlers.
pub struct AppState {
    pub executor: Arc<WorkflowExecutor>,
    /// Parent of every per-request run token.
    pub shutdown: CancellationToken,
}
