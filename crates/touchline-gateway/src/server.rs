use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use touchline_agent::WorkflowExecutor;
use touchline_core::config::GatewayConfig;

use crate::routes;
use crate::state::AppState;

/// HTTP gateway serving the question workflow, built on axum.
pub struct GatewayServer {
    config: GatewayConfig,
    executor: Arc<WorkflowExecutor>,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, executor: Arc<WorkflowExecutor>) -> Self {
        Self { config, executor }
    }

    /// The API routes. In-flight runs are cancelled when `shutdown` fires.
    pub fn router(&self, shutdown: CancellationToken) -> Router {
        let state = Arc::new(AppState {
            executor: self.executor.clone(),
            shutdown,
        });

        Router::new()
            .route("/api/health", get(routes::health))
            .route("/api/chat", post(routes::chat))
            .route("/api/v1/chat", post(routes::chat))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    /// Run the gateway server until the cancellation token is triggered.
    pub async fn run(&self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let app = self.router(shutdown.clone());

        let listener = TcpListener::bind(&self.config.bind).await?;
        info!(bind = %self.config.bind, "Gateway listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Gateway shut down");
        Ok(())
    }
}
