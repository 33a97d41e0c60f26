use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::persistence::Database;

#[derive(Clone)]
struct HealthState {
    db: Arc<Database>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    service: &'static str,
}

/// Binds the `/health` endpoint and serves it until the process exits (§6).
/// Meant to run on its own `tokio::spawn`ed task alongside the orchestrator.
pub async fn serve(db: Arc<Database>, port: u16) -> anyhow::Result<()> {
    let state = HealthState { db };

    let app = Router::new()
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "health endpoint listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check(State(state): State<HealthState>) -> impl IntoResponse {
    if state.db.ping().await {
        (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                database: "reachable",
                service: "scanner",
            }),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse {
                status: "degraded",
                database: "unreachable",
                service: "scanner",
            }),
        )
    }
}
