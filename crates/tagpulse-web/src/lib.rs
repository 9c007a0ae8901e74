use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tagpulse_sync::IngestMetrics;
use tokio::net::TcpListener;
use tracing::{error, info};

pub const CRATE_NAME: &str = "tagpulse-web";

/// Metrics exposition router. Handlers only read the shared registry.
pub fn app(metrics: Arc<IngestMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(metrics)
}

pub async fn serve(addr: SocketAddr, metrics: Arc<IngestMetrics>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "metrics endpoint listening");
    axum::serve(listener, app(metrics)).await?;
    Ok(())
}

async fn metrics_handler(State(metrics): State<Arc<IngestMetrics>>) -> Response {
    match metrics.encode_text() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(err) => {
            error!(error = %err, "encoding metrics failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("metrics encoding error: {err}"),
            )
                .into_response()
        }
    }
}

async fn healthz_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
