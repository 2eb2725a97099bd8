use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use docbot_agent::retrieval::DocsRetriever;
use serde::Serialize;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct HealthState {
    pub retriever: Arc<dyn DocsRetriever>,
    pub llm_configured: bool,
    pub ticketing_configured: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub docs: HealthCheck,
    pub llm_configured: bool,
    pub ticketing_configured: bool,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let docs = docs_check(state.retriever.as_ref()).await;
    let ready = docs.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "docbot-server runtime initialized".to_string(),
        },
        docs,
        llm_configured: state.llm_configured,
        ticketing_configured: state.ticketing_configured,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn docs_check(retriever: &dyn DocsRetriever) -> HealthCheck {
    let backend = retriever.backend().as_str();
    match tokio::time::timeout(PROBE_TIMEOUT, retriever.probe()).await {
        Ok(Ok(detail)) => HealthCheck { status: "ready", detail: format!("{backend}: {detail}") },
        Ok(Err(error)) => {
            HealthCheck { status: "degraded", detail: format!("{backend} probe failed: {error}") }
        }
        Err(_) => HealthCheck {
            status: "degraded",
            detail: format!("{backend} probe timed out after {}s", PROBE_TIMEOUT.as_secs()),
        },
    }
}
