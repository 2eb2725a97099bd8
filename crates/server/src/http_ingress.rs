use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    routing::post,
    Form, Json, Router,
};
use chrono::Utc;
use docbot_slack::events::{EventDispatcher, SlackEnvelope, SlackEvent};
use docbot_slack::signature::{SignatureVerifier, SIGNATURE_HEADER, TIMESTAMP_HEADER};
use docbot_slack::socket::dispatch_envelope;
use serde::Serialize;
use serde_json::{json, Value};
use tokio_util::task::TaskTracker;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct IngressState {
    pub verifier: SignatureVerifier,
    pub dispatcher: Arc<EventDispatcher>,
    /// Accepted requests keep running after the 200; shutdown waits on these.
    pub dispatches: TaskTracker,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct IngressErrorBody {
    pub error: String,
}

type IngressError = (StatusCode, Json<IngressErrorBody>);

fn reject(status: StatusCode, error: impl Into<String>) -> IngressError {
    (status, Json(IngressErrorBody { error: error.into() }))
}

pub fn router(state: IngressState) -> Router {
    Router::new()
        .route("/slack/events", post(events))
        .route("/slack/commands", post(commands))
        .route("/slack/interactions", post(interactions))
        .with_state(state)
}

fn verify(state: &IngressState, headers: &HeaderMap, body: &[u8]) -> Result<(), IngressError> {
    let header_value = |name: &str| headers.get(name).and_then(|value| value.to_str().ok());
    state
        .verifier
        .verify(
            header_value(TIMESTAMP_HEADER),
            header_value(SIGNATURE_HEADER),
            body,
            Utc::now().timestamp(),
        )
        .map_err(|error| {
            warn!(
                event_name = "ingress.http.signature_rejected",
                correlation_id = "unknown",
                error = %error,
                "rejected unsigned slack request"
            );
            reject(StatusCode::UNAUTHORIZED, error.to_string())
        })
}

async fn decode_form(body: Bytes) -> Result<HashMap<String, String>, IngressError> {
    let request = Request::builder()
        .method(Method::POST)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body))
        .map_err(|error| reject(StatusCode::BAD_REQUEST, error.to_string()))?;
    let Form(fields) = Form::<HashMap<String, String>>::from_request(request, &())
        .await
        .map_err(|rejection| reject(StatusCode::BAD_REQUEST, rejection.body_text()))?;
    Ok(fields)
}

fn spawn_dispatch(state: &IngressState, envelope_id: String, event: SlackEvent) {
    info!(
        event_name = "ingress.http.accepted",
        correlation_id = %envelope_id,
        event_type = ?event.event_type(),
        "slack request accepted"
    );
    let envelope = SlackEnvelope { envelope_id, event };
    state.dispatches.spawn(dispatch_envelope(state.dispatcher.clone(), envelope));
}

async fn events(
    State(state): State<IngressState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), IngressError> {
    verify(&state, &headers, &body)?;
    let payload: Value = serde_json::from_slice(&body)
        .map_err(|error| reject(StatusCode::BAD_REQUEST, error.to_string()))?;

    match payload.get("type").and_then(Value::as_str) {
        Some("url_verification") => {
            let challenge = payload.get("challenge").and_then(Value::as_str).unwrap_or_default();
            Ok((StatusCode::OK, Json(json!({ "challenge": challenge }))))
        }
        Some("event_callback") => {
            let envelope_id = payload
                .get("event_id")
                .and_then(Value::as_str)
                .map(str::to_owned)
                .unwrap_or_else(|| Uuid::new_v4().to_string());
            spawn_dispatch(&state, envelope_id, SlackEvent::from_events_api(&payload));
            Ok((StatusCode::OK, Json(json!({}))))
        }
        other => {
            info!(
                event_name = "ingress.http.ignored",
                correlation_id = "unknown",
                payload_type = other.unwrap_or("missing"),
                "ignoring events api payload"
            );
            Ok((StatusCode::OK, Json(json!({}))))
        }
    }
}

async fn commands(
    State(state): State<IngressState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, IngressError> {
    verify(&state, &headers, &body)?;
    let fields = decode_form(body).await?;
    let payload = serde_json::to_value(&fields)
        .map_err(|error| reject(StatusCode::BAD_REQUEST, error.to_string()))?;
    let envelope_id = fields.get("trigger_id").cloned().unwrap_or_else(|| Uuid::new_v4().to_string());
    spawn_dispatch(&state, envelope_id, SlackEvent::from_slash_command(&payload));
    Ok(StatusCode::OK)
}

async fn interactions(
    State(state): State<IngressState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, IngressError> {
    verify(&state, &headers, &body)?;
    let fields = decode_form(body).await?;
    let raw = fields
        .get("payload")
        .ok_or_else(|| reject(StatusCode::BAD_REQUEST, "missing payload field"))?;
    let payload: Value = serde_json::from_str(raw)
        .map_err(|error| reject(StatusCode::BAD_REQUEST, error.to_string()))?;
    spawn_dispatch(&state, Uuid::new_v4().to_string(), SlackEvent::from_interactive(&payload));
    Ok(StatusCode::OK)
}
