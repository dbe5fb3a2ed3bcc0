//! Instagram webhook endpoints.
//!
//! - `GET /webhook`, `GET /webhook/{tenant_id}`: subscription handshake
//! - `POST /webhook`, `POST /webhook/{tenant_id}`: message delivery

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use voicely_agent::meta::{extract_events, verify_challenge};
use voicely_core::errors::{ApplicationError, InterfaceError};
use voicely_core::tenant::{extract_tenant_id, TenantId};

use crate::bootstrap::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", get(verify).post(receive))
        .route("/webhook/{tenant_id}", get(verify_for_tenant).post(receive_for_tenant))
        .with_state(state)
}

async fn verify(State(state): State<AppState>, Query(params): Query<VerifyParams>) -> Response {
    handshake(&state, None, &params)
}

async fn verify_for_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    Query(params): Query<VerifyParams>,
) -> Response {
    handshake(&state, Some(&tenant_id), &params)
}

fn handshake(state: &AppState, tenant_id: Option<&str>, params: &VerifyParams) -> Response {
    let challenge = verify_challenge(
        params.mode.as_deref(),
        params.verify_token.as_deref(),
        params.challenge.as_deref(),
        state.verify_token.expose_secret(),
    );

    match challenge {
        Some(challenge) => {
            info!(
                event_name = "webhook.verify.accepted",
                tenant_id = tenant_id.unwrap_or("-"),
                "webhook subscription verified"
            );
            (StatusCode::OK, challenge.to_string()).into_response()
        }
        None => {
            warn!(
                event_name = "webhook.verify.rejected",
                tenant_id = tenant_id.unwrap_or("-"),
                mode = params.mode.as_deref().unwrap_or("-"),
                "webhook verification refused"
            );
            StatusCode::FORBIDDEN.into_response()
        }
    }
}

async fn receive(State(state): State<AppState>, body: Bytes) -> Response {
    deliver(state, None, body).await
}

async fn receive_for_tenant(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
    body: Bytes,
) -> Response {
    deliver(state, Some(tenant_id), body).await
}

/// Handles one delivery. Events are answered one at a time in payload order;
/// a failed reply is logged and the remaining events still run.
async fn deliver(state: AppState, path_tenant: Option<String>, body: Bytes) -> Response {
    let correlation_id = Uuid::new_v4().to_string();

    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => payload,
        Err(error) => {
            warn!(
                event_name = "webhook.payload.unparseable",
                correlation_id = %correlation_id,
                error = %error,
                "webhook body is not JSON; treating as empty"
            );
            Value::Null
        }
    };

    let raw_tenant = extract_tenant_id(path_tenant.as_deref(), &payload);
    let tenant_id = match TenantId::parse(&raw_tenant) {
        Ok(tenant_id) => tenant_id,
        Err(error) => {
            warn!(
                event_name = "webhook.tenant.invalid",
                correlation_id = %correlation_id,
                error = %error,
                "webhook addressed an invalid tenant id"
            );
            let interface =
                ApplicationError::Validation(error.to_string()).into_interface(&correlation_id);
            return error_response(StatusCode::BAD_REQUEST, &interface);
        }
    };

    let tenants = Arc::clone(&state.tenants);
    let lookup = tenant_id.clone();
    let profile = match tokio::task::spawn_blocking(move || tenants.get_or_load(&lookup)).await {
        Ok(Ok(profile)) => profile,
        Ok(Err(error)) => {
            error!(
                event_name = "webhook.tenant.load_failed",
                correlation_id = %correlation_id,
                tenant_id = %tenant_id,
                error = %error,
                "tenant profile could not be loaded"
            );
            let interface =
                ApplicationError::Tenant(error.to_string()).into_interface(&correlation_id);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &interface);
        }
        Err(error) => {
            error!(
                event_name = "webhook.tenant.load_panicked",
                correlation_id = %correlation_id,
                tenant_id = %tenant_id,
                error = %error,
                "tenant load task did not complete"
            );
            let interface =
                ApplicationError::Tenant(error.to_string()).into_interface(&correlation_id);
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, &interface);
        }
    };

    let events = extract_events(&payload);
    if events.is_empty() {
        debug!(
            event_name = "webhook.events.none",
            correlation_id = %correlation_id,
            tenant_id = %tenant_id,
            "delivery carried no text messages"
        );
        return StatusCode::OK.into_response();
    }

    let total = events.len();
    let mut failed = 0usize;
    for event in &events {
        match state.runtime.handle_event(&profile, event, &correlation_id).await {
            Ok(outcome) => debug!(
                event_name = "webhook.event.handled",
                correlation_id = %correlation_id,
                tenant_id = %tenant_id,
                action = outcome.action,
                "event handled"
            ),
            Err(error) => {
                failed += 1;
                error!(
                    event_name = "webhook.event.send_failed",
                    correlation_id = %correlation_id,
                    tenant_id = %tenant_id,
                    psid = %event.psid,
                    error = %error,
                    "reply could not be delivered"
                );
            }
        }
    }

    info!(
        event_name = "webhook.delivery.completed",
        correlation_id = %correlation_id,
        tenant_id = %tenant_id,
        events = total,
        failed,
        "webhook delivery processed"
    );
    StatusCode::OK.into_response()
}

/// Only the user-safe message and the request id leave the process.
fn error_response(status: StatusCode, error: &InterfaceError) -> Response {
    let body = json!({"error": error.user_message(), "correlation_id": error.correlation_id()});
    (status, Json(body)).into_response()
}
