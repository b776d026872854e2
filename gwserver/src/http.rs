//! The agent-facing HTTP surface: `POST /mcp/{target}` and the
//! unauthenticated `GET /health` liveness probe. Mirrors the shape of the
//! teacher's `lexe-api/src/server.rs` (axum + axum-server + tower
//! middleware), generalized to this gateway's single route.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use gwcore::{audit::AuditRecord, error::RequestError, proto::ProxyRequest};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{audit::AuditSink, policy::PolicySet, supervisor::Supervisor, validator::TokenValidator};

pub struct GatewayState {
    pub validator: TokenValidator,
    pub policy: PolicySet,
    pub supervisor: Supervisor,
    pub audit: AuditSink,
}

pub fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/mcp/{target}", post(proxy_mcp))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Liveness probe. Never touches the validator, policy, or supervisor --
/// it is a process check, not an API call (spec.md §11).
async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn proxy_mcp(
    State(state): State<Arc<GatewayState>>,
    Path(target): Path<String>,
    headers: HeaderMap,
    Json(body): Json<ProxyRequest>,
) -> Response {
    let now = now_unix();

    let claims = match extract_bearer(&headers).and_then(|raw| {
        state
            .validator
            .validate(raw, now)
            .map_err(|_| RequestError::Auth("missing or invalid bearer token".to_owned()))
    }) {
        Ok(claims) => claims,
        Err(e) => return error_response(e),
    };

    let object = format!("backend_{target}");
    if !state.policy.allow(&claims.tenant, &object, "access") {
        state
            .audit
            .write(&AuditRecord::deny(
                now,
                &claims.tenant,
                &target,
                &body.method,
                body.params.clone(),
            ))
            .await;
        return error_response(RequestError::PolicyDenied);
    }

    match state
        .supervisor
        .call(&target, &body.method, body.params.clone())
        .await
    {
        Ok(result) => {
            state
                .audit
                .write(&AuditRecord::allow(
                    now,
                    &claims.tenant,
                    &target,
                    &body.method,
                    body.params,
                    "ok",
                ))
                .await;
            Json(json!({ "result": result })).into_response()
        }
        Err(e) => {
            state
                .audit
                .write(&AuditRecord::allow(
                    now,
                    &claims.tenant,
                    &target,
                    &body.method,
                    body.params,
                    e.to_string(),
                ))
                .await;
            error_response(e)
        }
    }
}

fn extract_bearer(headers: &HeaderMap) -> Result<&str, RequestError> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| RequestError::Auth("missing Authorization header".to_owned()))
}

/// Map a [`RequestError`] onto the HTTP response shape spec.md §6/§7
/// describes: the worker-error case is a 200 with an `error` body (it's a
/// protocol-level failure, not an HTTP-level one), everything else uses
/// `RequestError::http_status()`.
fn error_response(e: RequestError) -> Response {
    let status = StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": e.to_string() }))).into_response()
}

fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}
