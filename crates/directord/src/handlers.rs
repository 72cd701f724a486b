//! HTTP request handlers for the admin API.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use director_api::{ApiError, CallContext};
use director_proto::messages as msg;
use serde_json::json;

use crate::state::AppState;

/// [`ApiError`] carried through axum.
#[derive(Debug)]
pub struct HttpError(pub ApiError);

impl From<ApiError> for HttpError {
    fn from(err: ApiError) -> Self {
        Self(err)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, code) = match &self.0 {
            ApiError::InvalidArgument { .. } => (StatusCode::BAD_REQUEST, "invalid_argument"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            // client-went-away, nginx convention
            ApiError::Canceled => (
                StatusCode::from_u16(499).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
                "canceled",
            ),
            ApiError::DeadlineExceeded => (StatusCode::GATEWAY_TIMEOUT, "deadline_exceeded"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        let details = match &self.0 {
            ApiError::InvalidArgument { details, .. } => details.clone(),
            _ => None,
        };
        let body = json!({
            "code": code,
            "message": self.0.to_string(),
            "details": details,
        });
        (status, Json(body)).into_response()
    }
}

/// `GET /healthz`.
pub async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

/// `GET /metrics`.
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> Response {
    match &state.metrics {
        Some(metrics) => metrics.encode().into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// `POST /v2/ipvs/virtual-server/find`.
pub async fn find_virtual_server(
    State(state): State<Arc<AppState>>,
    Json(req): Json<msg::FindVirtualServerRequest>,
) -> Result<Json<msg::FindVirtualServerResponse>, HttpError> {
    let ctx = CallContext::new();
    let result = state
        .service
        .find_virtual_server(&ctx, &req.virtual_server_identity, req.include_reals)
        .await;
    state.observe_rpc("find_virtual_server", &result);
    result.map(Json).map_err(HttpError)
}

/// `POST /v2/ipvs/virtual-servers/list`.
pub async fn list_virtual_servers(
    State(state): State<Arc<AppState>>,
    Json(req): Json<msg::ListVirtualServersRequest>,
) -> Result<Json<msg::ListVirtualServersResponse>, HttpError> {
    let ctx = CallContext::new();
    let result = state
        .service
        .list_virtual_servers(&ctx, req.include_reals)
        .await;
    state.observe_rpc("list_virtual_servers", &result);
    result.map(Json).map_err(HttpError)
}

/// `POST /v2/ipvs/virtual-servers/update`.
pub async fn update_virtual_servers(
    State(state): State<Arc<AppState>>,
    Json(req): Json<msg::UpdateVirtualServersRequest>,
) -> Result<Json<msg::UpdateVirtualServersResponse>, HttpError> {
    let ctx = CallContext::new();
    if let Some(metrics) = &state.metrics {
        metrics.mutation_started();
    }
    let result = state.service.update_virtual_servers(&ctx, req).await;
    if let Some(metrics) = &state.metrics {
        metrics.mutation_finished();
    }
    state.observe_rpc("update_virtual_servers", &result);
    result.map(Json).map_err(HttpError)
}

/// `POST /v2/ipvs/real-servers/update`.
pub async fn update_real_servers(
    State(state): State<Arc<AppState>>,
    Json(req): Json<msg::UpdateRealServersRequest>,
) -> Result<Json<msg::UpdateRealServersResponse>, HttpError> {
    let ctx = CallContext::new();
    if let Some(metrics) = &state.metrics {
        metrics.mutation_started();
    }
    let result = state.service.update_real_servers(&ctx, req).await;
    if let Some(metrics) = &state.metrics {
        metrics.mutation_finished();
    }
    state.observe_rpc("update_real_servers", &result);
    result.map(Json).map_err(HttpError)
}
