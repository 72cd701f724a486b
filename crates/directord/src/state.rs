//! Shared state of the HTTP gateway.

use director_api::{AdminService, ApiError};

use crate::metrics::Metrics;

/// State handed to every request handler.
pub struct AppState {
    /// The admin facade.
    pub service: AdminService,
    /// Present when `metrics/enable` is set.
    pub metrics: Option<Metrics>,
}

impl AppState {
    /// Build the state.
    #[must_use]
    pub fn new(service: AdminService, metrics: Option<Metrics>) -> Self {
        Self { service, metrics }
    }

    /// Count one finished RPC when metrics are enabled.
    pub fn observe_rpc<T>(&self, method: &str, result: &Result<T, ApiError>) {
        let Some(metrics) = &self.metrics else { return };
        let outcome = match result {
            Ok(_) => "ok",
            Err(ApiError::InvalidArgument { .. }) => "invalid_argument",
            Err(ApiError::NotFound(_)) => "not_found",
            Err(ApiError::Canceled) => "canceled",
            Err(ApiError::DeadlineExceeded) => "deadline_exceeded",
            Err(ApiError::Internal(_)) => "internal",
        };
        metrics.observe_rpc(method, outcome);
    }
}
