//! Route configuration for the admin API.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    find_virtual_server, get_metrics, healthz, list_virtual_servers, update_real_servers,
    update_virtual_servers,
};
use crate::state::AppState;

/// Create the gateway router. The `/metrics` route is mounted only when
/// the registry is enabled.
pub fn create_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/healthz", get(healthz))
        .route("/v2/ipvs/virtual-server/find", post(find_virtual_server))
        .route("/v2/ipvs/virtual-servers/list", post(list_virtual_servers))
        .route(
            "/v2/ipvs/virtual-servers/update",
            post(update_virtual_servers),
        )
        .route("/v2/ipvs/real-servers/update", post(update_real_servers));
    if state.metrics.is_some() {
        router = router.route("/metrics", get(get_metrics));
    }
    router
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use director_api::AdminService;
    use director_ipvs::FakeAdmin;
    use http_body_util::BodyExt;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use crate::metrics::Metrics;

    fn make_state(metrics: bool) -> Arc<AppState> {
        let service = AdminService::new(
            std::sync::Arc::new(FakeAdmin::new()),
            CancellationToken::new(),
        );
        Arc::new(AppState::new(service, metrics.then(Metrics::new)))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn healthz_responds_ok() {
        let router = create_router(make_state(false));
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/healthz")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn update_returns_issues_from_the_fake_driver() {
        let router = create_router(make_state(false));
        let response = router
            .oneshot(post_json(
                "/v2/ipvs/virtual-servers/update",
                r#"{"delete": [{"firewall_mark": 1}]}"#,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["issues"][0]["reason"]["code"], "Unsupported");
        assert_eq!(body["issues"][0]["when"]["delete"]["firewall_mark"], 1);
    }

    #[tokio::test]
    async fn invalid_payload_maps_to_bad_request() {
        let router = create_router(make_state(false));
        let response = router
            .oneshot(post_json(
                "/v2/ipvs/real-servers/update",
                r#"{"virtual_server_identity": {}}"#,
            ))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["code"], "invalid_argument");
        assert!(body["details"].is_object());
    }

    #[tokio::test]
    async fn listing_against_the_fake_driver_is_internal() {
        let router = create_router(make_state(false));
        let response = router
            .oneshot(post_json("/v2/ipvs/virtual-servers/list", r"{}"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn metrics_route_present_only_when_enabled() {
        let router = create_router(make_state(false));
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let router = create_router(make_state(true));
        let _ = router
            .clone()
            .oneshot(post_json("/v2/ipvs/virtual-servers/update", r"{}"))
            .await
            .expect("response");
        let response = router
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes();
        let text = String::from_utf8(bytes.to_vec()).expect("utf-8");
        assert!(text.contains("director_rpc_requests_total"));
    }
}
