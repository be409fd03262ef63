use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::require_bearer_token;
use crate::handlers;
use crate::state::AppState;

/// Builds the ingestion server's `Router` (§4.7). Authenticated routes sit
/// behind `require_bearer_token`; read-only and liveness routes stay public.
pub fn build_app(state: AppState, cors: CorsLayer) -> Router {
    let authenticated = Router::new()
        .route("/api/v1/tests/keepalive", post(handlers::post_keepalive))
        .route("/api/v1/tests/:run_id/progress", post(handlers::post_progress))
        .route("/api/v1/tests/:run_id/complete", post(handlers::post_complete))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_bearer_token));

    let public = Router::new()
        .route("/api/v1/tests/:run_id", get(handlers::get_test))
        .route("/api/v1/tests", get(handlers::list_tests))
        .route("/api/v1/events", get(handlers::sse_events))
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics));

    authenticated
        .merge(public)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Builds a `CorsLayer` from `--cors-origins`. An empty or `*` list allows any
/// origin; otherwise only the listed origins are permitted.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let parsed: Vec<_> = origins
        .iter()
        .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
        .collect();

    CorsLayer::new().allow_origin(AllowOrigin::list(parsed)).allow_methods(tower_http::cors::Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::json;
    use syncoor_store::SSEHub;
    use syncoor_store::TestStore;
    use tower::util::ServiceExt;

    const TEST_TOKEN: &str = "test-token";

    fn test_app(auth_token: Option<Arc<String>>) -> Router {
        let hub = Arc::new(SSEHub::new());
        let store = Arc::new(TestStore::new(hub.clone()));
        let state = AppState { store, hub, auth_token };
        build_app(state, cors_layer(&[]))
    }

    fn authed(req: axum::http::request::Builder) -> axum::http::request::Builder {
        req.header("Authorization", format!("Bearer {}", TEST_TOKEN))
    }

    fn keepalive_body(run_id: &str) -> serde_json::Value {
        json!({
            "run_id": run_id,
            "timestamp": 1_000,
            "network": "hoodi",
            "labels": {},
            "el_client": { "type": "geth", "image": "geth:latest", "extra_args": [], "env_vars": {} },
            "cl_client": { "type": "teku", "image": "teku:latest", "extra_args": [], "env_vars": {} },
            "enclave_name": "enc-1",
        })
    }

    #[tokio::test]
    async fn health_is_public_and_returns_200() {
        let app = test_app(Some(Arc::new(TEST_TOKEN.to_string())));
        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn keepalive_without_token_returns_401_when_configured() {
        let app = test_app(Some(Arc::new(TEST_TOKEN.to_string())));
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/tests/keepalive")
                    .header("content-type", "application/json")
                    .body(Body::from(keepalive_body("run-1").to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn keepalive_open_when_no_token_configured() {
        let app = test_app(None);
        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/tests/keepalive")
                    .header("content-type", "application/json")
                    .body(Body::from(keepalive_body("run-1").to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    #[tokio::test]
    async fn keepalive_then_get_detail_round_trips() {
        let app = test_app(None);
        let resp = app
            .clone()
            .oneshot(
                authed(
                    Request::builder()
                        .method("POST")
                        .uri("/api/v1/tests/keepalive")
                        .header("content-type", "application/json"),
                )
                .body(Body::from(keepalive_body("run-2").to_string()))
                .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = app
            .oneshot(Request::builder().uri("/api/v1/tests/run-2").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_test_detail_returns_404() {
        let app = test_app(None);
        let resp = app
            .oneshot(
                Request::builder().uri("/api/v1/tests/nonexistent").body(Body::empty()).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn list_tests_returns_200() {
        let app = test_app(None);
        let resp = app
            .oneshot(Request::builder().uri("/api/v1/tests").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn sse_events_endpoint_is_reachable() {
        let app = test_app(None);
        let resp = app
            .oneshot(Request::builder().uri("/api/v1/events").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
}
