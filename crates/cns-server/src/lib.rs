//! HTTP server for the cloud-native store.
//!
//! Exposes the object service as a small JSON API:
//!
//! | Method & path | Body | Success |
//! |---|---|---|
//! | `PUT /api/v1/store` | `{"key": K, "value": V}` | `200 {}` |
//! | `GET /api/v1/store` | `{"key": K}` | `200 {"value": V}` |
//! | `DELETE /api/v1/store` | `{"key": K}` | `200 {}` |
//!
//! Malformed bodies answer 400, missing keys 404 and backend failures 500,
//! always with a `{"error": CODE}` body. `GET /liveness` and
//! `GET /readiness` serve as orchestration probes.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use error::{ApiError, ServerError, ServerResult};
pub use router::build_router;
pub use server::{shutdown_signal, CnsServer};
pub use state::AppState;

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Method, Request, StatusCode};
    use axum::Router;
    use cns_crypto::EncryptionKey;
    use cns_service::ObjectService;
    use cns_store::ShardedStore;
    use serde_json::Value;
    use tower::util::ServiceExt;

    use super::*;

    async fn app() -> (Router, Arc<ObjectService>) {
        let port = Arc::new(ShardedStore::new(NonZeroUsize::new(16).unwrap()));
        let service = Arc::new(ObjectService::builder(EncryptionKey::generate(), port).build().unwrap());
        service.setup().await.unwrap();
        (build_router(AppState::new(Arc::clone(&service))), service)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_owned()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    #[tokio::test]
    async fn put_get_delete_scenario() {
        let (app, _) = app().await;

        let (status, body) = send(&app, Method::PUT, "/api/v1/store", r#"{"key":"user:1","value":"alice"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({}));

        let (status, body) = send(&app, Method::GET, "/api/v1/store", r#"{"key":"user:1"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({ "value": "alice" }));

        let (status, body) = send(&app, Method::DELETE, "/api/v1/store", r#"{"key":"user:1"}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({}));

        let (status, body) = send(&app, Method::GET, "/api/v1/store", r#"{"key":"user:1"}"#).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({ "error": "NOT_FOUND" }));
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request_on_every_endpoint() {
        let (app, _) = app().await;
        for method in [Method::PUT, Method::GET, Method::DELETE] {
            let (status, body) = send(&app, method, "/api/v1/store", "{not json").await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, serde_json::json!({ "error": "BAD_REQUEST" }));
        }
    }

    #[tokio::test]
    async fn missing_fields_are_bad_request() {
        let (app, _) = app().await;
        let (status, _) = send(&app, Method::PUT, "/api/v1/store", r#"{"key":"k"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, Method::GET, "/api/v1/store", r#"{"value":"v"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn body_without_content_type_is_accepted() {
        let (app, _) = app().await;
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::PUT)
                    .uri("/api/v1/store")
                    .body(Body::from(r#"{"key":"k","value":"v"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn probes_follow_service_phase() {
        let port = Arc::new(ShardedStore::new(NonZeroUsize::new(1).unwrap()));
        let service = Arc::new(ObjectService::builder(EncryptionKey::generate(), port).build().unwrap());
        let app = build_router(AppState::new(Arc::clone(&service)));

        let (status, _) = send(&app, Method::GET, "/liveness", "").await;
        assert_eq!(status, StatusCode::OK);
        let (status, body) = send(&app, Method::GET, "/readiness", "").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, serde_json::json!({ "status": "recovering" }));

        let (status, _) = send(&app, Method::PUT, "/api/v1/store", r#"{"key":"k","value":"v"}"#).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        service.setup().await.unwrap();
        let (status, _) = send(&app, Method::GET, "/readiness", "").await;
        assert_eq!(status, StatusCode::OK);

        service.teardown().unwrap();
        let (status, body) = send(&app, Method::GET, "/readiness", "").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body, serde_json::json!({ "status": "closed" }));
    }
}
