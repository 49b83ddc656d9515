use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router with the object API and health probes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/store",
            get(handler::get_handler)
                .put(handler::put_handler)
                .delete(handler::delete_handler),
        )
        .route("/liveness", get(handler::liveness_handler))
        .route("/readiness", get(handler::readiness_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
