use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all gateway endpoints.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(handler::health_handler))
        .route(
            "/object/",
            get(handler::missing_id_handler).put(handler::missing_id_handler),
        )
        .route(
            "/object/:id",
            get(handler::get_object).put(handler::put_object),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::new()),
        )
        .with_state(state)
}
