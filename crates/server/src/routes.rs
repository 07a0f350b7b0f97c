//! Route configuration.

use crate::handlers;
use crate::metrics::metrics_handler;
use crate::state::AppState;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use tower_http::trace::TraceLayer;

/// Create the application router.
///
/// # Panics
///
/// Panics if `server.public_prefix` collides with another route; a prefix
/// that passes `ServerConfig::validate` never does.
pub fn create_router(state: AppState) -> Router {
    let blob_route = format!(
        "{}/{{storage_name}}",
        state.config.server.public_prefix.trim_end_matches('/')
    );

    let mut router = Router::new()
        .route("/", get(handlers::list_files))
        .route(
            "/upload",
            post(handlers::upload_file).layer(DefaultBodyLimit::max(state.body_limit())),
        )
        .route("/health", get(handlers::health_check))
        .route("/{id}", delete(handlers::delete_file))
        .route(&blob_route, get(handlers::get_blob));

    // Unauthenticated; restrict at the network level in public deployments.
    if state.config.server.metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}
