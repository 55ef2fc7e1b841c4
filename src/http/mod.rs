use axum::{
    middleware,
    routing::{any, get},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::shared::AppState;

// Public API
pub use auth::require_shared_secret;
pub use handlers::{post_message, welcome};
pub use types::PostMessageRequest;

// Internal modules
mod auth;
mod handlers;
mod types;

/// Builds the HTTP interface
///
/// `/post` accepts every method so unsupported ones get a descriptive 500
/// instead of a bare 405.
pub fn router(state: AppState) -> Router {
    let post_routes = Router::new()
        .route("/post", any(post_message))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_shared_secret,
        ));

    Router::new()
        .route("/", get(welcome))
        .merge(post_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
