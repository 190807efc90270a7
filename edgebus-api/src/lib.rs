pub mod cluster;
pub mod config;
pub mod error;
pub mod handlers;
pub mod manager;
pub mod middleware;
pub mod registry;
pub mod rules;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

pub use config::Config;
pub use state::AppState;

/// Create the main application router
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .merge(handlers::routes())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::deadline::deadline_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
