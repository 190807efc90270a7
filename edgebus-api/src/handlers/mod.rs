use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

mod cluster;
mod health;
mod status;
mod transition;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/transition", post(transition::process_transition))
        .route("/status", get(status::get_status))
        .route("/nodes", get(cluster::get_nodes))
        .route("/swarm", get(cluster::get_swarm_info))
        .route("/health", get(health::health_check))
}
