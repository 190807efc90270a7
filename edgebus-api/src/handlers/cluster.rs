use std::collections::HashMap;

use axum::{extract::State, Json};
use edgebus_core::models::{NodeStatus, SwarmStatus};
use tracing::error;

use crate::error::Result;
use crate::state::AppState;

/// `GET /nodes`: resource view of every edge node, keyed by hostname.
pub async fn get_nodes(State(state): State<AppState>) -> Result<Json<HashMap<String, NodeStatus>>> {
    let nodes = state.manager.node_resources().await.map_err(|e| {
        error!(error = %e, "Failed to get node resources");
        e
    })?;
    Ok(Json(nodes))
}

/// `GET /swarm`: cluster membership as seen from the local node.
pub async fn get_swarm_info(State(state): State<AppState>) -> Result<Json<SwarmStatus>> {
    let info = state.manager.swarm_info().await.map_err(|e| {
        error!(error = %e, "Failed to get swarm info");
        e
    })?;
    Ok(Json(info))
}
