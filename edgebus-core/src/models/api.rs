use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn empty_object() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Body of `POST /transition`, posted by state workers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRequest {
    pub machine_id: String,
    pub transition_name: String,
    #[serde(default = "empty_object")]
    pub event_data: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionResponse {
    pub status: String,
    pub machine_id: String,
    pub old_state: String,
    pub new_state: String,
    pub triggered_events: usize,
}

/// 400 body for a transition that is not enabled from the current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRejection {
    pub status: String,
    pub error: String,
    pub current_state: String,
    pub available_transitions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailableTransition {
    pub name: String,
    pub to_state: String,
    pub trigger_event: Option<String>,
}

/// Per-machine entry of `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineStatus {
    pub current_state: String,
    pub container_image: String,
    pub container_status: ServiceStatus,
    pub available_transitions: Vec<AvailableTransition>,
}

/// Container manager view of the service backing a machine's current state.
/// `status` is one of `running`, `pending`, `not_running`, `not_found` or
/// `error`; the detail fields are present only when a service is tracked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub running_replicas: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<TaskStatus>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServiceStatus {
    pub fn bare(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            service_name: None,
            service_id: None,
            replicas: None,
            running_replicas: None,
            tasks: None,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::bare("error")
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatus {
    pub id: String,
    pub state: String,
    pub node: String,
    pub desired_state: String,
}

/// Per-node entry of `GET /nodes`, keyed by hostname.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeStatus {
    pub node_id: String,
    pub status: String,
    pub availability: String,
    pub nano_cpus: i64,
    pub memory_bytes: i64,
    pub running_tasks: usize,
    pub labels: HashMap<String, String>,
}

/// Body of `GET /swarm`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwarmStatus {
    pub node_id: String,
    pub node_addr: String,
    pub local_node_state: String,
    pub control_available: bool,
    pub managers: i64,
    pub nodes: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime_seconds: u64,
}
