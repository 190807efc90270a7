use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque handle to a deployed cluster service.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    pub id: String,
    pub name: String,
}

/// Everything the cluster needs to deploy one state workload.
#[derive(Debug, Clone)]
pub struct ServiceLaunchSpec {
    pub name: String,
    pub image: String,
    pub env: HashMap<String, String>,
    pub labels: HashMap<String, String>,
    pub resources: ResourceLimits,
    pub constraints: Vec<String>,
    pub network: String,
}

/// Per-service resource ceilings and reservations, in nano CPUs and bytes.
/// Reservations sit at roughly 20% of the limits.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub cpu_limit: i64,
    pub cpu_reservation: i64,
    pub memory_limit: i64,
    pub memory_reservation: i64,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            cpu_limit: 500_000_000,
            cpu_reservation: 100_000_000,
            memory_limit: 512 * 1024 * 1024,
            memory_reservation: 128 * 1024 * 1024,
        }
    }
}

/// One container instance of a service, as scheduled on a node.
#[derive(Debug, Clone)]
pub struct TaskSummary {
    pub id: String,
    pub state: String,
    pub desired_state: String,
    pub node_id: String,
}

/// A cluster node as reported by the orchestrator.
#[derive(Debug, Clone)]
pub struct NodeSummary {
    pub id: String,
    pub hostname: String,
    pub state: String,
    pub availability: String,
    pub nano_cpus: i64,
    pub memory_bytes: i64,
    pub labels: HashMap<String, String>,
}

/// Cluster membership as seen from the local node.
#[derive(Debug, Clone)]
pub struct ClusterSummary {
    pub node_id: String,
    pub node_addr: String,
    pub local_node_state: String,
    pub control_available: bool,
    pub managers: i64,
    pub nodes: i64,
}
