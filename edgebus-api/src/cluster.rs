use std::collections::HashMap;

use async_trait::async_trait;
use bollard::models::{
    EndpointSpec, EndpointSpecModeEnum, Limit, NetworkAttachmentConfig, ResourceObject,
    ServiceSpec, ServiceSpecMode, ServiceSpecModeReplicated, TaskSpec, TaskSpecContainerSpec,
    TaskSpecPlacement, TaskSpecResources, TaskSpecRestartPolicy,
    TaskSpecRestartPolicyConditionEnum,
};
use bollard::query_parameters::{
    InspectServiceOptions, ListNodesOptions, ListServicesOptions, ListTasksOptions,
    UpdateServiceOptions,
};
use bollard::Docker;
use edgebus_core::models::{
    ClusterSummary, NodeSummary, ServiceHandle, ServiceLaunchSpec, TaskSummary,
};
use edgebus_core::{Error, Result};
use tracing::{debug, info};

/// Truncate an id to the 12-character short form used in log and API output.
pub fn short_id(id: &str) -> &str {
    if id.len() > 12 {
        &id[..12]
    } else {
        id
    }
}

/// Capability surface over the container orchestrator. The driver holds no
/// state of its own; tracking which service backs which machine is the
/// container manager's job. Production runs the Swarm backend; tests run an
/// in-memory one.
#[async_trait]
pub trait ClusterDriver: Send + Sync {
    /// Deploy a service. Created workloads never restart on their own; the
    /// control plane is authoritative for what should be running.
    async fn create_service(&self, spec: &ServiceLaunchSpec) -> Result<ServiceHandle>;

    /// Remove a service by id. A missing service is a success.
    async fn delete_service(&self, service_id: &str) -> Result<()>;

    /// List services matching a `key=value` label selector.
    async fn list_services_by_label(&self, label: &str) -> Result<Vec<ServiceHandle>>;

    /// List the tasks belonging to a service.
    async fn list_tasks(&self, service_id: &str) -> Result<Vec<TaskSummary>>;

    /// List cluster nodes, optionally narrowed by a `key=value` node label.
    async fn list_nodes(&self, label: Option<&str>) -> Result<Vec<NodeSummary>>;

    /// Count of tasks with desired state `running` scheduled on a node.
    async fn running_tasks_on_node(&self, node_id: &str) -> Result<usize>;

    /// Cluster membership as seen from the local node.
    async fn cluster_info(&self) -> Result<ClusterSummary>;

    /// Resolve a node id to its hostname, falling back to the truncated id.
    async fn node_name(&self, node_id: &str) -> String;

    /// Set the replica count on a service.
    async fn scale_service(&self, service_id: &str, replicas: u64) -> Result<()>;
}

/// Docker Swarm backend.
pub struct SwarmCluster {
    client: Docker,
}

impl SwarmCluster {
    /// Connect to the Docker daemon and verify it is part of a swarm.
    pub async fn connect(docker_host: Option<&str>) -> Result<Self> {
        let client = match docker_host {
            Some(host) => Docker::connect_with_socket(host, 120, bollard::API_DEFAULT_VERSION),
            None => Docker::connect_with_local_defaults(),
        }
        .map_err(|e| Error::Cluster(format!("Failed to connect to Docker: {}", e)))?;

        let info = client
            .info()
            .await
            .map_err(|e| Error::Cluster(format!("Failed to query Docker info: {}", e)))?;

        let node_id = info
            .swarm
            .as_ref()
            .and_then(|s| s.node_id.clone())
            .unwrap_or_default();
        if node_id.is_empty() {
            return Err(Error::Cluster(
                "Docker is not in Swarm mode. Run 'docker swarm init' first.".to_string(),
            ));
        }

        info!(node.id = %short_id(&node_id), "Connected to Docker Swarm cluster");
        Ok(Self { client })
    }

    fn label_filter(label: &str) -> HashMap<String, Vec<String>> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![label.to_string()]);
        filters
    }
}

fn enum_str(value: impl std::fmt::Debug) -> String {
    format!("{:?}", value).to_lowercase()
}

#[async_trait]
impl ClusterDriver for SwarmCluster {
    async fn create_service(&self, spec: &ServiceLaunchSpec) -> Result<ServiceHandle> {
        let env: Vec<String> = spec
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let task_template = TaskSpec {
            container_spec: Some(TaskSpecContainerSpec {
                image: Some(spec.image.clone()),
                env: Some(env),
                ..Default::default()
            }),
            // Short-lived state workers: the control plane decides what runs
            restart_policy: Some(TaskSpecRestartPolicy {
                condition: Some(TaskSpecRestartPolicyConditionEnum::NONE),
                ..Default::default()
            }),
            placement: Some(TaskSpecPlacement {
                constraints: Some(spec.constraints.clone()),
                ..Default::default()
            }),
            resources: Some(TaskSpecResources {
                limits: Some(Limit {
                    nano_cpus: Some(spec.resources.cpu_limit),
                    memory_bytes: Some(spec.resources.memory_limit),
                    ..Default::default()
                }),
                reservations: Some(ResourceObject {
                    nano_cpus: Some(spec.resources.cpu_reservation),
                    memory_bytes: Some(spec.resources.memory_reservation),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        };

        let service_spec = ServiceSpec {
            name: Some(spec.name.clone()),
            labels: Some(spec.labels.clone()),
            task_template: Some(task_template),
            mode: Some(ServiceSpecMode {
                replicated: Some(ServiceSpecModeReplicated { replicas: Some(1) }),
                ..Default::default()
            }),
            networks: Some(vec![NetworkAttachmentConfig {
                target: Some(spec.network.clone()),
                ..Default::default()
            }]),
            endpoint_spec: Some(EndpointSpec {
                mode: Some(EndpointSpecModeEnum::VIP),
                ..Default::default()
            }),
            ..Default::default()
        };

        let created = self
            .client
            .create_service(service_spec, None)
            .await
            .map_err(|e| Error::Cluster(format!("Failed to create service {}: {}", spec.name, e)))?;

        let id = created.id.unwrap_or_default();
        debug!(service.name = %spec.name, service.id = %short_id(&id), "Created swarm service");
        Ok(ServiceHandle {
            id,
            name: spec.name.clone(),
        })
    }

    async fn delete_service(&self, service_id: &str) -> Result<()> {
        match self.client.delete_service(service_id).await {
            Ok(()) => {
                debug!(service.id = %short_id(service_id), "Removed service");
                Ok(())
            }
            Err(bollard::errors::Error::DockerResponseServerError {
                status_code: 404, ..
            }) => {
                debug!(service.id = %short_id(service_id), "Service not found (already removed)");
                Ok(())
            }
            Err(e) => Err(Error::Cluster(format!(
                "Failed to remove service {}: {}",
                short_id(service_id),
                e
            ))),
        }
    }

    async fn list_services_by_label(&self, label: &str) -> Result<Vec<ServiceHandle>> {
        let options = ListServicesOptions {
            filters: Some(Self::label_filter(label)),
            ..Default::default()
        };

        let services = self
            .client
            .list_services(Some(options))
            .await
            .map_err(|e| Error::Cluster(format!("Failed to list services: {}", e)))?;

        Ok(services
            .into_iter()
            .map(|s| ServiceHandle {
                name: s
                    .spec
                    .as_ref()
                    .and_then(|spec| spec.name.clone())
                    .unwrap_or_default(),
                id: s.id.unwrap_or_default(),
            })
            .collect())
    }

    async fn list_tasks(&self, service_id: &str) -> Result<Vec<TaskSummary>> {
        let mut filters = HashMap::new();
        filters.insert("service".to_string(), vec![service_id.to_string()]);

        let tasks = self
            .client
            .list_tasks(Some(ListTasksOptions {
                filters: Some(filters),
                ..Default::default()
            }))
            .await
            .map_err(|e| {
                Error::Cluster(format!(
                    "Failed to list tasks of service {}: {}",
                    short_id(service_id),
                    e
                ))
            })?;

        Ok(tasks
            .into_iter()
            .map(|t| TaskSummary {
                id: t.id.unwrap_or_default(),
                state: t
                    .status
                    .as_ref()
                    .and_then(|s| s.state.as_ref())
                    .map(enum_str)
                    .unwrap_or_else(|| "unknown".to_string()),
                desired_state: t
                    .desired_state
                    .as_ref()
                    .map(enum_str)
                    .unwrap_or_else(|| "unknown".to_string()),
                node_id: t.node_id.unwrap_or_default(),
            })
            .collect())
    }

    async fn list_nodes(&self, label: Option<&str>) -> Result<Vec<NodeSummary>> {
        let mut filters = HashMap::new();
        if let Some(label) = label {
            filters.insert("node.label".to_string(), vec![label.to_string()]);
        }

        let nodes = self
            .client
            .list_nodes(Some(ListNodesOptions {
                filters: Some(filters),
                ..Default::default()
            }))
            .await
            .map_err(|e| Error::Cluster(format!("Failed to list nodes: {}", e)))?;

        Ok(nodes
            .into_iter()
            .map(|n| {
                let id = n.id.unwrap_or_default();
                let description = n.description.as_ref();
                let resources = description.and_then(|d| d.resources.as_ref());
                let spec = n.spec.as_ref();
                NodeSummary {
                    hostname: description
                        .and_then(|d| d.hostname.clone())
                        .unwrap_or_else(|| short_id(&id).to_string()),
                    state: n
                        .status
                        .as_ref()
                        .and_then(|s| s.state.as_ref())
                        .map(enum_str)
                        .unwrap_or_else(|| "unknown".to_string()),
                    availability: spec
                        .and_then(|s| s.availability.as_ref())
                        .map(enum_str)
                        .unwrap_or_else(|| "unknown".to_string()),
                    nano_cpus: resources.and_then(|r| r.nano_cpus).unwrap_or(0),
                    memory_bytes: resources.and_then(|r| r.memory_bytes).unwrap_or(0),
                    labels: spec.and_then(|s| s.labels.clone()).unwrap_or_default(),
                    id,
                }
            })
            .collect())
    }

    async fn running_tasks_on_node(&self, node_id: &str) -> Result<usize> {
        let mut filters = HashMap::new();
        filters.insert("node".to_string(), vec![node_id.to_string()]);
        filters.insert("desired-state".to_string(), vec!["running".to_string()]);

        let tasks = self
            .client
            .list_tasks(Some(ListTasksOptions {
                filters: Some(filters),
                ..Default::default()
            }))
            .await
            .map_err(|e| {
                Error::Cluster(format!(
                    "Failed to list tasks on node {}: {}",
                    short_id(node_id),
                    e
                ))
            })?;

        Ok(tasks.len())
    }

    async fn cluster_info(&self) -> Result<ClusterSummary> {
        let info = self
            .client
            .info()
            .await
            .map_err(|e| Error::Cluster(format!("Failed to query swarm info: {}", e)))?;

        let swarm = info.swarm.unwrap_or_default();
        Ok(ClusterSummary {
            node_id: swarm.node_id.unwrap_or_else(|| "unknown".to_string()),
            node_addr: swarm.node_addr.unwrap_or_else(|| "unknown".to_string()),
            local_node_state: swarm
                .local_node_state
                .as_ref()
                .map(enum_str)
                .unwrap_or_else(|| "unknown".to_string()),
            control_available: swarm.control_available.unwrap_or(false),
            managers: swarm.managers.unwrap_or(0),
            nodes: swarm.nodes.unwrap_or(0),
        })
    }

    async fn node_name(&self, node_id: &str) -> String {
        match self.client.inspect_node(node_id).await {
            Ok(node) => node
                .description
                .and_then(|d| d.hostname)
                .unwrap_or_else(|| short_id(node_id).to_string()),
            Err(_) => short_id(node_id).to_string(),
        }
    }

    async fn scale_service(&self, service_id: &str, replicas: u64) -> Result<()> {
        let service = self
            .client
            .inspect_service(service_id, None::<InspectServiceOptions>)
            .await
            .map_err(|e| {
                Error::Cluster(format!(
                    "Failed to inspect service {}: {}",
                    short_id(service_id),
                    e
                ))
            })?;

        let version = service
            .version
            .as_ref()
            .and_then(|v| v.index)
            .unwrap_or_default();
        let mut spec = service.spec.unwrap_or_default();
        spec.mode = Some(ServiceSpecMode {
            replicated: Some(ServiceSpecModeReplicated {
                replicas: Some(replicas as i64),
            }),
            ..Default::default()
        });

        self.client
            .update_service(
                service_id,
                spec,
                UpdateServiceOptions {
                    version: version as i32,
                    ..Default::default()
                },
                None,
            )
            .await
            .map_err(|e| {
                Error::Cluster(format!(
                    "Failed to scale service {}: {}",
                    short_id(service_id),
                    e
                ))
            })?;
        Ok(())
    }
}
