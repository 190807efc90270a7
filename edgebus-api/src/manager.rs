use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use edgebus_core::models::{
    NodeStatus, ResourceLimits, ServiceHandle, ServiceLaunchSpec, ServiceStatus, State,
    SwarmStatus, TaskStatus,
};
use edgebus_core::{Error, Result};
use tracing::{error, info, warn};

use crate::cluster::{short_id, ClusterDriver};
use crate::config::Config;

/// Binds each machine's current state to exactly one live service on the
/// cluster. `active_services` tracks the service a machine currently owns;
/// any cluster service carrying a machine's label but missing from the map
/// is a straggler and gets force-removed before a new service is created.
#[derive(Clone)]
pub struct ContainerManager {
    cluster: Arc<dyn ClusterDriver>,
    active_services: Arc<RwLock<HashMap<String, ServiceHandle>>>,
    settings: ManagerSettings,
}

#[derive(Debug, Clone)]
pub struct ManagerSettings {
    pub app_label: String,
    pub network: String,
    pub event_bus_url: String,
    pub resources: ResourceLimits,
    pub readiness_timeout: Duration,
    pub readiness_poll: Duration,
    pub settle_delay: Duration,
}

impl ManagerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            app_label: config.app_label.clone(),
            network: config.network.clone(),
            event_bus_url: config.event_bus_url.clone(),
            resources: config.resources,
            readiness_timeout: Duration::from_secs(config.readiness_timeout_secs),
            readiness_poll: Duration::from_secs(config.readiness_poll_secs),
            settle_delay: Duration::from_secs(config.settle_delay_secs),
        }
    }
}

impl ContainerManager {
    pub fn new(cluster: Arc<dyn ClusterDriver>, settings: ManagerSettings) -> Self {
        Self {
            cluster,
            active_services: Arc::new(RwLock::new(HashMap::new())),
            settings,
        }
    }

    /// Deploy the service backing a state. Any service previously tracked for
    /// the machine, and any untracked service bearing its label, is removed
    /// first. Waits for a running task up to the readiness timeout; a timeout
    /// is logged, not an error, since the next transition replaces the
    /// service anyway.
    pub async fn start(&self, machine_id: &str, state_name: &str, image: &str) -> Result<String> {
        let service_name = format!("{}-{}", machine_id, state_name);

        self.force_stop_existing(machine_id).await;

        let spec = self.launch_spec(machine_id, state_name, image, &service_name);
        let handle = self.cluster.create_service(&spec).await.map_err(|e| {
            error!(
                machine.id = %machine_id,
                service.name = %service_name,
                error = %e,
                "Failed to create service"
            );
            e
        })?;

        info!(
            machine.id = %machine_id,
            service.name = %service_name,
            service.id = %short_id(&handle.id),
            "Created service"
        );

        self.active_services
            .write()
            .unwrap()
            .insert(machine_id.to_string(), handle.clone());

        self.wait_for_ready(&service_name, &handle.id).await;

        Ok(handle.id)
    }

    /// Force-stop the current service and deploy the one backing `new_state`,
    /// with a brief settle delay in between so cluster bookkeeping converges.
    pub async fn transition(
        &self,
        machine_id: &str,
        old_state: &State,
        new_state: &State,
    ) -> Result<String> {
        self.force_stop_existing(machine_id).await;

        tokio::time::sleep(self.settings.settle_delay).await;

        let service_id = self
            .start(machine_id, &new_state.name, &new_state.container_image)
            .await?;

        info!(
            machine.id = %machine_id,
            old_state = %old_state.name,
            new_state = %new_state.name,
            "Swapped state workload"
        );

        Ok(service_id)
    }

    /// Service status for a machine. When the tracked service no longer
    /// exists on the cluster, the tracking entry is dropped and `not_found`
    /// is reported.
    pub async fn status(&self, machine_id: &str) -> ServiceStatus {
        let handle = self.active_services.read().unwrap().get(machine_id).cloned();
        let Some(handle) = handle else {
            return ServiceStatus::bare("not_running");
        };

        let exists = match self
            .cluster
            .list_services_by_label(&format!("machine-id={}", machine_id))
            .await
        {
            Ok(services) => services.iter().any(|s| s.id == handle.id),
            Err(e) => return ServiceStatus::error(e.to_string()),
        };
        if !exists {
            self.active_services.write().unwrap().remove(machine_id);
            return ServiceStatus::bare("not_found");
        }

        let tasks = match self.cluster.list_tasks(&handle.id).await {
            Ok(tasks) => tasks,
            Err(e) => return ServiceStatus::error(e.to_string()),
        };

        let mut task_info = Vec::with_capacity(tasks.len());
        for task in &tasks {
            let node = self.cluster.node_name(&task.node_id).await;
            task_info.push(TaskStatus {
                id: short_id(&task.id).to_string(),
                state: task.state.clone(),
                node,
                desired_state: task.desired_state.clone(),
            });
        }

        let running = tasks.iter().filter(|t| t.state == "running").count();
        ServiceStatus {
            status: if running > 0 { "running" } else { "pending" }.to_string(),
            service_name: Some(handle.name.clone()),
            service_id: Some(short_id(&handle.id).to_string()),
            replicas: Some(tasks.len()),
            running_replicas: Some(running),
            tasks: Some(task_info),
            message: None,
        }
    }

    /// Resource view of every edge node, keyed by hostname.
    pub async fn node_resources(&self) -> Result<HashMap<String, NodeStatus>> {
        let nodes = self.cluster.list_nodes(Some("role=edge")).await?;

        let mut out = HashMap::new();
        for node in nodes {
            let running_tasks = match self.cluster.running_tasks_on_node(&node.id).await {
                Ok(count) => count,
                Err(e) => {
                    warn!(node.id = %short_id(&node.id), error = %e, "Failed to count node tasks");
                    0
                }
            };
            out.insert(
                node.hostname,
                NodeStatus {
                    node_id: short_id(&node.id).to_string(),
                    status: node.state,
                    availability: node.availability,
                    nano_cpus: node.nano_cpus,
                    memory_bytes: node.memory_bytes,
                    running_tasks,
                    labels: node.labels,
                },
            );
        }
        Ok(out)
    }

    /// Cluster membership summary for the `/swarm` view.
    pub async fn swarm_info(&self) -> Result<SwarmStatus> {
        let info = self.cluster.cluster_info().await?;
        Ok(SwarmStatus {
            node_id: short_id(&info.node_id).to_string(),
            node_addr: info.node_addr,
            local_node_state: info.local_node_state,
            control_available: info.control_available,
            managers: info.managers,
            nodes: info.nodes,
        })
    }

    /// Set the replica count on a machine's active service. Typically 1;
    /// higher values are permitted for load spreading.
    pub async fn scale(&self, machine_id: &str, replicas: u64) -> Result<()> {
        let handle = self.active_services.read().unwrap().get(machine_id).cloned();
        let handle = handle.ok_or_else(|| {
            Error::Internal(format!("No active service for machine '{}'", machine_id))
        })?;

        self.cluster.scale_service(&handle.id, replicas).await?;
        info!(
            machine.id = %machine_id,
            service.name = %handle.name,
            replicas,
            "Scaled service"
        );
        Ok(())
    }

    /// Remove every service bearing the application label, or only those of
    /// one machine. Idempotent: cleaning an already-clean machine succeeds.
    pub async fn cleanup(&self, machine_id: Option<&str>) -> Result<()> {
        let selector = match machine_id {
            Some(id) => format!("machine-id={}", id),
            None => format!("app={}", self.settings.app_label),
        };

        let services = self.cluster.list_services_by_label(&selector).await?;
        for service in services {
            info!(service.name = %service.name, "Cleaning up service");
            if let Err(e) = self.cluster.delete_service(&service.id).await {
                warn!(
                    service.name = %service.name,
                    error = %e,
                    "Failed to remove service during cleanup"
                );
            }
        }

        let mut tracked = self.active_services.write().unwrap();
        match machine_id {
            Some(id) => {
                tracked.remove(id);
            }
            None => tracked.clear(),
        }
        Ok(())
    }

    fn launch_spec(
        &self,
        machine_id: &str,
        state_name: &str,
        image: &str,
        service_name: &str,
    ) -> ServiceLaunchSpec {
        let mut env = HashMap::new();
        env.insert("MACHINE_ID".to_string(), machine_id.to_string());
        env.insert("STATE_NAME".to_string(), state_name.to_string());
        env.insert(
            "EVENT_BUS_URL".to_string(),
            self.settings.event_bus_url.clone(),
        );

        let mut labels = HashMap::new();
        labels.insert("machine-id".to_string(), machine_id.to_string());
        labels.insert("state".to_string(), state_name.to_string());
        labels.insert("app".to_string(), self.settings.app_label.clone());

        ServiceLaunchSpec {
            name: service_name.to_string(),
            image: image.to_string(),
            env,
            labels,
            resources: self.settings.resources,
            constraints: vec!["node.labels.role==edge".to_string()],
            network: self.settings.network.clone(),
        }
    }

    /// Remove the tracked service, then sweep the cluster by label for
    /// remnants. Failures are logged and swallowed so a start can proceed.
    async fn force_stop_existing(&self, machine_id: &str) {
        let tracked = self.active_services.write().unwrap().remove(machine_id);
        if let Some(handle) = tracked {
            if let Err(e) = self.cluster.delete_service(&handle.id).await {
                warn!(
                    machine.id = %machine_id,
                    service.id = %short_id(&handle.id),
                    error = %e,
                    "Failed to remove tracked service"
                );
            }
        }

        match self
            .cluster
            .list_services_by_label(&format!("machine-id={}", machine_id))
            .await
        {
            Ok(services) => {
                for service in services {
                    info!(
                        machine.id = %machine_id,
                        service.name = %service.name,
                        "Force stopping service"
                    );
                    if let Err(e) = self.cluster.delete_service(&service.id).await {
                        warn!(
                            machine.id = %machine_id,
                            service.name = %service.name,
                            error = %e,
                            "Failed to remove service"
                        );
                    }
                }
            }
            Err(e) => {
                warn!(machine.id = %machine_id, error = %e, "Error during force stop");
            }
        }
    }

    /// Poll task states until one is running or the deadline passes.
    async fn wait_for_ready(&self, service_name: &str, service_id: &str) {
        let deadline = tokio::time::Instant::now() + self.settings.readiness_timeout;

        loop {
            match self.cluster.list_tasks(service_id).await {
                Ok(tasks) => {
                    let running = tasks.iter().filter(|t| t.state == "running").count();
                    if running > 0 {
                        info!(
                            service.name = %service_name,
                            running_tasks = running,
                            "Service is ready"
                        );
                        return;
                    }
                }
                Err(e) => {
                    warn!(service.name = %service_name, error = %e, "Error checking service status");
                }
            }

            if tokio::time::Instant::now() >= deadline {
                warn!(
                    service.name = %service_name,
                    timeout_secs = self.settings.readiness_timeout.as_secs(),
                    "Service not ready before deadline"
                );
                return;
            }
            tokio::time::sleep(self.settings.readiness_poll).await;
        }
    }
}
