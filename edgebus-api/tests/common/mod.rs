#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use edgebus_api::cluster::ClusterDriver;
use edgebus_api::{create_app, AppState, Config};
use edgebus_core::models::{
    ClusterSummary, NodeSummary, ResourceLimits, ServiceHandle, ServiceLaunchSpec, TaskSummary,
};
use edgebus_core::Result;
use tempfile::TempDir;
use tokio::net::TcpListener;

pub const DETECTOR_CONFIG: &str = r#"
states:
  capturing:
    container_image: registry.local/capture:latest
  processing:
    container_image: registry.local/process:latest
transitions:
  - name: image_captured
    from_state: capturing
    to_state: processing
  - name: person_detected
    from_state: processing
    to_state: capturing
  - name: processing_complete
    from_state: processing
    to_state: capturing
initial_state: capturing
"#;

pub const SURVEILLANCE_CONFIG: &str = r#"
states:
  disarmed:
    container_image: registry.local/disarmed:latest
  analyzing:
    container_image: registry.local/analyze:latest
  alarm:
    container_image: registry.local/alarm:latest
transitions:
  - name: foundPersons
    from_state: disarmed
    to_state: analyzing
    trigger_event: foundPersons
  - name: threat_detected
    from_state: analyzing
    to_state: alarm
  - name: no_threat
    from_state: analyzing
    to_state: disarmed
  - name: disarm_alarm
    from_state: alarm
    to_state: disarmed
initial_state: disarmed
"#;

pub const RULES: &str = r#"
rules:
  - source_machine: detector
    source_transition: person_detected
    target_machine: surveillance
    target_event: foundPersons
"#;

pub const GATED_RULES: &str = r#"
rules:
  - source_machine: detector
    source_transition: person_detected
    target_machine: surveillance
    target_event: foundPersons
    conditions:
      confidence: ">0.8"
"#;

struct FakeService {
    name: String,
    image: String,
    labels: HashMap<String, String>,
    env: HashMap<String, String>,
    replicas: u64,
}

/// In-memory cluster backend satisfying the driver contract. One edge node;
/// every service task is immediately running.
#[derive(Default)]
pub struct FakeCluster {
    inner: Mutex<FakeClusterInner>,
}

#[derive(Default)]
struct FakeClusterInner {
    next_id: u64,
    services: HashMap<String, FakeService>,
}

impl FakeCluster {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn service_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .lock()
            .unwrap()
            .services
            .values()
            .map(|s| s.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn service_env(&self, name: &str) -> Option<HashMap<String, String>> {
        self.inner
            .lock()
            .unwrap()
            .services
            .values()
            .find(|s| s.name == name)
            .map(|s| s.env.clone())
    }

    /// Plant a service the manager does not track, as a straggler.
    pub fn seed_service(&self, name: &str, labels: &[(&str, &str)]) {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = format!("fakesvc{:017}", inner.next_id);
        inner.services.insert(
            id,
            FakeService {
                name: name.to_string(),
                image: "registry.local/straggler:latest".to_string(),
                labels: labels
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                env: HashMap::new(),
                replicas: 1,
            },
        );
    }

    /// Remove a service behind the manager's back.
    pub fn drop_service(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.services.retain(|_, s| s.name != name);
    }
}

fn label_matches(labels: &HashMap<String, String>, selector: &str) -> bool {
    match selector.split_once('=') {
        Some((key, value)) => labels.get(key).map(String::as_str) == Some(value),
        None => labels.contains_key(selector),
    }
}

#[async_trait]
impl ClusterDriver for FakeCluster {
    async fn create_service(&self, spec: &ServiceLaunchSpec) -> Result<ServiceHandle> {
        let mut inner = self.inner.lock().unwrap();
        inner.next_id += 1;
        let id = format!("fakesvc{:017}", inner.next_id);
        inner.services.insert(
            id.clone(),
            FakeService {
                name: spec.name.clone(),
                image: spec.image.clone(),
                labels: spec.labels.clone(),
                env: spec.env.clone(),
                replicas: 1,
            },
        );
        Ok(ServiceHandle {
            id,
            name: spec.name.clone(),
        })
    }

    async fn delete_service(&self, service_id: &str) -> Result<()> {
        self.inner.lock().unwrap().services.remove(service_id);
        Ok(())
    }

    async fn list_services_by_label(&self, label: &str) -> Result<Vec<ServiceHandle>> {
        let inner = self.inner.lock().unwrap();
        let mut handles: Vec<ServiceHandle> = inner
            .services
            .iter()
            .filter(|(_, s)| label_matches(&s.labels, label))
            .map(|(id, s)| ServiceHandle {
                id: id.clone(),
                name: s.name.clone(),
            })
            .collect();
        handles.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(handles)
    }

    async fn list_tasks(&self, service_id: &str) -> Result<Vec<TaskSummary>> {
        let inner = self.inner.lock().unwrap();
        let Some(service) = inner.services.get(service_id) else {
            return Ok(Vec::new());
        };
        Ok((0..service.replicas)
            .map(|slot| TaskSummary {
                id: format!("{}-task-{}", service_id, slot),
                state: "running".to_string(),
                desired_state: "running".to_string(),
                node_id: "fakenode0000000000000001".to_string(),
            })
            .collect())
    }

    async fn list_nodes(&self, label: Option<&str>) -> Result<Vec<NodeSummary>> {
        let mut labels = HashMap::new();
        labels.insert("role".to_string(), "edge".to_string());
        if let Some(selector) = label {
            if !label_matches(&labels, selector) {
                return Ok(Vec::new());
            }
        }
        Ok(vec![NodeSummary {
            id: "fakenode0000000000000001".to_string(),
            hostname: "edge-node-1".to_string(),
            state: "ready".to_string(),
            availability: "active".to_string(),
            nano_cpus: 4_000_000_000,
            memory_bytes: 8 * 1024 * 1024 * 1024,
            labels,
        }])
    }

    async fn running_tasks_on_node(&self, _node_id: &str) -> Result<usize> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.services.values().map(|s| s.replicas as usize).sum())
    }

    async fn cluster_info(&self) -> Result<ClusterSummary> {
        Ok(ClusterSummary {
            node_id: "fakenode0000000000000001".to_string(),
            node_addr: "10.0.0.1".to_string(),
            local_node_state: "active".to_string(),
            control_available: true,
            managers: 1,
            nodes: 2,
        })
    }

    async fn node_name(&self, _node_id: &str) -> String {
        "edge-node-1".to_string()
    }

    async fn scale_service(&self, service_id: &str, replicas: u64) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.services.get_mut(service_id) {
            Some(service) => {
                service.replicas = replicas;
                Ok(())
            }
            None => Err(edgebus_core::Error::Cluster(format!(
                "service {} not found",
                service_id
            ))),
        }
    }
}

/// Test configuration with ephemeral ports and no delays
pub fn test_config(config_dir: &Path) -> Config {
    Config {
        port: 0,
        docker_host: None,
        log_format: "human".to_string(),
        log_level: "info".to_string(),
        config_dir: config_dir.to_string_lossy().to_string(),
        rules_path: config_dir
            .join("transition-rules.yaml")
            .to_string_lossy()
            .to_string(),
        app_label: "edge-surveillance".to_string(),
        network: "edge-surveillance-network".to_string(),
        event_bus_url: "http://event-bus:5000".to_string(),
        resources: ResourceLimits::default(),
        readiness_timeout_secs: 2,
        readiness_poll_secs: 1,
        settle_delay_secs: 0,
        request_deadline_secs: 30,
    }
}

pub struct TestHarness {
    pub url: String,
    pub state: AppState,
    pub cluster: Arc<FakeCluster>,
    _config_dir: TempDir,
    _server: tokio::task::JoinHandle<()>,
}

/// Start a test server on the two-machine fixture with the default rules.
pub async fn start_test_server() -> TestHarness {
    start_test_server_with_rules(RULES).await
}

/// Start a test server with a specific rules document.
pub async fn start_test_server_with_rules(rules: &str) -> TestHarness {
    let config_dir = TempDir::new().expect("Failed to create config dir");
    std::fs::write(config_dir.path().join("detector-config.yaml"), DETECTOR_CONFIG)
        .expect("Failed to write detector config");
    std::fs::write(
        config_dir.path().join("surveillance-config.yaml"),
        SURVEILLANCE_CONFIG,
    )
    .expect("Failed to write surveillance config");
    std::fs::write(config_dir.path().join("transition-rules.yaml"), rules)
        .expect("Failed to write rules");

    let config = test_config(config_dir.path());
    let cluster = FakeCluster::new();
    let state =
        AppState::new(config, cluster.clone()).expect("Failed to build app state");
    state
        .launch_initial_states()
        .await
        .expect("Failed to launch initial states");

    let app = create_app(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to port");
    let port = listener.local_addr().unwrap().port();
    let url = format!("http://127.0.0.1:{}", port);

    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    TestHarness {
        url,
        state,
        cluster,
        _config_dir: config_dir,
        _server: server,
    }
}

pub fn test_client() -> reqwest::Client {
    reqwest::Client::new()
}
