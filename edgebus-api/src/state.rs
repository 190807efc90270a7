use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use edgebus_core::Result;
use tokio::sync::Mutex;
use tracing::info;

use crate::cluster::ClusterDriver;
use crate::config::Config;
use crate::manager::{ContainerManager, ManagerSettings};
use crate::registry::Registry;
use crate::rules::RulesEngine;

/// Shared context for all request handlers. The registry and rules load once
/// at startup; per-machine mutexes serialize each machine's transition
/// critical section.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub registry: Arc<RwLock<Registry>>,
    pub rules: Arc<RulesEngine>,
    pub manager: ContainerManager,
    machine_locks: Arc<HashMap<String, Arc<Mutex<()>>>>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Config, cluster: Arc<dyn ClusterDriver>) -> Result<Self> {
        let registry = Registry::load(Path::new(&config.config_dir))?;
        let rules = RulesEngine::load(Path::new(&config.rules_path));

        let machine_locks: HashMap<String, Arc<Mutex<()>>> = registry
            .machine_ids()
            .into_iter()
            .map(|id| (id, Arc::new(Mutex::new(()))))
            .collect();

        let manager = ContainerManager::new(cluster, ManagerSettings::from_config(&config));

        Ok(Self {
            config,
            registry: Arc::new(RwLock::new(registry)),
            rules: Arc::new(rules),
            manager,
            machine_locks: Arc::new(machine_locks),
            start_time: Instant::now(),
        })
    }

    /// The per-machine transition lock. Machines are fixed at load time, so a
    /// missing entry means an unknown machine.
    pub fn machine_lock(&self, machine_id: &str) -> Option<Arc<Mutex<()>>> {
        self.machine_locks.get(machine_id).cloned()
    }

    /// Launch the container backing each machine's initial state. Part of the
    /// startup contract: a machine is born with its state materialized.
    pub async fn launch_initial_states(&self) -> Result<()> {
        let initial: Vec<(String, String, String)> = {
            let registry = self.registry.read().unwrap();
            registry
                .machine_ids()
                .into_iter()
                .map(|machine_id| {
                    let machine = registry.machine(&machine_id)?;
                    let state = machine.current_state();
                    Ok((
                        machine_id.clone(),
                        state.name.clone(),
                        state.container_image.clone(),
                    ))
                })
                .collect::<Result<_>>()?
        };

        for (machine_id, state_name, image) in initial {
            info!(
                machine.id = %machine_id,
                state.name = %state_name,
                "Launching initial state workload"
            );
            self.manager.start(&machine_id, &state_name, &image).await?;
        }
        Ok(())
    }
}
