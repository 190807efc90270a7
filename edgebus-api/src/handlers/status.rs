use std::collections::HashMap;

use axum::{extract::State, Json};
use edgebus_core::models::{AvailableTransition, MachineStatus};

use crate::error::Result;
use crate::state::AppState;

/// `GET /status`: every machine's current state, backing image, service
/// status and the transitions enabled from that state.
pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, MachineStatus>>> {
    // Snapshot the registry before the (slow) cluster queries
    let snapshot: Vec<(String, String, String, Vec<AvailableTransition>)> = {
        let registry = state.registry.read().unwrap();
        let mut machines = Vec::new();
        for machine_id in registry.machine_ids() {
            let machine = registry.machine(&machine_id)?;
            let current = machine.current_state();
            let available = machine
                .available_transitions()
                .into_iter()
                .map(|t| AvailableTransition {
                    name: t.name.clone(),
                    to_state: t.to_state.clone(),
                    trigger_event: t.trigger_event.clone(),
                })
                .collect();
            machines.push((
                machine_id,
                current.name.clone(),
                current.container_image.clone(),
                available,
            ));
        }
        machines
    };

    let mut status = HashMap::new();
    for (machine_id, current_state, container_image, available_transitions) in snapshot {
        let container_status = state.manager.status(&machine_id).await;
        status.insert(
            machine_id,
            MachineStatus {
                current_state,
                container_image,
                container_status,
                available_transitions,
            },
        );
    }
    Ok(Json(status))
}
