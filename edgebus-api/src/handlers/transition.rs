use std::collections::{HashSet, VecDeque};

use axum::{extract::State, Json};
use edgebus_core::models::{Event, TransitionRequest, TransitionResponse};
use edgebus_core::Error as CoreError;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::state::AppState;

/// `POST /transition`: the critical path. The source transition executes
/// strictly (invalid requests surface to the caller); triggered events then
/// fan out to target machines through a worklist, each target re-entering
/// the same execute-swap-evaluate sequence under its own lock.
pub async fn process_transition(
    State(state): State<AppState>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<TransitionResponse>> {
    let outcome = execute_one(&state, &req.machine_id, &req.transition_name, &req.event_data)
        .await
        .map_err(|e| {
            if matches!(e, CoreError::InvalidTransition { .. }) {
                warn!(
                    machine.id = %req.machine_id,
                    transition = %req.transition_name,
                    error = %e,
                    "Rejected transition"
                );
            } else {
                error!(
                    machine.id = %req.machine_id,
                    transition = %req.transition_name,
                    error = %e,
                    "Transition failed"
                );
            }
            e
        })?;

    let response = TransitionResponse {
        status: "success".to_string(),
        machine_id: req.machine_id.clone(),
        old_state: outcome.old_state,
        new_state: outcome.new_state,
        triggered_events: outcome.events.len(),
    };

    // Fan out with the source lock already released. The visited set bounds
    // rule cycles; events a target cannot handle are dropped with a warning.
    let mut visited: HashSet<(String, String)> = HashSet::new();
    visited.insert((req.machine_id, req.transition_name));
    let mut queue: VecDeque<(String, Event)> = outcome.events.into();

    while let Some((target_machine, event)) = queue.pop_front() {
        let transition_name = {
            let registry = state.registry.read().unwrap();
            match registry.machine(&target_machine) {
                Ok(machine) => match machine.transition_for_event(&event.name) {
                    Some(transition) => Some(transition.name.clone()),
                    None => {
                        warn!(
                            machine.id = %target_machine,
                            event.name = %event.name,
                            current_state = %machine.current_state().name,
                            "Machine cannot handle event"
                        );
                        None
                    }
                },
                Err(_) => {
                    warn!(
                        machine.id = %target_machine,
                        event.name = %event.name,
                        "Event targets unknown machine"
                    );
                    None
                }
            }
        };
        let Some(transition_name) = transition_name else {
            continue;
        };

        if !visited.insert((target_machine.clone(), transition_name.clone())) {
            warn!(
                machine.id = %target_machine,
                transition = %transition_name,
                "Rule cycle detected, dropping event"
            );
            continue;
        }

        match execute_one(&state, &target_machine, &transition_name, &event.data).await {
            Ok(next) => {
                info!(
                    machine.id = %target_machine,
                    event.name = %event.name,
                    "Event delivered"
                );
                queue.extend(next.events);
            }
            Err(e) => {
                error!(
                    machine.id = %target_machine,
                    event.name = %event.name,
                    error = %e,
                    "Failed to deliver event"
                );
            }
        }
    }

    Ok(Json(response))
}

struct TransitionOutcome {
    old_state: String,
    new_state: String,
    events: Vec<(String, Event)>,
}

/// One machine's transition under its lock: guarded registry execute, service
/// swap, rules evaluation. The returned events are dispatched by the caller
/// after the lock is released, so cross-machine fan-out cannot deadlock.
async fn execute_one(
    state: &AppState,
    machine_id: &str,
    transition_name: &str,
    event_data: &Value,
) -> std::result::Result<TransitionOutcome, CoreError> {
    let lock = state
        .machine_lock(machine_id)
        .ok_or_else(|| CoreError::UnknownMachine(machine_id.to_string()))?;
    let _guard = lock.lock().await;

    let (old_state, new_state) = {
        let mut registry = state.registry.write().unwrap();
        {
            let machine = registry.machine(machine_id)?;
            info!(
                machine.id = %machine_id,
                transition = %transition_name,
                current_state = %machine.current_state().name,
                "Attempting transition"
            );
        }
        registry.execute(machine_id, transition_name)?
    };

    // The registry has committed. A failed swap leaves the model ahead of the
    // cluster; /status exposes the drift through container_status.
    if let Err(e) = state
        .manager
        .transition(machine_id, &old_state, &new_state)
        .await
    {
        error!(
            machine.id = %machine_id,
            old_state = %old_state.name,
            new_state = %new_state.name,
            error = %e,
            "Service swap failed after registry commit"
        );
    }

    let events = state
        .rules
        .triggered_events(machine_id, transition_name, event_data);

    info!(
        machine.id = %machine_id,
        old_state = %old_state.name,
        new_state = %new_state.name,
        triggered_events = events.len(),
        "Transition complete"
    );

    Ok(TransitionOutcome {
        old_state: old_state.name,
        new_state: new_state.name,
        events,
    })
}
