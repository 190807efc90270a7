use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A declared state of a machine. The `container_image` backing the state is
/// opaque to the control plane; `active` and `activated_at` are derived at
/// runtime and at most one state per machine is active.
#[derive(Debug, Clone, Serialize)]
pub struct State {
    pub name: String,
    pub container_image: String,
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,
}

impl State {
    pub fn new(name: impl Into<String>, container_image: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            container_image: container_image.into(),
            active: false,
            activated_at: None,
        }
    }

    pub fn activate(&mut self) {
        self.active = true;
        self.activated_at = Some(Utc::now());
    }

    pub fn deactivate(&mut self) {
        self.active = false;
    }
}

/// A directed, named edge between two states of one machine. When an event
/// named `trigger_event` is delivered to the machine, this transition is
/// selected if it is enabled from the current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub name: String,
    pub from_state: String,
    pub to_state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_event: Option<String>,
}

/// On-disk schema of a machine document (`<machine_id>-config.yaml`).
#[derive(Debug, Clone, Deserialize)]
pub struct MachineDocument {
    pub states: HashMap<String, StateSpec>,
    pub transitions: Vec<Transition>,
    pub initial_state: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateSpec {
    pub container_image: String,
}
