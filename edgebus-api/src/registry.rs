use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use edgebus_core::models::{MachineDocument, State, Transition};
use edgebus_core::{Error, Result};
use tracing::info;

/// One machine: its declared states and transitions plus the current state.
/// Transitions keep configuration order, which decides event dispatch when
/// several carry the same trigger.
#[derive(Debug)]
pub struct StateMachine {
    pub machine_id: String,
    states: HashMap<String, State>,
    transitions: Vec<Transition>,
    current_state: String,
}

impl StateMachine {
    /// Build a machine from its configuration document. Every transition
    /// endpoint and the initial state must be declared states.
    pub fn from_document(machine_id: &str, doc: MachineDocument) -> Result<Self> {
        let mut states: HashMap<String, State> = doc
            .states
            .into_iter()
            .map(|(name, spec)| (name.clone(), State::new(name, spec.container_image)))
            .collect();

        let mut seen = HashSet::new();
        for transition in &doc.transitions {
            if !seen.insert(transition.name.as_str()) {
                return Err(Error::InvalidConfiguration(format!(
                    "Machine '{}': duplicate transition '{}'",
                    machine_id, transition.name
                )));
            }
            for endpoint in [&transition.from_state, &transition.to_state] {
                if !states.contains_key(endpoint.as_str()) {
                    return Err(Error::InvalidConfiguration(format!(
                        "Machine '{}': transition '{}' references undeclared state '{}'",
                        machine_id, transition.name, endpoint
                    )));
                }
            }
        }

        let initial = states.get_mut(&doc.initial_state).ok_or_else(|| {
            Error::InvalidConfiguration(format!(
                "Machine '{}': initial state '{}' is not declared",
                machine_id, doc.initial_state
            ))
        })?;
        initial.activate();

        Ok(Self {
            machine_id: machine_id.to_string(),
            states,
            transitions: doc.transitions,
            current_state: doc.initial_state,
        })
    }

    pub fn current_state(&self) -> &State {
        &self.states[&self.current_state]
    }

    fn transition(&self, name: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.name == name)
    }

    pub fn can_transition(&self, name: &str) -> bool {
        self.transition(name)
            .map(|t| t.from_state == self.current_state)
            .unwrap_or(false)
    }

    /// Transitions enabled from the current state, in configuration order.
    pub fn available_transitions(&self) -> Vec<&Transition> {
        self.transitions
            .iter()
            .filter(|t| t.from_state == self.current_state)
            .collect()
    }

    /// First enabled transition triggered by `event_name`.
    pub fn transition_for_event(&self, event_name: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| {
            t.from_state == self.current_state && t.trigger_event.as_deref() == Some(event_name)
        })
    }

    pub fn can_handle_event(&self, event_name: &str) -> bool {
        self.transition_for_event(event_name).is_some()
    }

    /// Guarded transition. On success the old state is deactivated, the new
    /// state is activated with a fresh timestamp, and both are returned as
    /// snapshots. On failure nothing changes.
    pub fn execute(&mut self, transition_name: &str) -> Result<(State, State)> {
        let (enabled, to_state) = match self.transition(transition_name) {
            Some(t) => (t.from_state == self.current_state, t.to_state.clone()),
            None => return Err(Error::UnknownTransition(transition_name.to_string())),
        };

        if !enabled {
            return Err(Error::InvalidTransition {
                machine_id: self.machine_id.clone(),
                transition: transition_name.to_string(),
                current_state: self.current_state.clone(),
                available_transitions: self
                    .available_transitions()
                    .iter()
                    .map(|t| t.name.clone())
                    .collect(),
            });
        }

        let old_name = self.current_state.clone();
        let old_state = {
            let state = self
                .states
                .get_mut(&old_name)
                .ok_or_else(|| Error::Internal(format!("Current state '{}' missing", old_name)))?;
            state.deactivate();
            state.clone()
        };
        let new_state = {
            let state = self
                .states
                .get_mut(&to_state)
                .ok_or_else(|| Error::Internal(format!("Target state '{}' missing", to_state)))?;
            state.activate();
            state.clone()
        };
        self.current_state = to_state;

        Ok((old_state, new_state))
    }
}

/// The set of declared machines. Keys are fixed at load time; per-machine
/// runtime state mutates behind the registry's lock in `AppState`.
#[derive(Debug, Default)]
pub struct Registry {
    machines: HashMap<String, StateMachine>,
}

impl Registry {
    /// Load every `<machine_id>-config.yaml` under `config_dir`. At least one
    /// machine document must exist.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let entries = fs::read_dir(config_dir).map_err(|e| {
            Error::InvalidConfiguration(format!(
                "Failed to read config directory {}: {}",
                config_dir.display(),
                e
            ))
        })?;

        let mut machines = HashMap::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                Error::InvalidConfiguration(format!("Failed to read config entry: {}", e))
            })?;
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(machine_id) = file_name.strip_suffix("-config.yaml") else {
                continue;
            };

            let raw = fs::read_to_string(&path).map_err(|e| {
                Error::InvalidConfiguration(format!("Failed to read {}: {}", path.display(), e))
            })?;
            let doc: MachineDocument = serde_yaml::from_str(&raw).map_err(|e| {
                Error::InvalidConfiguration(format!("Failed to parse {}: {}", path.display(), e))
            })?;

            let machine = StateMachine::from_document(machine_id, doc)?;
            info!(
                machine.id = %machine_id,
                initial_state = %machine.current_state().name,
                "Loaded machine"
            );
            machines.insert(machine_id.to_string(), machine);
        }

        if machines.is_empty() {
            return Err(Error::InvalidConfiguration(format!(
                "No machine documents found in {}",
                config_dir.display()
            )));
        }

        Ok(Self { machines })
    }

    pub fn machine(&self, machine_id: &str) -> Result<&StateMachine> {
        self.machines
            .get(machine_id)
            .ok_or_else(|| Error::UnknownMachine(machine_id.to_string()))
    }

    pub fn machine_mut(&mut self, machine_id: &str) -> Result<&mut StateMachine> {
        self.machines
            .get_mut(machine_id)
            .ok_or_else(|| Error::UnknownMachine(machine_id.to_string()))
    }

    pub fn machine_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.machines.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn execute(&mut self, machine_id: &str, transition_name: &str) -> Result<(State, State)> {
        self.machine_mut(machine_id)?.execute(transition_name)
    }
}
