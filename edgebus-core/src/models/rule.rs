use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Declarative mapping from one machine's transition to an event delivered to
/// another machine. `conditions` gates the rule on the transition's event
/// payload: `">N"` and `"<N"` compare numerically, anything else must match
/// exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub source_machine: String,
    pub source_transition: String,
    pub target_machine: String,
    pub target_event: String,
    #[serde(default)]
    pub conditions: HashMap<String, serde_json::Value>,
}

/// On-disk schema of the rules document (`transition-rules.yaml`).
#[derive(Debug, Clone, Deserialize)]
pub struct RulesDocument {
    pub rules: Vec<Rule>,
}

/// A named signal produced by a satisfied rule, consumed by the target
/// machine to select a transition via its `trigger_event`.
#[derive(Debug, Clone, Serialize)]
pub struct Event {
    pub name: String,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    pub source_machine: String,
    pub source_transition: String,
}
