use std::collections::HashMap;
use std::path::Path;

use chrono::Utc;
use edgebus_core::models::{Event, Rule, RulesDocument};
use serde_json::Value;
use tracing::{info, warn};

/// Declarative fan-out table: transitions in one machine trigger events
/// delivered to others. Read-only after load.
pub struct RulesEngine {
    rules: Vec<Rule>,
}

impl RulesEngine {
    /// Load rules from `path`. A missing or unreadable document falls back to
    /// the built-in default set; the control plane always boots with rules.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(engine) => {
                info!(
                    rules = engine.rules.len(),
                    path = %path.display(),
                    "Loaded transition rules"
                );
                engine
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load rules, using defaults");
                let engine = Self::default_rules();
                info!(rules = engine.rules.len(), "Loaded default rules");
                engine
            }
        }
    }

    fn try_load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let doc: RulesDocument = serde_yaml::from_str(&raw)?;
        Ok(Self { rules: doc.rules })
    }

    pub fn default_rules() -> Self {
        Self {
            rules: vec![Rule {
                source_machine: "detector".to_string(),
                source_transition: "person_detected".to_string(),
                target_machine: "surveillance".to_string(),
                target_event: "foundPersons".to_string(),
                conditions: HashMap::new(),
            }],
        }
    }

    pub fn from_rules(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Enumerate `(target_machine, event)` pairs triggered by a transition.
    /// Deterministic: rules are matched in declaration order against the
    /// source coordinates, then gated on the payload.
    pub fn triggered_events(
        &self,
        source_machine: &str,
        source_transition: &str,
        event_data: &Value,
    ) -> Vec<(String, Event)> {
        let mut triggered = Vec::new();

        for rule in &self.rules {
            if rule.source_machine != source_machine
                || rule.source_transition != source_transition
            {
                continue;
            }
            if !conditions_match(&rule.conditions, event_data) {
                continue;
            }

            info!(
                source_machine,
                source_transition,
                target_machine = %rule.target_machine,
                target_event = %rule.target_event,
                "Rule triggered"
            );
            triggered.push((
                rule.target_machine.clone(),
                Event {
                    name: rule.target_event.clone(),
                    data: event_data.clone(),
                    timestamp: Utc::now(),
                    source_machine: source_machine.to_string(),
                    source_transition: source_transition.to_string(),
                },
            ));
        }

        triggered
    }
}

/// Evaluate a rule's condition map against an event payload. Empty conditions
/// pass vacuously; a key missing from the payload fails.
fn conditions_match(conditions: &HashMap<String, Value>, event_data: &Value) -> bool {
    conditions.iter().all(|(key, expected)| {
        event_data
            .get(key)
            .map(|actual| condition_matches(expected, actual))
            .unwrap_or(false)
    })
}

/// `">N"` and `"<N"` require a numeric payload value strictly beyond the
/// threshold; a malformed threshold fails the condition rather than erroring.
/// Anything else is equality, with numbers compared numerically.
fn condition_matches(expected: &Value, actual: &Value) -> bool {
    if let Some(text) = expected.as_str() {
        if let Some(threshold) = text.strip_prefix('>') {
            return match (threshold.trim().parse::<f64>(), actual.as_f64()) {
                (Ok(threshold), Some(value)) => value > threshold,
                _ => false,
            };
        }
        if let Some(threshold) = text.strip_prefix('<') {
            return match (threshold.trim().parse::<f64>(), actual.as_f64()) {
                (Ok(threshold), Some(value)) => value < threshold,
                _ => false,
            };
        }
    }

    match (expected.as_f64(), actual.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => expected == actual,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engine_with_conditions(conditions: HashMap<String, Value>) -> RulesEngine {
        RulesEngine::from_rules(vec![Rule {
            source_machine: "detector".to_string(),
            source_transition: "person_detected".to_string(),
            target_machine: "surveillance".to_string(),
            target_event: "foundPersons".to_string(),
            conditions,
        }])
    }

    #[test]
    fn test_matching_rule_produces_event() {
        let engine = engine_with_conditions(HashMap::new());
        let data = json!({"confidence": 0.9});

        let events = engine.triggered_events("detector", "person_detected", &data);
        assert_eq!(events.len(), 1);

        let (target, event) = &events[0];
        assert_eq!(target, "surveillance");
        assert_eq!(event.name, "foundPersons");
        assert_eq!(event.data, data);
        assert_eq!(event.source_machine, "detector");
        assert_eq!(event.source_transition, "person_detected");
    }

    #[test]
    fn test_non_matching_coordinates_produce_nothing() {
        let engine = engine_with_conditions(HashMap::new());
        let data = json!({});

        assert!(engine
            .triggered_events("detector", "image_captured", &data)
            .is_empty());
        assert!(engine
            .triggered_events("surveillance", "person_detected", &data)
            .is_empty());
    }

    #[test]
    fn test_greater_than_is_strict() {
        let mut conditions = HashMap::new();
        conditions.insert("confidence".to_string(), json!(">0.5"));
        let engine = engine_with_conditions(conditions);

        assert!(engine
            .triggered_events("detector", "person_detected", &json!({"confidence": 0.5}))
            .is_empty());
        assert_eq!(
            engine
                .triggered_events(
                    "detector",
                    "person_detected",
                    &json!({"confidence": 0.5000001})
                )
                .len(),
            1
        );
    }

    #[test]
    fn test_less_than_is_strict() {
        let mut conditions = HashMap::new();
        conditions.insert("distance".to_string(), json!("<10"));
        let engine = engine_with_conditions(conditions);

        assert_eq!(
            engine
                .triggered_events("detector", "person_detected", &json!({"distance": 9.5}))
                .len(),
            1
        );
        assert!(engine
            .triggered_events("detector", "person_detected", &json!({"distance": 10}))
            .is_empty());
    }

    #[test]
    fn test_missing_key_fails() {
        let mut conditions = HashMap::new();
        conditions.insert("confidence".to_string(), json!(">0.5"));
        let engine = engine_with_conditions(conditions);

        assert!(engine
            .triggered_events("detector", "person_detected", &json!({}))
            .is_empty());
    }

    #[test]
    fn test_non_numeric_payload_fails_comparison() {
        let mut conditions = HashMap::new();
        conditions.insert("confidence".to_string(), json!(">0.5"));
        let engine = engine_with_conditions(conditions);

        assert!(engine
            .triggered_events(
                "detector",
                "person_detected",
                &json!({"confidence": "high"})
            )
            .is_empty());
    }

    #[test]
    fn test_malformed_threshold_fails_without_panicking() {
        for bad in [">", ">abc", "<", "<x1"] {
            let mut conditions = HashMap::new();
            conditions.insert("confidence".to_string(), json!(bad));
            let engine = engine_with_conditions(conditions);

            assert!(
                engine
                    .triggered_events("detector", "person_detected", &json!({"confidence": 0.9}))
                    .is_empty(),
                "predicate {bad:?} should fail"
            );
        }
    }

    #[test]
    fn test_equality_on_strings_and_numbers() {
        let mut conditions = HashMap::new();
        conditions.insert("zone".to_string(), json!("entrance"));
        conditions.insert("count".to_string(), json!(2));
        let engine = engine_with_conditions(conditions);

        assert_eq!(
            engine
                .triggered_events(
                    "detector",
                    "person_detected",
                    &json!({"zone": "entrance", "count": 2})
                )
                .len(),
            1
        );
        // Integer payload against float condition compares numerically
        assert_eq!(
            engine
                .triggered_events(
                    "detector",
                    "person_detected",
                    &json!({"zone": "entrance", "count": 2.0})
                )
                .len(),
            1
        );
        assert!(engine
            .triggered_events(
                "detector",
                "person_detected",
                &json!({"zone": "garage", "count": 2})
            )
            .is_empty());
    }

    #[test]
    fn test_fan_out_is_deterministic() {
        let engine = RulesEngine::from_rules(vec![
            Rule {
                source_machine: "detector".to_string(),
                source_transition: "person_detected".to_string(),
                target_machine: "surveillance".to_string(),
                target_event: "foundPersons".to_string(),
                conditions: HashMap::new(),
            },
            Rule {
                source_machine: "detector".to_string(),
                source_transition: "person_detected".to_string(),
                target_machine: "recorder".to_string(),
                target_event: "startRecording".to_string(),
                conditions: HashMap::new(),
            },
        ]);

        let data = json!({"confidence": 0.7});
        let first = engine.triggered_events("detector", "person_detected", &data);
        let second = engine.triggered_events("detector", "person_detected", &data);

        let coords =
            |events: &[(String, Event)]| -> Vec<(String, String)> {
                events
                    .iter()
                    .map(|(target, event)| (target.clone(), event.name.clone()))
                    .collect()
            };
        assert_eq!(coords(&first), coords(&second));
        assert_eq!(
            coords(&first),
            vec![
                ("surveillance".to_string(), "foundPersons".to_string()),
                ("recorder".to_string(), "startRecording".to_string())
            ]
        );
    }

    #[test]
    fn test_missing_rules_file_falls_back_to_defaults() {
        let engine = RulesEngine::load(Path::new("/nonexistent/transition-rules.yaml"));
        let events =
            engine.triggered_events("detector", "person_detected", &json!({"confidence": 0.9}));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "surveillance");
    }

    #[test]
    fn test_load_from_yaml_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transition-rules.yaml");
        std::fs::write(
            &path,
            r#"
rules:
  - source_machine: detector
    source_transition: person_detected
    target_machine: surveillance
    target_event: foundPersons
    conditions:
      confidence: ">0.8"
"#,
        )
        .unwrap();

        let engine = RulesEngine::load(&path);
        assert!(engine
            .triggered_events("detector", "person_detected", &json!({"confidence": 0.5}))
            .is_empty());
        assert_eq!(
            engine
                .triggered_events("detector", "person_detected", &json!({"confidence": 0.9}))
                .len(),
            1
        );
    }
}
