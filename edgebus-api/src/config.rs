use anyhow::Result;
use edgebus_core::models::ResourceLimits;
use serde::{Deserialize, Serialize};

/// Control plane configuration. Every knob has a deterministic default; no
/// environment variable is required.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub port: u16,
    pub docker_host: Option<String>,
    pub log_format: String,
    pub log_level: String,
    pub config_dir: String,
    pub rules_path: String,
    pub app_label: String,
    pub network: String,
    pub event_bus_url: String,
    pub resources: ResourceLimits,
    pub readiness_timeout_secs: u64,
    pub readiness_poll_secs: u64,
    pub settle_delay_secs: u64,
    pub request_deadline_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let config_dir =
            std::env::var("EVENT_BUS_CONFIG_DIR").unwrap_or_else(|_| "/config".to_string());

        Ok(Self {
            port: std::env::var("EVENT_BUS_PORT")
                .unwrap_or_else(|_| "5000".to_string())
                .parse()?,
            docker_host: std::env::var("DOCKER_HOST").ok(),
            log_format: std::env::var("EDGEBUS_LOG_FORMAT")
                .unwrap_or_else(|_| "human".to_string()),
            log_level: std::env::var("EDGEBUS_LOG_LEVEL")
                .unwrap_or_else(|_| "info,edgebus_api=debug,tower_http=debug".to_string()),
            rules_path: std::env::var("EVENT_BUS_RULES_PATH")
                .unwrap_or_else(|_| format!("{}/transition-rules.yaml", config_dir)),
            config_dir,
            app_label: std::env::var("EVENT_BUS_APP_LABEL")
                .unwrap_or_else(|_| "edge-surveillance".to_string()),
            network: std::env::var("EVENT_BUS_NETWORK")
                .unwrap_or_else(|_| "edge-surveillance-network".to_string()),
            event_bus_url: std::env::var("EVENT_BUS_URL")
                .unwrap_or_else(|_| "http://event-bus:5000".to_string()),
            resources: ResourceLimits::default(),
            readiness_timeout_secs: 60,
            readiness_poll_secs: 2,
            settle_delay_secs: 1,
            request_deadline_secs: 90,
        })
    }
}
