use std::str::FromStr;

use anyhow::bail;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format. Services pick it up from their own configuration and
/// hand it to [`init`]; this crate holds no env-var surface of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Compact single-line format for terminals
    Human,
    /// JSON lines for log aggregation
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" | "pretty" | "text" => Ok(LogFormat::Human),
            "json" => Ok(LogFormat::Json),
            other => bail!("unknown log format '{}' (expected 'human' or 'json')", other),
        }
    }
}

/// Install the global tracing subscriber. `default_filter` seeds the filter
/// when `RUST_LOG` is unset; it takes the usual directive syntax
/// (`info,edgebus_api=debug`). Fails if a subscriber is already installed.
pub fn init(service_name: &str, format: LogFormat, default_filter: &str) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let registry = tracing_subscriber::registry().with(env_filter);
    match format {
        LogFormat::Json => {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .flatten_event(true)
                        .with_current_span(false)
                        .with_target(true),
                )
                .try_init()?;
        }
        LogFormat::Human => {
            registry
                .with(tracing_subscriber::fmt::layer().compact().with_target(true))
                .try_init()?;
        }
    }

    tracing::info!(
        service.name = %service_name,
        log.format = ?format,
        "Logging initialized"
    );
    Ok(())
}

/// Standard field names for consistent logging across Edgebus components
pub mod fields {
    // Business entities
    pub const MACHINE_ID: &str = "machine.id";
    pub const STATE_NAME: &str = "state.name";
    pub const TRANSITION: &str = "transition";
    pub const EVENT_NAME: &str = "event.name";
    pub const SERVICE_ID: &str = "service.id";
    pub const SERVICE_NAME: &str = "service.name";
    pub const IMAGE: &str = "image";
    pub const NODE_ID: &str = "node.id";

    // Operations
    pub const OPERATION: &str = "operation";
    pub const OPERATION_STATUS: &str = "operation.status";
    pub const DURATION_MS: &str = "duration_ms";

    // HTTP context
    pub const HTTP_METHOD: &str = "http.method";
    pub const HTTP_PATH: &str = "http.path";
    pub const HTTP_STATUS: &str = "http.status";

    // Error context
    pub const ERROR_TYPE: &str = "error.type";
    pub const ERROR_MESSAGE: &str = "error.message";
}
