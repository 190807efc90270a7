use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use edgebus_api::cluster::SwarmCluster;
use edgebus_api::{create_app, AppState, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    edgebus_logging::init("event-bus", config.log_format.parse()?, &config.log_level)?;

    info!(
        service = "event-bus",
        version = env!("CARGO_PKG_VERSION"),
        "Starting Edgebus event bus"
    );

    let cluster = Arc::new(SwarmCluster::connect(config.docker_host.as_deref()).await?);
    let state = AppState::new(config.clone(), cluster)?;

    // Materialize every machine's initial state before accepting requests
    state.launch_initial_states().await?;
    info!("System initialized");

    let app = create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(server.address = %addr, "Event bus binding to address");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
