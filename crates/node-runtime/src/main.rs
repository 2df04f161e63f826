//! # Veilnet Node
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging from the environment
//! 2. Load configuration (file given as the first argument, then `VN_*` env)
//! 3. Load or create the node identity in the data directory
//! 4. Start transports, nodes and background services
//! 5. Run until Ctrl+C, then shut down gracefully

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use node_runtime::telemetry::{init_logging, TelemetryConfig};
use node_runtime::{load_or_create_identity, NodeConfig, NodeRuntime};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&TelemetryConfig::from_env()).context("failed to initialize logging")?;

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = NodeConfig::load(config_path.as_deref()).context("failed to load configuration")?;

    let identity = load_or_create_identity(&config.store.data_dir)
        .context("failed to load node identity")?;

    let runtime = NodeRuntime::new(config, identity).context("failed to build node runtime")?;
    runtime.start().await.context("failed to start node")?;

    info!(network_id = ?runtime.network_id(), "Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
