//! # VR DSU Bridge
//!
//! Stream WebXR motion controllers to emulators over the DSU (cemuhook)
//! protocol.
//!
//! This application receives controller state from a browser over WebSocket
//! and serves it to DSU clients (Cemu, Dolphin, Yuzu, ...) over UDP.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, UdpSocket};
use tracing::{info, warn};

use vr_dsu_bridge::config::Config;
use vr_dsu_bridge::controller::store::ControllerStore;
use vr_dsu_bridge::dsu::client::{ClientRegistry, MultiClientRegistry, SingleClientRegistry};
use vr_dsu_bridge::dsu::server::{run_request_loop, ServerContext};
use vr_dsu_bridge::dsu::stream::run_stream_loop;
use vr_dsu_bridge::feeder::Feeder;
use vr_dsu_bridge::logging;
use vr_dsu_bridge::websocket::server::{run_websocket_server, InputBridge};

/// Config file used when no path is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Pick the config file: first CLI argument, else the default path if present
fn config_path(arg: Option<String>) -> Option<PathBuf> {
    match arg {
        Some(path) => Some(PathBuf::from(path)),
        None => {
            let default = Path::new(DEFAULT_CONFIG_PATH);
            default.exists().then(|| default.to_path_buf())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display())),
        None => Ok(Config::default()),
    }
}

/// Main entry point for VR DSU Bridge
///
/// # Control Flow
///
/// 1. **Initialization**
///    - Load configuration and set up logging
///    - Bind the DSU UDP socket and the WebSocket listener
///    - Start the feeder process if enabled
///
/// 2. **Running**
///    - Request loop answers DSU clients
///    - Stream loop pushes connected slots at the configured rate
///    - WebSocket connections update the controller store
///
/// 3. **Graceful Shutdown**
///    - Ctrl+C stops all tasks
///    - Feeder receives `QUIT`
///
/// # Errors
///
/// Returns error if the configuration is invalid or a socket cannot be bound.
#[tokio::main]
async fn main() -> Result<()> {
    let path = config_path(std::env::args().nth(1));
    let config = load_config(path.as_deref())?;
    let _log_guard = logging::init(&config.logging).context("Failed to initialize logging")?;

    info!("VR DSU Bridge v{} starting...", env!("CARGO_PKG_VERSION"));
    match &path {
        Some(path) => info!("Loaded config from {}", path.display()),
        None => info!("No config file found, using defaults"),
    }

    let store = Arc::new(ControllerStore::new());
    let clients: Arc<dyn ClientRegistry> = if config.dsu.multi_client {
        Arc::new(MultiClientRegistry::new(config.dsu.client_timeout()))
    } else {
        Arc::new(SingleClientRegistry::new(config.dsu.client_timeout()))
    };
    let ctx = ServerContext::new(Arc::clone(&store), clients);

    let dsu_addr = config.dsu.socket_addr()?;
    let socket = Arc::new(
        UdpSocket::bind(dsu_addr)
            .await
            .with_context(|| format!("Failed to bind DSU socket on {}", dsu_addr))?,
    );
    info!("DSU server listening on {} (server id {:#010x})", dsu_addr, ctx.server_id());

    let websocket_addr = config.websocket.socket_addr()?;
    let listener = TcpListener::bind(websocket_addr)
        .await
        .with_context(|| format!("Failed to bind WebSocket listener on {}", websocket_addr))?;

    let feeder = if config.feeder.enabled {
        match Feeder::spawn(&config.feeder) {
            Ok(feeder) => Some(feeder),
            Err(e) => {
                warn!("Continuing without feeder: {}", e);
                None
            }
        }
    } else {
        None
    };

    let bridge = InputBridge::new(Arc::clone(&store), feeder.as_ref().map(Feeder::handle));

    let tasks = [
        tokio::spawn(run_request_loop(ctx.clone(), Arc::clone(&socket))),
        tokio::spawn(run_stream_loop(ctx, socket, config.dsu.stream_rate_hz)),
        tokio::spawn(run_websocket_server(listener, bridge)),
    ];

    info!("Press Ctrl+C to exit");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    info!("Received Ctrl+C, shutting down...");

    for task in &tasks {
        task.abort();
    }

    if let Some(feeder) = feeder {
        if let Err(e) = feeder.shutdown().await {
            warn!("Feeder shutdown failed: {}", e);
        }
    }

    Ok(())
}
