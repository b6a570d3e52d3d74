//! WebSocket listener that feeds browser controller data into the store

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, info, trace, warn};

use super::message::InboundMessage;
use crate::controller::store::ControllerStore;
use crate::error::Result;
use crate::feeder::FeederHandle;

/// Routes parsed browser messages to the store and the optional feeder
#[derive(Debug, Clone)]
pub struct InputBridge {
    store: Arc<ControllerStore>,
    feeder: Option<FeederHandle>,
}

impl InputBridge {
    pub fn new(store: Arc<ControllerStore>, feeder: Option<FeederHandle>) -> Self {
        Self { store, feeder }
    }

    /// Apply one text frame. Returns `true` if controller state changed.
    ///
    /// Bad frames are logged at debug and dropped.
    pub fn handle_text(&self, text: &str) -> bool {
        let message = match InboundMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                debug!("Dropping invalid message: {}", e);
                return false;
            }
        };

        match &message {
            InboundMessage::Config(config) => {
                debug!("Page config: {:?}", config.settings);
            }
            InboundMessage::Unknown => {
                debug!("Ignoring message with unknown type");
            }
            _ => {}
        }

        match message.apply(&self.store) {
            Ok(true) => {
                self.notify_feeder();
                true
            }
            Ok(false) => false,
            Err(e) => {
                debug!("Dropping message: {}", e);
                false
            }
        }
    }

    /// The input source went away: every slot is disconnected
    pub fn handle_close(&self) {
        self.store.disconnect_all();
        self.notify_feeder();
    }

    fn notify_feeder(&self) {
        if let Some(feeder) = &self.feeder {
            feeder.send_from_store(&self.store);
        }
    }
}

/// Accept connections until the task is cancelled
pub async fn run_websocket_server(listener: TcpListener, bridge: InputBridge) {
    if let Ok(addr) = listener.local_addr() {
        info!("WebSocket listening on {}", addr);
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tokio::spawn(accept_connection(stream, addr, bridge.clone()));
            }
            Err(e) => {
                warn!("WebSocket accept error: {}", e);
            }
        }
    }
}

async fn accept_connection(stream: TcpStream, addr: SocketAddr, bridge: InputBridge) {
    let _ = stream.set_nodelay(true);

    if let Err(e) = serve_connection(stream, addr, &bridge).await {
        warn!("WebSocket connection {} failed: {}", addr, e);
    }
}

/// Handshake, then read frames until close. Slots are disconnected whenever
/// an established connection ends, cleanly or not.
async fn serve_connection(stream: TcpStream, addr: SocketAddr, bridge: &InputBridge) -> Result<()> {
    let mut ws_stream = tokio_tungstenite::accept_async(stream).await?;
    info!("WebSocket client connected: {}", addr);

    let result = read_frames(&mut ws_stream, addr, bridge).await;

    info!("WebSocket client disconnected: {}", addr);
    bridge.handle_close();
    result
}

async fn read_frames(
    ws_stream: &mut WebSocketStream<TcpStream>,
    addr: SocketAddr,
    bridge: &InputBridge,
) -> Result<()> {
    while let Some(message) = ws_stream.next().await {
        match message? {
            Message::Text(text) => {
                bridge.handle_text(text.as_str());
            }
            Message::Close(frame) => {
                debug!("Close frame from {}: {:?}", addr, frame);
                break;
            }
            Message::Binary(data) => {
                trace!("Ignoring {} byte binary frame from {}", data.len(), addr);
            }
            // Pings are answered by tungstenite itself
            _ => {}
        }
    }
    Ok(())
}
