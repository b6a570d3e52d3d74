//! # DSU Request Handler
//!
//! Answers client requests arriving on the DSU UDP port.
//!
//! | Request | Response |
//! |---------|----------|
//! | Version | One version response |
//! | Ports | One port info response per requested slot (0-3) |
//! | Data | One data packet per connected slot (subscription burst) |
//! | Unknown | Nothing |
//!
//! Every valid request also (re)registers the sender with the client
//! registry so the streaming loop knows where to send.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::net::UdpSocket;
use tracing::{debug, info, trace, warn};

use super::client::{ClientRegistry, SingleClientRegistry};
use super::decoder::decode_request;
use super::encoder::{encode_port_info_response, encode_version_response};
use super::protocol::Request;
use super::socket::DatagramSink;
use crate::controller::store::ControllerStore;

/// Largest datagram read from a client; requests are well below this
const RECV_BUFFER_SIZE: usize = 1024;

/// Current wall-clock time in microseconds since the Unix epoch
pub fn timestamp_us() -> u64 {
    chrono::Utc::now().timestamp_micros().max(0) as u64
}

/// Shared state for the request handler and the streaming loop
#[derive(Debug, Clone)]
pub struct ServerContext {
    server_id: u32,
    store: Arc<ControllerStore>,
    clients: Arc<dyn ClientRegistry>,
}

impl ServerContext {
    /// Create a context with a random server id
    pub fn new(store: Arc<ControllerStore>, clients: Arc<dyn ClientRegistry>) -> Self {
        Self::with_server_id(rand::random::<u32>(), store, clients)
    }

    /// Create a context with a fixed server id
    pub fn with_server_id(
        server_id: u32,
        store: Arc<ControllerStore>,
        clients: Arc<dyn ClientRegistry>,
    ) -> Self {
        Self {
            server_id,
            store,
            clients,
        }
    }

    /// Context with a fresh store and the single-client registry
    pub fn single_client(server_id: u32) -> Self {
        Self::with_server_id(
            server_id,
            Arc::new(ControllerStore::new()),
            Arc::new(SingleClientRegistry::new(None)),
        )
    }

    pub fn server_id(&self) -> u32 {
        self.server_id
    }

    pub fn store(&self) -> &Arc<ControllerStore> {
        &self.store
    }

    pub fn clients(&self) -> &Arc<dyn ClientRegistry> {
        &self.clients
    }

    /// Handle one inbound datagram and reply through `sink`.
    ///
    /// Malformed datagrams are dropped silently. Returns the number of
    /// packets successfully sent.
    pub fn handle_datagram(&self, data: &[u8], src: SocketAddr, sink: &dyn DatagramSink) -> usize {
        let request = match decode_request(data) {
            Ok(request) => request,
            Err(e) => {
                trace!("Dropping datagram from {}: {}", src, e);
                return 0;
            }
        };

        if self.clients.observe(src, &request, Instant::now()) {
            info!("DSU client connected from {}", src);
        }

        let packets: Vec<Vec<u8>> = match &request {
            Request::Version => vec![encode_version_response(self.server_id)],
            Request::Ports { slots } => slots
                .iter()
                .filter_map(|&slot| self.store.get(slot).ok())
                .map(|slot| encode_port_info_response(self.server_id, &slot))
                .collect(),
            Request::Data { .. } => {
                let timestamp = timestamp_us();
                self.store
                    .connected_slots()
                    .into_iter()
                    .filter_map(|slot| self.store.next_data_packet(slot, self.server_id, timestamp))
                    .collect()
            }
            Request::Unknown(message_type) => {
                trace!("Ignoring unknown message type {:#x} from {}", message_type, src);
                Vec::new()
            }
        };

        let mut sent = 0;
        for packet in &packets {
            match sink.try_send_to(packet, src) {
                Ok(_) => sent += 1,
                Err(e) => debug!("Failed to send {} response to {}: {}", request.name(), src, e),
            }
        }
        sent
    }
}

/// Receive and answer requests until the task is cancelled.
///
/// Receive errors (e.g. ICMP port unreachable surfacing on some platforms)
/// are logged and the loop continues.
pub async fn run_request_loop(ctx: ServerContext, socket: Arc<UdpSocket>) {
    let mut buffer = [0u8; RECV_BUFFER_SIZE];

    loop {
        match socket.recv_from(&mut buffer).await {
            Ok((len, src)) => {
                ctx.handle_datagram(&buffer[..len], src, socket.as_ref());
            }
            Err(e) => {
                warn!("DSU receive error: {}", e);
            }
        }
    }
}
