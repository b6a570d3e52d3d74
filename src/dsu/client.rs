//! # DSU Client Registry
//!
//! Tracks which consumer endpoints receive streamed controller data.
//!
//! - [`SingleClientRegistry`]: the most recent sender of any valid request
//!   receives every connected slot.
//! - [`MultiClientRegistry`]: every endpoint that sent a data request receives
//!   the slots it subscribed to.
//!
//! The single registry optionally forgets an endpoint that stays silent longer
//! than a timeout. The multi registry always does, falling back to
//! [`DEFAULT_MULTI_CLIENT_TIMEOUT`] so restarted consumers do not pile up.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::protocol::{Request, DATA_FLAG_MAC, DATA_FLAG_SLOT};

/// Inactivity timeout for the multi registry when none is configured
pub const DEFAULT_MULTI_CLIENT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Slots a client asked to receive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subscription {
    /// Every connected slot
    All,
    /// One slot by index
    Slot(u8),
    /// One slot by device MAC
    Mac([u8; 6]),
}

impl Subscription {
    /// Subscriptions requested by a data request's flags
    pub fn from_data_request(flags: u8, slot: u8, mac: [u8; 6]) -> Vec<Self> {
        let mut subscriptions = Vec::with_capacity(2);
        if flags & DATA_FLAG_SLOT != 0 {
            subscriptions.push(Subscription::Slot(slot));
        }
        if flags & DATA_FLAG_MAC != 0 {
            subscriptions.push(Subscription::Mac(mac));
        }
        if subscriptions.is_empty() {
            subscriptions.push(Subscription::All);
        }
        subscriptions
    }

    /// Whether this subscription covers the given slot
    pub fn matches(&self, slot: u8, mac: &[u8; 6]) -> bool {
        match self {
            Subscription::All => true,
            Subscription::Slot(id) => *id == slot,
            Subscription::Mac(m) => m == mac,
        }
    }
}

/// Registry of downstream DSU consumers
pub trait ClientRegistry: Send + Sync + fmt::Debug {
    /// Record a valid request from `addr`.
    ///
    /// Returns `true` when the event is worth logging (a new client IP).
    fn observe(&self, addr: SocketAddr, request: &Request, now: Instant) -> bool;

    /// Endpoints that should receive data for a slot
    fn destinations(&self, slot: u8, mac: &[u8; 6]) -> Vec<SocketAddr>;

    /// Drop clients silent for longer than the timeout; returns the dropped endpoints
    fn prune_expired(&self, now: Instant) -> Vec<SocketAddr>;

    /// True when no client is known
    fn is_empty(&self) -> bool;
}

fn expired(last_seen: Instant, now: Instant, timeout: Option<Duration>) -> bool {
    timeout.is_some_and(|timeout| now.saturating_duration_since(last_seen) > timeout)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Copy)]
struct LastClient {
    addr: SocketAddr,
    last_seen: Instant,
}

/// Last sender wins; receives all slots
#[derive(Debug, Default)]
pub struct SingleClientRegistry {
    client: Mutex<Option<LastClient>>,
    timeout: Option<Duration>,
}

impl SingleClientRegistry {
    /// Create a registry; `timeout` of `None` keeps the client forever
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            client: Mutex::new(None),
            timeout,
        }
    }

    /// Currently remembered endpoint
    pub fn current(&self) -> Option<SocketAddr> {
        lock(&self.client).map(|client| client.addr)
    }
}

impl ClientRegistry for SingleClientRegistry {
    fn observe(&self, addr: SocketAddr, _request: &Request, now: Instant) -> bool {
        let previous = lock(&self.client).replace(LastClient { addr, last_seen: now });
        previous.map_or(true, |previous| previous.addr.ip() != addr.ip())
    }

    fn destinations(&self, _slot: u8, _mac: &[u8; 6]) -> Vec<SocketAddr> {
        self.current().into_iter().collect()
    }

    fn prune_expired(&self, now: Instant) -> Vec<SocketAddr> {
        let mut client = lock(&self.client);
        match *client {
            Some(last) if expired(last.last_seen, now, self.timeout) => {
                *client = None;
                vec![last.addr]
            }
            _ => Vec::new(),
        }
    }

    fn is_empty(&self) -> bool {
        lock(&self.client).is_none()
    }
}

#[derive(Debug, Clone)]
struct ClientEntry {
    subscriptions: HashSet<Subscription>,
    last_seen: Instant,
}

/// Any number of subscribed clients, each with its own slot selection.
///
/// A consumer that rebinds its port shows up as a new endpoint, so clients
/// always expire.
#[derive(Debug)]
pub struct MultiClientRegistry {
    clients: Mutex<HashMap<SocketAddr, ClientEntry>>,
    timeout: Duration,
}

impl Default for MultiClientRegistry {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MultiClientRegistry {
    /// Create a registry; `None` uses [`DEFAULT_MULTI_CLIENT_TIMEOUT`]
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            timeout: timeout.unwrap_or(DEFAULT_MULTI_CLIENT_TIMEOUT),
        }
    }

    /// Inactivity timeout in effect
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of registered clients
    pub fn len(&self) -> usize {
        lock(&self.clients).len()
    }
}

impl ClientRegistry for MultiClientRegistry {
    fn observe(&self, addr: SocketAddr, request: &Request, now: Instant) -> bool {
        let mut clients = lock(&self.clients);

        match request {
            Request::Data { flags, slot, mac } => {
                let is_new_ip = !clients.keys().any(|known| known.ip() == addr.ip());
                let entry = clients.entry(addr).or_insert_with(|| ClientEntry {
                    subscriptions: HashSet::new(),
                    last_seen: now,
                });
                entry.last_seen = now;
                entry
                    .subscriptions
                    .extend(Subscription::from_data_request(*flags, *slot, *mac));
                is_new_ip
            }
            _ => {
                // Only data requests register; other traffic keeps a client alive
                if let Some(entry) = clients.get_mut(&addr) {
                    entry.last_seen = now;
                }
                false
            }
        }
    }

    fn destinations(&self, slot: u8, mac: &[u8; 6]) -> Vec<SocketAddr> {
        lock(&self.clients)
            .iter()
            .filter(|(_, entry)| entry.subscriptions.iter().any(|s| s.matches(slot, mac)))
            .map(|(addr, _)| *addr)
            .collect()
    }

    fn prune_expired(&self, now: Instant) -> Vec<SocketAddr> {
        let mut clients = lock(&self.clients);
        let stale: Vec<SocketAddr> = clients
            .iter()
            .filter(|(_, entry)| expired(entry.last_seen, now, Some(self.timeout)))
            .map(|(addr, _)| *addr)
            .collect();

        for addr in &stale {
            clients.remove(addr);
        }
        stale
    }

    fn is_empty(&self) -> bool {
        lock(&self.clients).is_empty()
    }
}
