use crate::error::TransportError;
use crate::transport::transport::{Address, Connection, Envelope, Network};
use crate::transport::INBOX_CAPACITY;
use async_trait::async_trait;
use log::debug;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex as AsyncMutex;

/// The shared state of a simulated network: one inbox sender per
/// listening address and the set of addresses that are cut off.
#[derive(Debug, Default)]
struct NetworkState {
    listeners: HashMap<Address, mpsc::Sender<Envelope>>,
    partitions: HashSet<Address>,
}

/// An in-process network that delivers envelopes through bounded per
/// address inboxes. Sends never block: a saturated inbox drops the
/// envelope, the same way a UDP socket buffer would.
///
/// Partitions are modelled as a set of cut addresses rather than a
/// relation between groups, so `partition(a, b)` isolates every member of
/// `a` and `b` from everyone, including each other.
#[derive(Debug, Clone)]
pub struct MockNetwork {
    state: Arc<RwLock<NetworkState>>,
    capacity: usize,
}

impl MockNetwork {
    /// Creates a network whose inboxes hold [`INBOX_CAPACITY`] envelopes.
    pub fn new() -> MockNetwork {
        MockNetwork::with_capacity(INBOX_CAPACITY)
    }

    /// Creates a network with a custom inbox capacity.
    ///
    /// # Arguments
    ///
    /// * capacity - the number of envelopes each inbox buffers, at least 1
    ///
    pub fn with_capacity(capacity: usize) -> MockNetwork {
        MockNetwork {
            state: Arc::new(RwLock::new(NetworkState::default())),
            capacity: capacity.max(1),
        }
    }

    /// Returns true if `addr` is currently cut off.
    pub fn is_partitioned(&self, addr: &Address) -> bool {
        self.state.read().partitions.contains(addr)
    }

    fn connection(&self, addr: &Address, inbox: Option<mpsc::Receiver<Envelope>>) -> Arc<dyn Connection> {
        Arc::new(MockConnection {
            addr: addr.clone(),
            state: self.state.clone(),
            inbox: inbox.map(AsyncMutex::new),
            closed: AtomicBool::new(false),
        })
    }
}

impl Default for MockNetwork {
    fn default() -> Self {
        MockNetwork::new()
    }
}

impl Network for MockNetwork {
    fn listen(&self, addr: &Address) -> Result<Arc<dyn Connection>, TransportError> {
        let mut state = self.state.write();
        if state.listeners.contains_key(addr) {
            return Err(TransportError::AddressInUse(addr.clone()));
        }
        let (tx, rx) = mpsc::channel(self.capacity);
        state.listeners.insert(addr.clone(), tx);
        drop(state);
        Ok(self.connection(addr, Some(rx)))
    }

    fn dial(&self, addr: &Address) -> Result<Arc<dyn Connection>, TransportError> {
        if !self.state.read().listeners.contains_key(addr) {
            return Err(TransportError::AddressNotFound(addr.clone()));
        }
        Ok(self.connection(addr, None))
    }

    fn partition(&self, group_a: &[Address], group_b: &[Address]) {
        let mut state = self.state.write();
        state.partitions.extend(group_a.iter().cloned());
        state.partitions.extend(group_b.iter().cloned());
    }

    fn heal(&self) {
        self.state.write().partitions.clear();
    }
}

/// A connection into a [`MockNetwork`]. Listening connections own the
/// receiving half of their address's inbox; dialed connections can only
/// send.
struct MockConnection {
    addr: Address,
    state: Arc<RwLock<NetworkState>>,
    inbox: Option<AsyncMutex<mpsc::Receiver<Envelope>>>,
    closed: AtomicBool,
}

#[async_trait]
impl Connection for MockConnection {
    fn send(&self, msg: Envelope) -> Result<(), TransportError> {
        // The read guard is held across try_send so a concurrent close
        // cannot drop the inbox between lookup and delivery.
        let state = self.state.read();
        if state.partitions.contains(&msg.from) || state.partitions.contains(&msg.to) {
            return Err(TransportError::Partitioned);
        }
        let inbox = state
            .listeners
            .get(&msg.to)
            .ok_or_else(|| TransportError::DestinationNotFound(msg.to.clone()))?;
        let to = msg.to.clone();
        match inbox.try_send(msg) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(TransportError::QueueFull(to)),
            Err(TrySendError::Closed(_)) => Err(TransportError::DestinationNotFound(to)),
        }
    }

    async fn recv(&self) -> Result<Envelope, TransportError> {
        let inbox = self.inbox.as_ref().ok_or(TransportError::ConnectionClosed)?;
        let mut rx = inbox.lock().await;
        rx.recv().await.ok_or(TransportError::ConnectionClosed)
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.inbox.is_some() {
            // Dropping the registered sender wakes any pending recv once
            // the buffered envelopes are drained.
            self.state.write().listeners.remove(&self.addr);
            debug!("Closed listener {}", self.addr);
        }
    }
}
