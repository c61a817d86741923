use crate::error::{GossipError, NodeError, ProtocolError};
use crate::gossip::protocol::GossipMessage;
use crate::gossip::trace::{MessageTrace, TraceLog};
use crate::gossip::{NodeId, DEFAULT_BASE_PORT, DEFAULT_TTL};
use crate::node::node::Node;
use crate::protocol::protocol::{tags, MessageKey};
use crate::transport::transport::{Address, Network};
use crate::utils::utils::ByteRep;
use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::{Arc, Weak};

/// A configuration struct for the user to pass different
/// parameters into a gossip node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipConfig {
    // Hop budget of messages created by this node
    pub ttl: u32,
    // Port of node 0, used to map a sender's port back to its node id
    pub base_port: u16,
}

impl GossipConfig {
    /// Create a new GossipConfig Instance
    ///
    /// # Arguments
    ///
    /// * ttl - the number of hops a new message may travel
    /// * base_port - the port of node 0 in the simulated network
    ///
    pub fn new(ttl: u32, base_port: u16) -> GossipConfig {
        GossipConfig { ttl, base_port }
    }

    /// Maps a node's address back to its id. Ports below the base port
    /// belong to no node.
    pub fn node_id(&self, addr: &Address) -> Option<NodeId> {
        addr.port.checked_sub(self.base_port).map(NodeId::from)
    }
}

impl Default for GossipConfig {
    fn default() -> Self {
        GossipConfig::new(DEFAULT_TTL, DEFAULT_BASE_PORT)
    }
}

/// A snapshot of a node's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeStats {
    pub peers: usize,
    /// Length of the received log
    pub received: usize,
    pub sent: usize,
    pub received_counter: usize,
    /// Gossip copies that arrived, duplicates included
    pub inbound: usize,
}

#[derive(Debug, Default)]
struct GossipState {
    peers: Vec<Address>,
    seen: HashSet<MessageKey>,
    received: Vec<GossipMessage>,
    messages_sent: usize,
    messages_received: usize,
    copies_received: usize,
}

struct Inner {
    id: NodeId,
    address: Address,
    config: GossipConfig,
    node: Node,
    state: RwLock<GossipState>,
    traces: Option<TraceLog>,
}

/// A node of the gossip network. Every message it sees for the first time
/// is recorded and forwarded to all of its peers until the message's hop
/// budget runs out. Copies of an already seen message are ignored, which is
/// what makes flooding terminate on cyclic topologies.
///
/// Cloning a `GossipNode` yields another handle to the same node.
#[derive(Clone)]
pub struct GossipNode {
    inner: Arc<Inner>,
}

impl GossipNode {
    /// Creates a gossip node listening at `address` and registers its
    /// handlers.
    ///
    /// # Arguments
    ///
    /// * network - the network to listen on
    /// * id - the node's logical id
    /// * address - the node's listening address
    /// * config - protocol parameters
    /// * traces - the shared log that first receptions are recorded in, if any
    ///
    pub fn new(
        network: Arc<dyn Network>,
        id: NodeId,
        address: Address,
        config: GossipConfig,
        traces: Option<TraceLog>,
    ) -> Result<GossipNode, NodeError> {
        let node = Node::new(network, address.clone())?;
        let inner = Arc::new(Inner {
            id,
            address,
            config,
            node,
            state: RwLock::new(GossipState::default()),
            traces,
        });
        setup_handlers(&inner);
        Ok(GossipNode { inner })
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn address(&self) -> &Address {
        &self.inner.address
    }

    pub fn config(&self) -> &GossipConfig {
        &self.inner.config
    }

    /// Adds a peer unless it is this node or already known.
    pub fn add_peer(&self, addr: Address) {
        self.inner.add_peer(addr)
    }

    /// Returns a copy of the peer list.
    pub fn peers(&self) -> Vec<Address> {
        self.inner.state.read().peers.clone()
    }

    /// Starts the receive loop.
    pub fn start(&self) {
        self.inner.node.start()
    }

    pub fn is_running(&self) -> bool {
        self.inner.node.is_running()
    }

    /// Creates a new message and spreads it to every peer.
    ///
    /// The originator marks the message as seen so copies echoed back to it
    /// are ignored, but it does not record the message as received. Failures
    /// to reach individual peers are not errors. Must be called from within
    /// a tokio runtime.
    pub fn gossip(&self, content: &str) -> Result<MessageKey, GossipError> {
        let msg = GossipMessage::new(content, self.inner.id, self.inner.config.ttl);
        let id = msg.id;
        info!("node {} starting gossip: {:?}", self.inner.id, content);
        self.inner.state.write().seen.insert(id);
        self.inner.spread(msg)?;
        Ok(id)
    }

    /// Asks `addr` for its peer list. The reply is merged into this node's
    /// peers when it arrives.
    pub fn discover(&self, addr: &Address) -> Result<(), GossipError> {
        self.inner.node.send(addr, tags::DISCOVER, &[])?;
        Ok(())
    }

    pub fn stats(&self) -> NodeStats {
        let state = self.inner.state.read();
        NodeStats {
            peers: state.peers.len(),
            received: state.received.len(),
            sent: state.messages_sent,
            received_counter: state.messages_received,
            inbound: state.copies_received,
        }
    }

    /// Returns a copy of every message this node has received.
    pub fn received_messages(&self) -> Vec<GossipMessage> {
        self.inner.state.read().received.clone()
    }

    /// Returns true if the message id has been processed by this node.
    pub fn has_seen(&self, id: &MessageKey) -> bool {
        self.inner.state.read().seen.contains(id)
    }

    /// Shuts the node down.
    pub fn close(&self) {
        self.inner.node.close()
    }
}

fn setup_handlers(inner: &Arc<Inner>) {
    let weak: Weak<Inner> = Arc::downgrade(inner);
    inner.node.handle(tags::GOSSIP, move |msg, body| {
        let inner = match weak.upgrade() {
            Some(inner) => inner,
            None => return Ok(()),
        };
        let gossip = GossipMessage::from_bytes(body).map_err(ProtocolError::from)?;
        inner.handle_gossip_message(gossip, &msg.from);
        Ok(())
    });

    let weak = Arc::downgrade(inner);
    inner.node.handle(tags::DISCOVER, move |msg, _body| {
        let inner = match weak.upgrade() {
            Some(inner) => inner,
            None => return Ok(()),
        };
        let peers = inner.state.read().peers.clone();
        let body = serde_json::to_vec(&peers).map_err(ProtocolError::from)?;
        inner.node.send(&msg.from, tags::PEERS, &body)
    });

    let weak = Arc::downgrade(inner);
    inner.node.handle(tags::PEERS, move |msg, body| {
        let inner = match weak.upgrade() {
            Some(inner) => inner,
            None => return Ok(()),
        };
        let peers: Vec<Address> = serde_json::from_slice(body).map_err(ProtocolError::from)?;
        debug!("{} learned {} peers from {}", inner.address, peers.len(), msg.from);
        peers.into_iter().for_each(|peer| inner.add_peer(peer));
        Ok(())
    });
}

impl Inner {
    fn add_peer(&self, addr: Address) {
        if addr == self.address {
            return;
        }
        let mut state = self.state.write();
        if !state.peers.contains(&addr) {
            state.peers.push(addr);
        }
    }

    /// Processes an inbound message. Returns true if this was the first
    /// copy seen by this node.
    ///
    /// # Arguments
    ///
    /// * msg - the decoded message
    /// * from - the address of the node that forwarded it here
    ///
    fn handle_gossip_message(self: &Arc<Self>, msg: GossipMessage, from: &Address) -> bool {
        {
            let mut state = self.state.write();
            state.copies_received += 1;
            if !state.seen.insert(msg.id) {
                debug!("node {} already processed {}", self.id, msg.id);
                return false;
            }
            state.received.push(msg.clone());
            state.messages_received += 1;
        }

        match self.config.node_id(from) {
            Some(forwarder) => {
                if forwarder == msg.sender {
                    info!("node {} received gossip from node {}: {:?}", self.id, msg.sender, msg.content);
                } else {
                    info!(
                        "node {} received gossip from node {} (via node {}): {:?}",
                        self.id, msg.sender, forwarder, msg.content
                    );
                }
                if let Some(traces) = &self.traces {
                    traces.record(MessageTrace::new(&msg, forwarder, self.id));
                }
            }
            None => warn!("node {} received {} from unmapped address {}", self.id, msg.id, from),
        }

        if let Some(next) = msg.relayed() {
            if let Err(e) = self.spread(next) {
                warn!("node {} could not relay {}: {}", self.id, msg.id, e);
            }
        }
        true
    }

    /// Sends `msg` to a snapshot of the current peers, one detached task per
    /// peer. A failed delivery only costs that peer its copy.
    fn spread(self: &Arc<Self>, msg: GossipMessage) -> Result<(), GossipError> {
        let peers = self.state.read().peers.clone();
        if peers.is_empty() {
            return Ok(());
        }
        let body: Arc<[u8]> = msg.as_bytes()?.into();
        for peer in peers {
            let inner = self.clone();
            let body = body.clone();
            tokio::spawn(async move {
                match inner.node.send(&peer, tags::GOSSIP, &body) {
                    Ok(()) => inner.state.write().messages_sent += 1,
                    Err(e) => debug!("node {} could not gossip to {}: {}", inner.id, peer, e),
                }
            });
        }
        Ok(())
    }
}
