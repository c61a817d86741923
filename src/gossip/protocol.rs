use crate::gossip::NodeId;
use crate::impl_ByteRep;
use crate::protocol::protocol::MessageKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

impl_ByteRep!(for GossipMessage);

/// A piece of information spreading through the network. Identity is the
/// `id` alone; the other fields travel along with it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GossipMessage {
    pub id: MessageKey,
    pub content: String,
    /// The node that created the message
    pub sender: NodeId,
    pub timestamp: DateTime<Utc>,
    /// Hops remaining
    pub ttl: u32,
}

impl GossipMessage {
    /// Creates a message with a fresh random id, stamped now.
    pub fn new(content: impl Into<String>, sender: NodeId, ttl: u32) -> GossipMessage {
        GossipMessage {
            id: MessageKey::rand(),
            content: content.into(),
            sender,
            timestamp: Utc::now(),
            ttl,
        }
    }

    /// Returns the copy to forward one hop further, or None once the hop
    /// budget is spent.
    pub fn relayed(&self) -> Option<GossipMessage> {
        let ttl = self.ttl.checked_sub(1)?;
        Some(GossipMessage {
            ttl,
            ..self.clone()
        })
    }
}
