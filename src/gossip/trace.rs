use crate::gossip::protocol::GossipMessage;
use crate::gossip::NodeId;
use crate::protocol::protocol::MessageKey;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One record per first reception of a message by a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageTrace {
    pub timestamp: DateTime<Utc>,
    pub message_id: MessageKey,
    pub original_sender: NodeId,
    pub immediate_forwarder: NodeId,
    pub receiver: NodeId,
    pub content: String,
    /// The ttl the message carried when it arrived
    pub ttl: u32,
    pub is_direct: bool,
}

impl MessageTrace {
    pub fn new(msg: &GossipMessage, immediate_forwarder: NodeId, receiver: NodeId) -> MessageTrace {
        MessageTrace {
            timestamp: Utc::now(),
            message_id: msg.id,
            original_sender: msg.sender,
            immediate_forwarder,
            receiver,
            content: msg.content.clone(),
            ttl: msg.ttl,
            is_direct: msg.sender == immediate_forwarder,
        }
    }
}

/// An append-only trace log shared by every node of a simulation.
///
/// The log has its own lock. Nodes append only after releasing their own
/// state lock, so the two are never held together.
#[derive(Debug, Clone, Default)]
pub struct TraceLog {
    traces: Arc<Mutex<Vec<MessageTrace>>>,
}

impl TraceLog {
    pub fn new() -> TraceLog {
        TraceLog::default()
    }

    pub fn record(&self, trace: MessageTrace) {
        self.traces.lock().push(trace);
    }

    /// Returns a copy of every record so far, in arrival order.
    pub fn snapshot(&self) -> Vec<MessageTrace> {
        self.traces.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.traces.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
