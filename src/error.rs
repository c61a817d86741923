//! Error types for gossipnet.

use std::path::PathBuf;

use thiserror::Error;

use crate::transport::transport::Address;

/// Errors raised by a [`Network`](crate::transport::transport::Network) or
/// [`Connection`](crate::transport::transport::Connection).
///
/// Every variant is an expected condition in a lossy network. None of them
/// should abort the node that observed it.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Another listener already owns the address.
    #[error("address already in use: {0}")]
    AddressInUse(Address),

    /// Nothing is listening at (or resolvable for) the dialed address.
    #[error("address not found: {0}")]
    AddressNotFound(Address),

    /// The destination inbox is saturated; the message was dropped.
    #[error("message queue full for {0}")]
    QueueFull(Address),

    /// One of the endpoints is cut off from the network.
    #[error("network partitioned")]
    Partitioned,

    /// The listener for the destination disappeared before delivery.
    #[error("destination address not found: {0}")]
    DestinationNotFound(Address),

    /// The connection was closed and no buffered messages remain.
    #[error("connection closed")]
    ConnectionClosed,

    /// Socket level failure.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// An envelope could not be put on or taken off the wire.
    #[error("codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Errors decoding a framed `"<tag>:<body>"` payload.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The payload carried no `:` separator.
    #[error("payload has no tag delimiter")]
    MissingDelimiter,

    /// The payload prefix does not match the envelope tag.
    #[error("payload tagged {found:?}, expected {expected:?}")]
    TagMismatch {
        /// Tag carried by the envelope.
        expected: String,
        /// Tag found in front of the payload.
        found: String,
    },

    /// The body is not valid JSON for the expected type.
    #[error("malformed body: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by the dispatch [`Node`](crate::node::node::Node).
#[derive(Debug, Error)]
pub enum NodeError {
    /// Transport failure while listening, dialing or sending.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Inbound payload could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Errors from the gossip layer.
#[derive(Debug, Error)]
pub enum GossipError {
    /// The message could not be serialized.
    #[error("failed to encode gossip message: {0}")]
    Encode(#[from] serde_json::Error),

    /// The underlying dispatch node failed.
    #[error(transparent)]
    Node(#[from] NodeError),
}

/// Errors building a simulated network.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A network needs at least one node.
    #[error("node count must be at least 1")]
    InvalidNodeCount,

    /// One node could not be created; the build is aborted.
    #[error("failed to create node {index}: {source}")]
    NodeCreation {
        /// Index of the node that failed.
        index: usize,
        /// Underlying cause.
        #[source]
        source: NodeError,
    },
}

/// Errors writing the visualization export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The output directory could not be created.
    #[error("failed to create output directory {path:?}: {source}")]
    CreateDir {
        /// Directory that was requested.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: std::io::Error,
    },

    /// The export document could not be serialized.
    #[error("failed to serialize visualization data: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The export file could not be written.
    #[error("failed to write visualization file {path:?}: {source}")]
    Write {
        /// File that was being written.
        path: PathBuf,
        /// Underlying cause.
        #[source]
        source: std::io::Error,
    },
}
