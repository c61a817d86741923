use crate::error::TransportError;
use crate::impl_ByteRep;
use crate::utils::utils::hex_bytes;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

impl_ByteRep!(for Address, Envelope);

/// A host and port pair identifying a listener in a network.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address {
    pub host: String,
    pub port: u16,
}

impl Address {
    pub fn new(host: impl Into<String>, port: u16) -> Address {
        Address {
            host: host.into(),
            port,
        }
    }

    /// An address on the loopback interface
    pub fn localhost(port: u16) -> Address {
        Address::new("127.0.0.1", port)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A message on the wire. The tag selects the handler on the receiving
/// node and the payload holds the framed body (see `protocol::frame`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub from: Address,
    pub to: Address,
    pub tag: String,
    #[serde(with = "hex_bytes")]
    pub payload: Vec<u8>,
}

/// A network that nodes can listen on and dial into.
///
/// Implementations must be cheap to share between tasks; every node of a
/// simulation holds a handle to the same network.
pub trait Network: Send + Sync {
    /// Registers a listener at `addr` and returns its connection.
    fn listen(&self, addr: &Address) -> Result<Arc<dyn Connection>, TransportError>;

    /// Returns a connection that can send to `addr`.
    fn dial(&self, addr: &Address) -> Result<Arc<dyn Connection>, TransportError>;

    /// Cuts every address in both groups off from the network. Sends from
    /// or to a cut address fail until [`Network::heal`] is called.
    fn partition(&self, group_a: &[Address], group_b: &[Address]);

    /// Clears every partition mark.
    fn heal(&self);
}

/// One end of a network connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Delivers an envelope to the inbox of `msg.to`. Never blocks; a full
    /// inbox is reported as [`TransportError::QueueFull`].
    fn send(&self, msg: Envelope) -> Result<(), TransportError>;

    /// Waits for the next envelope. Yields
    /// [`TransportError::ConnectionClosed`] once the connection is closed
    /// and no buffered envelopes remain.
    async fn recv(&self) -> Result<Envelope, TransportError>;

    /// Closes the connection and wakes pending receivers. Calling it more
    /// than once has no effect.
    fn close(&self);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::utils::ByteRep;

    #[test]
    fn address_renders_host_and_port() {
        assert_eq!(Address::localhost(8000).to_string(), "127.0.0.1:8000");
        assert_eq!(Address::new("node-a", 9).to_string(), "node-a:9");
    }

    #[test]
    fn envelope_payload_is_hex_on_the_wire() {
        let envelope = Envelope {
            from: Address::localhost(8000),
            to: Address::localhost(8001),
            tag: "gossip".to_string(),
            payload: b"gossip:{}".to_vec(),
        };
        let bytes = envelope.as_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        assert!(text.contains(&hex::encode(b"gossip:{}")));
        assert_eq!(Envelope::from_bytes(&bytes).unwrap(), envelope);
    }
}
