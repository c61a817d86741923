use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte length of a message key, 128 bits.
pub const KEY_LEN: usize = 16;

/// The separator between a tag and the body of a framed payload.
pub const TAG_DELIMITER: char = ':';

/// The inner representation of a message key.
pub type InnerKey = [u8; KEY_LEN];

/// Tags used to route envelopes to the proper handler once they have been
/// received. Each tag is the prefix of a framed payload.
pub mod tags {
    /// A gossip message spreading through the network.
    pub const GOSSIP: &str = "gossip";
    /// A request for the receiver's peer list.
    pub const DISCOVER: &str = "discover";
    /// A reply carrying a peer list.
    pub const PEERS: &str = "peers";
}

/// A tuple struct containing a 128 bit random key. Two messages with the
/// same key are the same logical message. Rendered as lowercase hex.
#[derive(Ord, PartialOrd, PartialEq, Eq, Clone, Hash, Default, Copy, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct MessageKey(InnerKey);

impl MessageKey {
    /// generates a new Message Key from a 16 byte array
    pub fn new(v: InnerKey) -> Self {
        MessageKey(v)
    }

    /// Generate a random key
    pub fn rand() -> Self {
        MessageKey(rand::random::<InnerKey>())
    }

    /// Return the hex encoding of the key
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for MessageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageKey({})", self.to_hex())
    }
}

impl From<MessageKey> for String {
    fn from(key: MessageKey) -> String {
        key.to_hex()
    }
}

impl TryFrom<String> for MessageKey {
    type Error = hex::FromHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let mut inner = [0u8; KEY_LEN];
        hex::decode_to_slice(value, &mut inner)?;
        Ok(MessageKey(inner))
    }
}

/// Frames a body as `"<tag>:<body>"`.
///
/// # Arguments
///
/// * tag - the handler tag the receiver will route on
/// * body - the encoded message body
///
pub fn frame(tag: &str, body: &[u8]) -> Vec<u8> {
    let mut payload = Vec::with_capacity(tag.len() + 1 + body.len());
    payload.extend_from_slice(tag.as_bytes());
    payload.push(TAG_DELIMITER as u8);
    payload.extend_from_slice(body);
    payload
}

/// Splits a framed payload into its tag and body at the first delimiter.
pub fn split(payload: &[u8]) -> Result<(&str, &[u8]), ProtocolError> {
    let idx = payload
        .iter()
        .position(|b| *b == TAG_DELIMITER as u8)
        .ok_or(ProtocolError::MissingDelimiter)?;
    let tag = std::str::from_utf8(&payload[..idx]).map_err(|_| ProtocolError::MissingDelimiter)?;
    Ok((tag, &payload[idx + 1..]))
}

/// Returns the body of a framed payload, checking that it was framed with
/// the `expected` tag. A mismatch is an error, never a shifted body.
pub fn unframe<'a>(expected: &str, payload: &'a [u8]) -> Result<&'a [u8], ProtocolError> {
    let (tag, body) = split(payload)?;
    if tag != expected {
        return Err(ProtocolError::TagMismatch {
            expected: expected.to_string(),
            found: tag.to_string(),
        });
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_random_and_hex_rendered() {
        let a = MessageKey::rand();
        let b = MessageKey::rand();
        assert_ne!(a, b);
        assert_eq!(a.to_hex().len(), KEY_LEN * 2);
        assert!(a.to_string().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn keys_serialize_as_hex_strings() {
        let key = MessageKey::new([0xab; KEY_LEN]);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", "ab".repeat(KEY_LEN)));
        let back: MessageKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
        assert!(serde_json::from_str::<MessageKey>("\"abcd\"").is_err());
    }

    #[test]
    fn unframe_returns_body() {
        let payload = frame(tags::GOSSIP, br#"{"a":1}"#);
        assert_eq!(payload, br#"gossip:{"a":1}"#.to_vec());
        assert_eq!(unframe(tags::GOSSIP, &payload).unwrap(), br#"{"a":1}"#);
    }

    #[test]
    fn body_may_contain_delimiter() {
        let payload = frame("reply", b"time: 12:00");
        assert_eq!(unframe("reply", &payload).unwrap(), b"time: 12:00");
    }

    #[test]
    fn mismatched_tag_is_rejected() {
        let payload = frame("gossips", b"{}");
        match unframe(tags::GOSSIP, &payload) {
            Err(ProtocolError::TagMismatch { expected, found }) => {
                assert_eq!(expected, "gossip");
                assert_eq!(found, "gossips");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(unframe(tags::GOSSIP, b"gossip"), Err(ProtocolError::MissingDelimiter)));
    }
}
