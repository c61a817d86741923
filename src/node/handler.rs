use crate::error::NodeError;
use crate::protocol::protocol::unframe;
use crate::transport::transport::Envelope;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A callback invoked for every envelope carrying its tag. It receives the
/// envelope and the body with the tag prefix already stripped.
pub type Handler = Arc<dyn Fn(&Envelope, &[u8]) -> Result<(), NodeError> + Send + Sync>;

/// Routes envelopes to the handler registered for their tag.
///
/// Registering a second handler for a tag replaces the first one without
/// complaint, so two components claiming the same tag will silently shadow
/// each other.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<RwLock<HashMap<String, Handler>>>,
}

impl HandlerRegistry {
    pub fn new() -> HandlerRegistry {
        HandlerRegistry::default()
    }

    /// Registers `handler` for `tag` and returns the handler it replaced.
    pub fn register(&self, tag: &str, handler: Handler) -> Option<Handler> {
        self.handlers.write().insert(tag.to_string(), handler)
    }

    pub fn get(&self, tag: &str) -> Option<Handler> {
        self.handlers.read().get(tag).cloned()
    }

    /// Decodes the envelope's framed payload and invokes the matching
    /// handler. Returns `Ok(false)` if no handler is registered for the tag.
    ///
    /// # Arguments
    ///
    /// * msg - the envelope to be routed
    ///
    pub fn dispatch(&self, msg: &Envelope) -> Result<bool, NodeError> {
        // Clone the handler out so it runs without the registry lock held.
        let handler = match self.get(&msg.tag) {
            Some(handler) => handler,
            None => return Ok(false),
        };
        let body = unframe(&msg.tag, &msg.payload)?;
        handler(msg, body)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProtocolError;
    use crate::protocol::protocol::frame;
    use crate::transport::transport::Address;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn envelope(tag: &str, payload: Vec<u8>) -> Envelope {
        Envelope {
            from: Address::localhost(8000),
            to: Address::localhost(8001),
            tag: tag.to_string(),
            payload,
        }
    }

    #[test]
    fn routes_by_tag_with_prefix_stripped() {
        let registry = HandlerRegistry::new();
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        registry.register(
            "hello",
            Arc::new(move |_msg: &Envelope, body: &[u8]| {
                sink.lock().push(body.to_vec());
                Ok(())
            }),
        );
        assert!(registry.dispatch(&envelope("hello", frame("hello", b"Hi Alice!"))).unwrap());
        assert!(!registry.dispatch(&envelope("other", frame("other", b"x"))).unwrap());
        assert_eq!(*seen.lock(), vec![b"Hi Alice!".to_vec()]);
    }

    #[test]
    fn last_registration_wins() {
        let registry = HandlerRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let (f, s) = (first.clone(), second.clone());
        assert!(registry
            .register("t", Arc::new(move |_: &Envelope, _: &[u8]| {
                f.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .is_none());
        assert!(registry
            .register("t", Arc::new(move |_: &Envelope, _: &[u8]| {
                s.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }))
            .is_some());
        registry.dispatch(&envelope("t", frame("t", b""))).unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn mismatched_frame_never_reaches_handler() {
        let registry = HandlerRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c = calls.clone();
        registry.register(
            "gossip",
            Arc::new(move |_: &Envelope, _: &[u8]| {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        let err = registry.dispatch(&envelope("gossip", frame("gossipx", b"{}"))).unwrap_err();
        assert!(matches!(err, NodeError::Protocol(ProtocolError::TagMismatch { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
