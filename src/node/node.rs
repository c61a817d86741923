use crate::error::{NodeError, TransportError};
use crate::node::handler::{Handler, HandlerRegistry};
use crate::protocol::protocol::frame;
use crate::transport::transport::{Address, Connection, Envelope, Network};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// A listening endpoint that decodes inbound envelopes and routes them to
/// handlers registered by tag, plus convenience methods for sending.
pub struct Node {
    address: Address,
    network: Arc<dyn Network>,
    conn: Arc<dyn Connection>,
    handlers: HandlerRegistry,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Node {
    /// Creates a node listening at `address`.
    ///
    /// # Arguments
    ///
    /// * network - the network to listen on and dial through
    /// * address - the local listening address
    ///
    pub fn new(network: Arc<dyn Network>, address: Address) -> Result<Node, NodeError> {
        let conn = network.listen(&address)?;
        Ok(Node {
            address,
            network,
            conn,
            handlers: HandlerRegistry::new(),
            task: Mutex::new(None),
        })
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Registers a handler for `tag`. A later registration for the same tag
    /// replaces this one.
    pub fn handle<F>(&self, tag: &str, handler: F)
    where
        F: Fn(&Envelope, &[u8]) -> Result<(), NodeError> + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        if self.handlers.register(tag, handler).is_some() {
            debug!("{} replaced the handler for tag {:?}", self.address, tag);
        }
    }

    /// Spawns the receive loop. Calling it on a running node does nothing.
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        let mut task = self.task.lock();
        if task.is_some() {
            return;
        }
        let conn = self.conn.clone();
        let handlers = self.handlers.clone();
        let address = self.address.clone();
        *task = Some(tokio::spawn(receive_loop(address, conn, handlers)));
    }

    /// Returns true while the receive loop is alive.
    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .map(|task| !task.is_finished())
            .unwrap_or(false)
    }

    /// Dials `to` and sends a single envelope framed with `tag`.
    ///
    /// # Arguments
    ///
    /// * to - the destination address
    /// * tag - the handler tag on the receiving node
    /// * body - the message body
    ///
    pub fn send(&self, to: &Address, tag: &str, body: &[u8]) -> Result<(), NodeError> {
        let conn = self.network.dial(to)?;
        conn.send(Envelope {
            from: self.address.clone(),
            to: to.clone(),
            tag: tag.to_string(),
            payload: frame(tag, body),
        })?;
        Ok(())
    }

    pub fn send_string(&self, to: &Address, tag: &str, text: &str) -> Result<(), NodeError> {
        self.send(to, tag, text.as_bytes())
    }

    /// Sends a text reply to the sender of `msg`.
    pub fn reply_string(&self, msg: &Envelope, tag: &str, text: &str) -> Result<(), NodeError> {
        self.send_string(&msg.from, tag, text)
    }

    /// Closes the connection, which ends the receive loop once buffered
    /// envelopes are drained.
    pub fn close(&self) {
        self.conn.close();
    }
}

/// Receives envelopes until the connection is closed. Neither handler
/// failures nor undecodable envelopes end the loop.
async fn receive_loop(address: Address, conn: Arc<dyn Connection>, handlers: HandlerRegistry) {
    loop {
        match conn.recv().await {
            Ok(msg) => match handlers.dispatch(&msg) {
                Ok(true) => {}
                Ok(false) => warn!("{} has no handler for tag {:?} from {}", address, msg.tag, msg.from),
                Err(e) => warn!("{} failed to handle {:?} from {}: {}", address, msg.tag, msg.from, e),
            },
            Err(TransportError::ConnectionClosed) => {
                info!("{} stopped receiving", address);
                break;
            }
            Err(e) => {
                warn!("{} receive error: {}", address, e);
                tokio::task::yield_now().await;
            }
        }
    }
}
