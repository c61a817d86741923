use crate::error::TransportError;
use crate::transport::transport::{Address, Connection, Envelope, Network};
use crate::transport::MAX_DATAGRAM_LEN;
use crate::utils::utils::ByteRep;
use async_trait::async_trait;
use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket as StdUdpSocket};
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default)]
struct UdpState {
    listeners: HashSet<Address>,
    partitions: HashSet<Address>,
    outbound: Option<Arc<StdUdpSocket>>,
}

impl UdpState {
    fn is_cut(&self, msg: &Envelope) -> bool {
        self.partitions.contains(&msg.from) || self.partitions.contains(&msg.to)
    }
}

/// A network backed by real UDP sockets. Every envelope travels as one
/// JSON datagram. Delivery has the usual UDP semantics: nothing is
/// retransmitted and a send that would block is dropped.
///
/// Partition marks only affect this process's view of the network; an
/// envelope to or from a cut address is refused on send and discarded on
/// receipt.
#[derive(Debug, Clone, Default)]
pub struct UdpNetwork {
    state: Arc<RwLock<UdpState>>,
}

/// Resolves an address to the first socket address it names.
fn resolve(addr: &Address) -> Option<SocketAddr> {
    (addr.host.as_str(), addr.port).to_socket_addrs().ok()?.next()
}

impl UdpNetwork {
    pub fn new() -> UdpNetwork {
        UdpNetwork::default()
    }

    /// Returns the socket shared by every outgoing send, binding it on
    /// first use.
    fn outbound(&self) -> Result<Arc<StdUdpSocket>, TransportError> {
        if let Some(sock) = self.state.read().outbound.clone() {
            return Ok(sock);
        }
        let mut state = self.state.write();
        if let Some(sock) = state.outbound.clone() {
            return Ok(sock);
        }
        let sock = StdUdpSocket::bind("0.0.0.0:0")?;
        sock.set_nonblocking(true)?;
        let sock = Arc::new(sock);
        state.outbound = Some(sock.clone());
        Ok(sock)
    }

    fn connection(&self, addr: &Address, socket: Option<UdpSocket>) -> Result<Arc<dyn Connection>, TransportError> {
        Ok(Arc::new(UdpConnection {
            addr: addr.clone(),
            state: self.state.clone(),
            outbound: self.outbound()?,
            listening: socket.is_some(),
            socket: Mutex::new(socket.map(Arc::new)),
            closed: CancellationToken::new(),
        }))
    }
}

impl Network for UdpNetwork {
    /// Binds a UDP socket at `addr`. Must be called from within a tokio
    /// runtime.
    fn listen(&self, addr: &Address) -> Result<Arc<dyn Connection>, TransportError> {
        if self.state.read().listeners.contains(addr) {
            return Err(TransportError::AddressInUse(addr.clone()));
        }
        let target = resolve(addr).ok_or_else(|| TransportError::AddressNotFound(addr.clone()))?;
        let sock = StdUdpSocket::bind(target).map_err(|e| match e.kind() {
            ErrorKind::AddrInUse => TransportError::AddressInUse(addr.clone()),
            _ => TransportError::Io(e),
        })?;
        sock.set_nonblocking(true)?;
        let socket = UdpSocket::from_std(sock)?;
        self.state.write().listeners.insert(addr.clone());
        info!("Listening on {}", addr);
        self.connection(addr, Some(socket))
    }

    fn dial(&self, addr: &Address) -> Result<Arc<dyn Connection>, TransportError> {
        resolve(addr).ok_or_else(|| TransportError::AddressNotFound(addr.clone()))?;
        self.connection(addr, None)
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

struct UdpConnection {
    addr: Address,
    state: Arc<RwLock<UdpState>>,
    outbound: Arc<StdUdpSocket>,
    listening: bool,
    // Taken on close so the port is released while the connection lives on
    socket: Mutex<Option<Arc<UdpSocket>>>,
    closed: CancellationToken,
}

#[async_trait]
impl Connection for UdpConnection {
    fn send(&self, msg: Envelope) -> Result<(), TransportError> {
        if self.state.read().is_cut(&msg) {
            return Err(TransportError::Partitioned);
        }
        let dest = resolve(&msg.to).ok_or_else(|| TransportError::DestinationNotFound(msg.to.clone()))?;
        let bytes = msg.as_bytes()?;
        match self.outbound.send_to(&bytes, dest) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::WouldBlock => Err(TransportError::QueueFull(msg.to)),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    async fn recv(&self) -> Result<Envelope, TransportError> {
        let socket = self.socket.lock().clone().ok_or(TransportError::ConnectionClosed)?;
        let mut buf = vec![0u8; MAX_DATAGRAM_LEN];
        loop {
            let (amt, src) = tokio::select! {
                biased;
                _ = self.closed.cancelled() => return Err(TransportError::ConnectionClosed),
                res = socket.recv_from(&mut buf) => res?,
            };
            match Envelope::from_bytes(&buf[..amt]) {
                Ok(msg) if self.state.read().is_cut(&msg) => {
                    debug!("Discarding datagram from partitioned peer {}", msg.from);
                }
                Ok(msg) => return Ok(msg),
                Err(e) => info!("Dropping undecodable datagram from {:?}: {:?}", src, e),
            }
        }
    }

    fn close(&self) {
        if self.closed.is_cancelled() {
            return;
        }
        self.closed.cancel();
        if self.listening {
            self.socket.lock().take();
            self.state.write().listeners.remove(&self.addr);
            info!("Closed listener {}", self.addr);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn free_port() -> u16 {
        StdUdpSocket::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
    }

    fn envelope(from: &Address, to: &Address) -> Envelope {
        Envelope {
            from: from.clone(),
            to: to.clone(),
            tag: "hello".to_string(),
            payload: b"hello:hi".to_vec(),
        }
    }

    #[tokio::test]
    async fn datagram_round_trip() {
        let net = UdpNetwork::new();
        let a = Address::localhost(free_port());
        let b = Address::localhost(free_port());
        let inbox = net.listen(&b).unwrap();
        net.dial(&b).unwrap().send(envelope(&a, &b)).unwrap();
        let got = tokio::time::timeout(Duration::from_secs(2), inbox.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got, envelope(&a, &b));
    }

    #[tokio::test]
    async fn bind_conflict_is_address_in_use() {
        let net = UdpNetwork::new();
        let a = Address::localhost(free_port());
        let _first = net.listen(&a).unwrap();
        assert!(matches!(net.listen(&a), Err(TransportError::AddressInUse(_))));
    }

    #[tokio::test]
    async fn close_releases_the_port() {
        let net = UdpNetwork::new();
        let a = Address::localhost(free_port());
        let first = net.listen(&a).unwrap();
        first.close();
        let second = net.listen(&a).unwrap();
        net.dial(&a).unwrap().send(envelope(&a, &a)).unwrap();
        let got = tokio::time::timeout(Duration::from_secs(2), second.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.to, a);
        assert!(matches!(first.recv().await, Err(TransportError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn second_listener_in_process_is_refused() {
        let net = UdpNetwork::new();
        let a = Address::localhost(free_port());
        let _first = net.listen(&a).unwrap();
        // Rejected from the registry before any bind is attempted.
        assert!(matches!(net.clone().listen(&a), Err(TransportError::AddressInUse(addr)) if addr == a));
    }

    #[tokio::test]
    async fn close_unblocks_recv() {
        let net = UdpNetwork::new();
        let inbox = net.listen(&Address::localhost(free_port())).unwrap();
        let waiter = {
            let inbox = inbox.clone();
            tokio::spawn(async move { inbox.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        inbox.close();
        inbox.close();
        let res = tokio::time::timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert!(matches!(res, Err(TransportError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn partitioned_sends_are_refused() {
        let net = UdpNetwork::new();
        let a = Address::localhost(free_port());
        let b = Address::localhost(free_port());
        let _inbox = net.listen(&b).unwrap();
        let conn = net.dial(&b).unwrap();
        net.partition(&[a.clone()], &[b.clone()]);
        assert!(matches!(conn.send(envelope(&a, &b)), Err(TransportError::Partitioned)));
        net.heal();
        conn.send(envelope(&a, &b)).unwrap();
    }
}
