pub mod mock;
pub mod transport;
pub mod udp;

/// Number of envelopes a simulated inbox buffers before sends are dropped.
pub const INBOX_CAPACITY: usize = 100;
/// Largest datagram the UDP transport will read.
pub const MAX_DATAGRAM_LEN: usize = 65536;
