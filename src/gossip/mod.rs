pub mod gossip;
pub mod protocol;
pub mod trace;

/// Logical identifier of a node in a simulated network.
pub type NodeId = usize;

/// Hop budget given to a freshly created message.
pub const DEFAULT_TTL: u32 = 20;
/// Port of node 0; node `i` listens on `DEFAULT_BASE_PORT + i`.
pub const DEFAULT_BASE_PORT: u16 = 8000;
