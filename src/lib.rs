pub mod builder;
pub mod error;
pub mod gossip;
pub mod node;
pub mod protocol;
pub mod transport;
pub mod utils;
pub mod visualization;
