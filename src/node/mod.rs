pub mod handler;
pub mod node;
