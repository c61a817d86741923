pub mod builder;

use std::time::Duration;

/// Host every simulated node listens on.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Pause after starting the nodes so every receive loop is polling.
pub const DEFAULT_SETTLE: Duration = Duration::from_millis(100);
