//! Server configuration.

use std::time::Duration;

/// Connection-level tuning for [`TactoeServer`](crate::TactoeServer).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// A connection with no open room stream that sends nothing for this
    /// long is closed. Default: 10 minutes.
    pub idle_timeout: Duration,

    /// Time a new client gets to finish the WebSocket upgrade and send its
    /// `Handshake`. Default: 5 seconds.
    pub handshake_timeout: Duration,

    /// On shutdown, how long open connections get to wind down before
    /// they are aborted. Default: 5 seconds.
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(600),
            handshake_timeout: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(5),
        }
    }
}
