//! `TactoeServer` builder and server loop.
//!
//! This is the entry point for running a tactoe battle server. It ties
//! together all the layers: transport → protocol → session/room → store.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tactoe_protocol::{Codec, Envelope, JsonCodec, Payload, Response};
use tactoe_room::{BattleInteractor, RoomConfig};
use tactoe_session::{LoginManager, SessionConfig};
use tactoe_store::MemDb;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::handler::handle_connection;
use crate::{ServerConfig, TactoeError, WebSocketListener};

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks. Everything
/// in it is either immutable or talks to the store, so there is no lock.
pub(crate) struct ServerState<D: MemDb, C: Codec> {
    pub(crate) rooms: BattleInteractor<D>,
    pub(crate) logins: LoginManager<D>,
    pub(crate) codec: C,
    pub(crate) config: ServerConfig,
    started: Instant,
}

impl<D: MemDb, C: Codec> ServerState<D, C> {
    /// Milliseconds since the server started.
    pub(crate) fn uptime_millis(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Wraps a response for the call `seq`.
    pub(crate) fn envelope(&self, seq: u64, response: Response) -> Envelope {
        Envelope {
            seq,
            timestamp: self.uptime_millis(),
            payload: Payload::Response(response),
        }
    }
}

/// Builder for configuring and starting a tactoe server.
///
/// # Example
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use tactoe::prelude::*;
///
/// # async fn start() -> Result<(), TactoeError> {
/// let db = Arc::new(MemoryDb::new(StoreConfig::default()));
/// let server = TactoeServerBuilder::new()
///     .bind("0.0.0.0:50051")
///     .build(db)
///     .await?;
/// server.run().await
/// # }
/// ```
pub struct TactoeServerBuilder {
    bind_addr: String,
    server_config: ServerConfig,
    room_config: RoomConfig,
    session_config: SessionConfig,
}

impl TactoeServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:50051".to_string(),
            server_config: ServerConfig::default(),
            room_config: RoomConfig::default(),
            session_config: SessionConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    pub fn server_config(mut self, config: ServerConfig) -> Self {
        self.server_config = config;
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    pub fn session_config(mut self, config: SessionConfig) -> Self {
        self.session_config = config;
        self
    }

    /// Binds the listener and wires rooms and logins to `db`.
    ///
    /// Uses `JsonCodec` on the wire.
    pub async fn build<D: MemDb>(self, db: Arc<D>) -> Result<TactoeServer<D, JsonCodec>, TactoeError> {
        let listener = WebSocketListener::bind(&self.bind_addr).await?;

        let state = Arc::new(ServerState {
            rooms: BattleInteractor::new(Arc::clone(&db), self.room_config),
            logins: LoginManager::new(db, self.session_config),
            codec: JsonCodec,
            config: self.server_config,
            started: Instant::now(),
        });

        Ok(TactoeServer { listener, state })
    }
}

impl Default for TactoeServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound tactoe server.
///
/// Call [`run()`](Self::run) or [`run_until()`](Self::run_until) to start
/// accepting connections.
pub struct TactoeServer<D: MemDb, C: Codec> {
    listener: WebSocketListener,
    state: Arc<ServerState<D, C>>,
}

impl<D: MemDb, C: Codec> TactoeServer<D, C> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, TactoeError> {
        Ok(self.listener.local_addr()?)
    }

    /// Runs the accept loop until the process is terminated.
    pub async fn run(self) -> Result<(), TactoeError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs the accept loop until `shutdown` completes.
    ///
    /// Each accepted client gets its own task. On shutdown the listener
    /// stops accepting, every connection is told to close, and whatever
    /// is still open after [`ServerConfig::shutdown_grace`] is aborted.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<(), TactoeError> {
        info!(addr = %self.local_addr()?, "tactoe server running");

        let (stop_tx, _) = watch::channel(false);
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(incoming) => {
                        let state = Arc::clone(&self.state);
                        let stop = stop_tx.subscribe();
                        connections.spawn(async move {
                            let peer = incoming.peer_addr();
                            let conn = match incoming.upgrade(state.config.handshake_timeout).await {
                                Ok(conn) => conn,
                                Err(e) => {
                                    debug!(%peer, error = %e, "WebSocket upgrade failed");
                                    return;
                                }
                            };
                            if let Err(e) = handle_connection(conn, state, stop).await {
                                debug!(%peer, error = %e, "connection ended with error");
                            }
                        });
                    }
                    Err(e) => error!(error = %e, "accept failed"),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        info!(open = connections.len(), "shutting down");
        let _ = stop_tx.send(true);

        let grace = self.state.config.shutdown_grace;
        let drained = tokio::time::timeout(grace, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(open = connections.len(), "grace period over, aborting connections");
            connections.shutdown().await;
        }

        info!("tactoe server stopped");
        Ok(())
    }
}
