//! # tactoe
//!
//! Real-time stacking tic-tac-toe battles over WebSocket.
//!
//! Two players take turns placing small, medium, and large pieces on a
//! 3×3 board; a larger piece may cover a smaller one, and a player may
//! pick one of their own uncovered pieces back up instead of placing.
//! Any number of viewers can watch a room; each gets the battle projected
//! to their side of the board.
//!
//! This crate is the server: it accepts WebSocket clients, runs the
//! handshake, and dispatches each request to the room and login layers.
//! All room state lives in a [`MemDb`](tactoe_store::MemDb), so any number
//! of server tasks can serve the same rooms.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tactoe::prelude::*;
//!
//! # async fn start() -> Result<(), TactoeError> {
//! let db = Arc::new(MemoryDb::new(StoreConfig::default()));
//! let server = TactoeServerBuilder::new()
//!     .bind("0.0.0.0:50051")
//!     .build(db)
//!     .await?;
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

mod config;
mod error;
mod handler;
mod server;
mod transport;

pub use config::ServerConfig;
pub use error::TactoeError;
pub use server::{TactoeServer, TactoeServerBuilder};
pub use transport::{
    ConnectionId, FrameSink, FrameStream, Incoming, TransportError, WebSocketConnection,
    WebSocketListener,
};

/// Everything needed to run a server and talk to it.
pub mod prelude {
    pub use crate::{ServerConfig, TactoeError, TactoeServer, TactoeServerBuilder, TransportError};
    pub use tactoe_battle::{Battle, ManagementState, RuleError};
    pub use tactoe_protocol::{
        BattleSituation, Codec, Envelope, Holding, JsonCodec, Login, LoginId, PROTOCOL_VERSION,
        Payload, Piece, PieceStack, Player, Position, ProtocolError, Request, Response, Role,
        RoomId, ViewState, WinLine,
    };
    pub use tactoe_room::{BattleInteractor, ErrorKind, RoomConfig, RoomError};
    pub use tactoe_session::{LoginManager, SessionConfig, SessionError};
    pub use tactoe_store::{MemDb, MemoryDb, StoreConfig, StoreError, spawn_sweeper};
}
