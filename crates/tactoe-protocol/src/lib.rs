//! Wire protocol and shared battle vocabulary for tactoe.
//!
//! This crate defines the "language" that clients, the server, and the
//! rule engine share:
//!
//! - **Types** ([`Player`], [`Piece`], [`Position`], [`PieceStack`],
//!   [`Holding`], [`WinLine`], [`BattleSituation`], ...): the board
//!   vocabulary and the per-viewer projection pushed to clients.
//! - **Messages** ([`Envelope`], [`Request`], [`Response`]): the remote
//!   procedure surface carried over the WebSocket.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how those messages are
//!   converted to/from bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Room (battle orchestration)
//! ```

mod codec;
mod error;
mod message;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use message::{Envelope, Payload, Request, Response, PROTOCOL_VERSION};
pub use types::{
    BattleSituation, Holding, Login, LoginId, Piece, PieceStack, Player,
    Position, Role, RoomId, ViewState, WinLine, MAX_PIECES_PER_SIZE,
};
