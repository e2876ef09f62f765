//! The remote procedure surface carried over the WebSocket.
//!
//! Every frame is an [`Envelope`]. Clients send [`Payload::Request`]s; the
//! server answers with [`Payload::Response`]s carrying the same `seq`, so a
//! client can have several calls in flight on one connection. `EnterRoom`
//! is the only streaming call: it is answered by any number of
//! [`Response::Situation`] frames followed by one [`Response::StreamEnd`].

use serde::{Deserialize, Serialize};

use crate::{BattleSituation, Login, LoginId, Piece, Player, RoomId};

/// The current protocol version. Clients must send this in their
/// handshake or be rejected.
pub const PROTOCOL_VERSION: u32 = 1;

/// A call from client to server.
///
/// Internally tagged on `method`:
/// `{ "method": "Attack", "room_id": "12345", "player": "A", ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum Request {
    /// Must be the first frame on a connection.
    Handshake { version: u32 },

    /// Start (or resume) a login session. `session_id` is the token from
    /// an earlier login, if the client kept one.
    Login {
        login_id: LoginId,
        #[serde(default)]
        session_id: Option<String>,
    },

    Logout { login_id: LoginId },

    CreateRoom,

    CanEnterRoom { room_id: RoomId, login_id: LoginId },

    /// Join the room's membership and open a stream of situations.
    EnterRoom { room_id: RoomId, login_id: LoginId },

    /// Claim a player seat.
    Declaration { room_id: RoomId, login_id: LoginId },

    LeaveRoom { room_id: RoomId, login_id: LoginId },

    /// Place a piece. `position` is a raw cell index; off-board values
    /// are answered with a validation error rather than a decode error.
    Attack {
        room_id: RoomId,
        player: Player,
        position: u8,
        piece: Piece,
    },

    /// Lift one of your own pieces back into hand.
    Pick {
        room_id: RoomId,
        player: Player,
        position: u8,
        piece: Piece,
    },

    ResetBattle { room_id: RoomId },
}

impl Request {
    /// The method name, used as a log field.
    pub fn method(&self) -> &'static str {
        match self {
            Self::Handshake { .. } => "Handshake",
            Self::Login { .. } => "Login",
            Self::Logout { .. } => "Logout",
            Self::CreateRoom => "CreateRoom",
            Self::CanEnterRoom { .. } => "CanEnterRoom",
            Self::EnterRoom { .. } => "EnterRoom",
            Self::Declaration { .. } => "Declaration",
            Self::LeaveRoom { .. } => "LeaveRoom",
            Self::Attack { .. } => "Attack",
            Self::Pick { .. } => "Pick",
            Self::ResetBattle { .. } => "ResetBattle",
        }
    }
}

/// A reply from server to client. Tagged on `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Response {
    HandshakeAck { server_time: u64 },

    LoggedIn { login: Login },

    RoomCreated { room_id: RoomId },

    CanEnterRoom { can_enter: bool },

    /// Empty success for unary calls.
    Ok,

    /// One pushed view on an `EnterRoom` stream.
    Situation { situation: BattleSituation },

    /// The `EnterRoom` stream ended cleanly (the viewer left the room).
    StreamEnd,

    /// The call failed. `code` follows HTTP conventions (400 validation,
    /// 404 not found, 412 precondition, 500 internal, 503 unavailable).
    Error { code: u16, message: String },
}

/// What's inside an envelope.
///
/// Adjacently tagged:
/// `{ "type": "Request", "data": { "method": "CreateRoom" } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    Request(Request),
    Response(Response),
}

/// The top-level wire frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Call identifier. Chosen by the client for requests and echoed by
    /// the server on every response (and stream frame) for that call.
    pub seq: u64,

    /// Milliseconds since the sender started. Informational.
    #[serde(default)]
    pub timestamp: u64,

    pub payload: Payload,
}
