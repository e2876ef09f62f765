//! Unified error type for the tactoe server.

use tactoe_protocol::ProtocolError;
use tactoe_room::{ErrorKind, RoomError};
use tactoe_session::SessionError;
use tactoe_store::StoreError;

use crate::TransportError;

/// Message sent to clients in place of an internal error's details.
pub(crate) const INTERNAL_MESSAGE: &str = "internal error";

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TactoeError {
    /// A transport-level error (bind, accept, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A login failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A room operation failed.
    #[error(transparent)]
    Room(#[from] RoomError),
}

impl TactoeError {
    /// The HTTP-style status code reported to the client.
    ///
    /// | code | meaning |
    /// |------|---------|
    /// | 400  | malformed or invalid request; nothing changed |
    /// | 404  | the room does not exist |
    /// | 412  | valid request, wrong battle or session state |
    /// | 500  | internal fault |
    /// | 503  | store unavailable or too contended |
    pub fn code(&self) -> u16 {
        match self {
            Self::Protocol(_) => 400,
            Self::Transport(_) => 503,
            Self::Session(SessionError::InvalidLogin(_)) => 400,
            Self::Session(SessionError::SessionMismatch(_)) => 412,
            Self::Session(SessionError::Store(e)) => match e {
                StoreError::NotFound(_) => 404,
                StoreError::Unavailable(_) | StoreError::Conflict { .. } => 503,
                StoreError::WrongType(_) => 500,
            },
            Self::Room(e) => match e.kind() {
                ErrorKind::Validation => 400,
                ErrorKind::Precondition => 412,
                ErrorKind::NotFound | ErrorKind::Left => 404,
                ErrorKind::Unavailable => 503,
                ErrorKind::Internal => 500,
            },
        }
    }

    pub fn is_internal(&self) -> bool {
        self.code() == 500
    }

    /// What the client is told. Internal details stay in the server log.
    pub(crate) fn client_message(&self) -> String {
        if self.is_internal() {
            INTERNAL_MESSAGE.to_string()
        } else {
            self.to_string()
        }
    }
}
