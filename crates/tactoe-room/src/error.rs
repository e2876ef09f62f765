//! Error types for the room layer.

use tactoe_battle::RuleError;
use tactoe_protocol::{LoginId, RoomId};
use tactoe_store::StoreError;

/// How a caller should treat a [`RoomError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself was wrong. Nothing changed; don't retry.
    Validation,
    /// The request was fine but the battle isn't in a state to accept it.
    Precondition,
    /// The room or snapshot doesn't exist (yet, or any more).
    NotFound,
    /// The viewer is no longer a member. Ends a stream cleanly.
    Left,
    /// The store is down or too contended.
    Unavailable,
    /// A bug or corrupt data. Log it; tell the client nothing specific.
    Internal,
}

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// A move was rejected by the rules.
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// The room does not exist or has expired.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The login is no longer a member of the room.
    #[error("{login_id} already left room {room_id}")]
    Left { room_id: RoomId, login_id: LoginId },

    /// Every append attempt lost to a concurrent writer.
    #[error("room {room_id} is too busy: {attempts} conflicting updates")]
    Contended { room_id: RoomId, attempts: usize },

    /// A snapshot could not be encoded or decoded.
    #[error("bad snapshot in room {room_id}: {source}")]
    Snapshot {
        room_id: RoomId,
        #[source]
        source: serde_json::Error,
    },

    /// The store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Another error, annotated with the operation it broke.
    #[error("failed to {op}: {source}")]
    Context {
        op: &'static str,
        #[source]
        source: Box<RoomError>,
    },
}

impl RoomError {
    /// Classifies the error, looking through any context wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Rule(e) if e.is_internal() => ErrorKind::Internal,
            Self::Rule(e) if e.is_precondition() => ErrorKind::Precondition,
            Self::Rule(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Left { .. } => ErrorKind::Left,
            Self::Contended { .. } => ErrorKind::Unavailable,
            Self::Snapshot { .. } => ErrorKind::Internal,
            Self::Store(StoreError::NotFound(_)) => ErrorKind::NotFound,
            Self::Store(StoreError::Unavailable(_) | StoreError::Conflict { .. }) => {
                ErrorKind::Unavailable
            }
            Self::Store(StoreError::WrongType(_)) => ErrorKind::Internal,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// The innermost error, with every context wrapper removed.
    pub fn root(&self) -> &RoomError {
        match self {
            Self::Context { source, .. } => source.root(),
            other => other,
        }
    }

    /// Wraps `self` with the name of the operation that failed.
    pub fn context(self, op: &'static str) -> Self {
        Self::Context {
            op,
            source: Box::new(self),
        }
    }

    pub(crate) fn is_conflict(&self) -> bool {
        matches!(self.root(), Self::Store(StoreError::Conflict { .. }))
    }
}

/// Adds [`RoomError::context`] to any result whose error converts into a
/// [`RoomError`].
pub trait ResultExt<T> {
    fn context(self, op: &'static str) -> Result<T, RoomError>;
}

impl<T, E: Into<RoomError>> ResultExt<T> for Result<T, E> {
    fn context(self, op: &'static str) -> Result<T, RoomError> {
        self.map_err(|e| RoomError::context(e.into(), op))
    }
}
