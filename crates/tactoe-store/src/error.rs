//! Error types for the store.

use crate::EntryId;

/// Errors returned by a [`MemDb`](crate::MemDb).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The key (or the entry asked for) does not exist, has expired, or a
    /// blocking read saw nothing new before its deadline.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conditional append lost the race: the stream's last entry is no
    /// longer the one the caller read.
    #[error("conflicting append to {key}: expected last entry {expected}, found {actual:?}")]
    Conflict {
        key: String,
        expected: EntryId,
        actual: Option<EntryId>,
    },

    /// The key holds a different kind of value than the operation needs.
    #[error("wrong kind of value at {0}")]
    WrongType(String),

    /// The store can't serve requests (closed, or the backend is gone).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
