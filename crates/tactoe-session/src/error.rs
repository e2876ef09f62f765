//! Error types for the session layer.

use tactoe_protocol::LoginId;
use tactoe_store::StoreError;

/// Errors that can occur during login and logout.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The login id itself is unusable (empty).
    #[error("invalid login id: {0:?}")]
    InvalidLogin(String),

    /// The login exists and the presented session token is a different
    /// one. Someone else is (or was recently) logged in under this id.
    #[error("session id does not match for login {0}")]
    SessionMismatch(LoginId),

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
