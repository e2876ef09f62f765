//! Login sessions for tactoe.
//!
//! A login is a user-chosen id bound to a random session token. The token
//! is handed back on first login; presenting it again (or presenting no
//! token at all) refreshes the login, presenting a different one is
//! rejected. Logins expire after [`SessionConfig::login_ttl`] without
//! activity.
//!
//! ```text
//! Server (above)   ← calls login/logout on behalf of clients
//!     ↕
//! Session Layer (this crate)
//!     ↕
//! Store (below)    ← one string key per login, with TTL
//! ```

mod config;
mod error;
mod manager;

pub use config::SessionConfig;
pub use error::SessionError;
pub use manager::{LoginManager, login_key};
