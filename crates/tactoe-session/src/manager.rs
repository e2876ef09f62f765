//! The login manager: issues and checks session tokens.

use std::sync::Arc;

use rand::Rng;
use tactoe_protocol::{Login, LoginId};
use tactoe_store::MemDb;
use tracing::{debug, info};

use crate::{SessionConfig, SessionError};

const LOGIN_KEY_PREFIX: &str = "tictactoe_battle_login";

/// The store key holding `login_id`'s session token.
pub fn login_key(login_id: &LoginId) -> String {
    format!("{LOGIN_KEY_PREFIX}:{login_id}")
}

/// Issues session tokens and checks them on re-login.
///
/// Stateless apart from the store: any number of server tasks can share
/// one manager (or build their own over the same store).
///
/// ## Lifecycle
///
/// ```text
/// login(id, None) ──→ [token issued, TTL started]
///        │
///        ├── login(id, Some(token)) ──→ TTL refreshed
///        ├── login(id, Some(other)) ──→ SessionMismatch
///        ├── (TTL elapses)          ──→ login(id, ..) issues a new token
///        └── logout(id)             ──→ gone
/// ```
pub struct LoginManager<D: MemDb> {
    db: Arc<D>,
    config: SessionConfig,
}

impl<D: MemDb> LoginManager<D> {
    pub fn new(db: Arc<D>, config: SessionConfig) -> Self {
        Self { db, config }
    }

    /// Logs `login_id` in.
    ///
    /// - Unknown login: a fresh session token is issued.
    /// - Known login and `session_id` is absent, empty, or equal to the
    ///   stored token: the login's TTL is refreshed and the stored token
    ///   returned.
    ///
    /// # Errors
    /// - [`SessionError::InvalidLogin`] for an empty login id.
    /// - [`SessionError::SessionMismatch`] when a different, non-empty
    ///   token is presented for a live login.
    /// - [`SessionError::Store`] when the store fails.
    pub async fn login(
        &self,
        login_id: &LoginId,
        session_id: Option<&str>,
    ) -> Result<Login, SessionError> {
        if login_id.is_empty() {
            return Err(SessionError::InvalidLogin(login_id.to_string()));
        }

        let key = login_key(login_id);
        let ttl = self.config.login_ttl;

        // Two rounds: a concurrent first login can win the set-if-absent
        // between our read and our write, in which case we re-read.
        for _ in 0..2 {
            match self.db.get(&key).await? {
                None => {
                    let token = generate_token();
                    if self.db.set_nx(&key, &token, ttl).await? {
                        info!(%login_id, "login created");
                        return Ok(Login {
                            login_id: login_id.clone(),
                            session_id: token,
                        });
                    }
                }
                Some(stored) => {
                    if let Some(presented) = session_id.filter(|s| !s.is_empty()) {
                        if presented != stored {
                            debug!(%login_id, "session id mismatch");
                            return Err(SessionError::SessionMismatch(login_id.clone()));
                        }
                    }

                    // The key may expire between the read and this refresh;
                    // the caller still gets the token it was shown.
                    self.db.expire(&key, ttl).await?;
                    debug!(%login_id, "login refreshed");
                    return Ok(Login {
                        login_id: login_id.clone(),
                        session_id: stored,
                    });
                }
            }
        }

        Err(SessionError::SessionMismatch(login_id.clone()))
    }

    /// Logs `login_id` out. Logging out an unknown login is fine.
    pub async fn logout(&self, login_id: &LoginId) -> Result<(), SessionError> {
        self.db.del(&login_key(login_id)).await?;
        info!(%login_id, "logged out");
        Ok(())
    }
}

/// Generates a random 32-character hex session token.
fn generate_token() -> String {
    let bytes: [u8; 16] = rand::rng().random();
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

// =========================================================================
// Tests
// =========================================================================
