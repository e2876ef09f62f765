use std::time::Duration;

/// Configuration for login sessions.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How long a login stays valid without being refreshed.
    ///
    /// Default: one hour.
    pub login_ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_ttl: Duration::from_secs(60 * 60),
        }
    }
}
