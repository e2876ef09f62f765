//! Room configuration.

use std::time::Duration;

/// Tuning for rooms, their listeners, and their writers.
///
/// Passed to [`BattleInteractor::new`](crate::BattleInteractor::new);
/// there are no process-wide settings.
#[derive(Debug, Clone)]
pub struct RoomConfig {
    /// Lifetime of an idle room. Refreshed on every move and on every
    /// enter/leave. Default: 15 minutes.
    pub ttl: Duration,

    /// How long one listener read waits for a new snapshot before
    /// reporting "nothing new". Default: 5 seconds.
    pub listen_block: Duration,

    /// Pause before a stream retries after "nothing new". Default: 1 second.
    pub not_found_retry: Duration,

    /// First pause after a room code collision. Doubles on each further
    /// collision, up to one second. Default: 10 milliseconds.
    pub reserve_backoff: Duration,

    /// Read-modify-append rounds a command gets before giving up under
    /// contention. Default: 8.
    pub max_append_attempts: usize,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(15 * 60),
            listen_block: Duration::from_secs(5),
            not_found_retry: Duration::from_secs(1),
            reserve_backoff: Duration::from_millis(10),
            max_append_attempts: 8,
        }
    }
}
