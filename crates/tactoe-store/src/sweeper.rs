//! Background purge of expired keys.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, warn};

use crate::{MemDb, StoreError};

/// Spawns a task that calls [`MemDb::purge_expired`] every `every`.
///
/// The task ends on its own once the store reports
/// [`StoreError::Unavailable`]; otherwise abort the handle to stop it.
pub fn spawn_sweeper<D: MemDb>(db: Arc<D>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately; nothing can have expired yet.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match db.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => debug!(purged, "expired keys purged"),
                Err(StoreError::Unavailable(reason)) => {
                    debug!(%reason, "sweeper stopping");
                    break;
                }
                Err(e) => warn!(error = %e, "sweep failed"),
            }
        }
    })
}
