//! One viewer's subscription to a room.

use std::time::Duration;

use tactoe_protocol::{BattleSituation, LoginId, RoomId};
use tactoe_store::MemDb;
use tracing::trace;

use crate::{BattleRepository, Cursor, RoomError, project};

/// Tails a room's snapshot log on behalf of one login.
///
/// The first [`listen`](Self::listen) returns the newest snapshot; each
/// later call returns the next one after the last returned, so a listener
/// sees every snapshot once and in order.
pub struct BattleListener<D: MemDb> {
    repo: BattleRepository<D>,
    room_id: RoomId,
    login_id: LoginId,
    cursor: Option<Cursor>,
}

impl<D: MemDb> BattleListener<D> {
    pub(crate) fn new(repo: BattleRepository<D>, room_id: RoomId, login_id: LoginId) -> Self {
        Self {
            repo,
            room_id,
            login_id,
            cursor: None,
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn login_id(&self) -> &LoginId {
        &self.login_id
    }

    /// The last entry returned, if any.
    pub fn cursor(&self) -> Option<Cursor> {
        self.cursor
    }

    /// How long a caller should wait after a [`NotFound`](crate::ErrorKind::NotFound)
    /// before listening again.
    pub fn retry_delay(&self) -> Duration {
        self.repo.config().not_found_retry
    }

    /// Waits for the next snapshot and projects it for this login.
    ///
    /// # Errors
    /// - [`RoomError::Left`] once the login is no longer a member. The
    ///   stream is over.
    /// - [`ErrorKind::NotFound`](crate::ErrorKind::NotFound) when nothing
    ///   new arrived within the listen window. Transient; retry after
    ///   [`retry_delay`](Self::retry_delay).
    /// - [`ErrorKind::Unavailable`](crate::ErrorKind::Unavailable) when the
    ///   store is down.
    pub async fn listen(&mut self) -> Result<BattleSituation, RoomError> {
        if !self.repo.is_member(&self.room_id, &self.login_id).await? {
            return Err(RoomError::Left {
                room_id: self.room_id.clone(),
                login_id: self.login_id.clone(),
            });
        }

        let (cursor, battle) = match self.cursor {
            None => self.repo.read_latest(&self.room_id).await?,
            Some(after) => self.repo.read_after(&self.room_id, after).await?,
        };
        self.cursor = Some(cursor);

        trace!(room_id = %self.room_id, login_id = %self.login_id, %cursor, "snapshot read");
        Ok(project(&battle, &self.login_id))
    }
}
