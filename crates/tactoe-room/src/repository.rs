//! Room persistence: reservation, snapshot log, and membership.

use std::sync::Arc;

use tactoe_battle::Battle;
use tactoe_protocol::{LoginId, RoomId};
use tactoe_store::{EntryId, MemDb, StoreError};
use tracing::{debug, info};

use crate::{RoomConfig, RoomError, RoomKeys, generate_room_id};

/// Field under which each log entry carries its JSON snapshot.
pub const BATTLE_MESSAGE_KEY: &str = "tic_tac_toe_battle_message_key";

/// Position in a room's snapshot log.
pub type Cursor = EntryId;

const MAX_RESERVE_BACKOFF: std::time::Duration = std::time::Duration::from_secs(1);

/// Reads and writes rooms in a [`MemDb`].
///
/// Cheap to clone: clones share the store.
pub struct BattleRepository<D: MemDb> {
    db: Arc<D>,
    config: RoomConfig,
}

impl<D: MemDb> Clone for BattleRepository<D> {
    fn clone(&self) -> Self {
        Self {
            db: Arc::clone(&self.db),
            config: self.config.clone(),
        }
    }
}

impl<D: MemDb> BattleRepository<D> {
    pub fn new(db: Arc<D>, config: RoomConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// Reserves a fresh room code.
    ///
    /// Draws random codes until one can be claimed with set-if-absent,
    /// backing off between collisions. There is no attempt limit.
    pub async fn reserve_room_id(&self) -> Result<RoomId, RoomError> {
        let mut backoff = self.config.reserve_backoff;
        loop {
            let room_id = generate_room_id();
            let keys = RoomKeys::new(&room_id);
            if self.db.set_nx(&keys.record, "", self.config.ttl).await? {
                return Ok(room_id);
            }

            debug!(%room_id, ?backoff, "room id taken, retrying");
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_RESERVE_BACKOFF);
        }
    }

    /// Reserves a room for `battle` and writes its first snapshot.
    pub async fn create(&self, mut battle: Battle) -> Result<RoomId, RoomError> {
        let room_id = self.reserve_room_id().await?;
        battle.room_id = room_id.clone();
        self.append(&room_id, &battle, None).await?;

        info!(%room_id, "room created");
        Ok(room_id)
    }

    /// Appends a snapshot to the room's log and refreshes the room's TTL.
    ///
    /// With `expected = Some(cursor)` the append only happens if `cursor`
    /// is still the newest entry; otherwise the store's
    /// [`StoreError::Conflict`] comes back and nothing is written.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] if the room record is gone.
    pub async fn append(
        &self,
        room_id: &RoomId,
        battle: &Battle,
        expected: Option<Cursor>,
    ) -> Result<Cursor, RoomError> {
        let keys = RoomKeys::new(room_id);
        self.require_room(room_id, &keys).await?;

        let snapshot = serde_json::to_string(battle).map_err(|source| RoomError::Snapshot {
            room_id: room_id.clone(),
            source,
        })?;

        let cursor = match expected {
            Some(expected) => {
                self.db
                    .xadd_after(&keys.stream, expected, BATTLE_MESSAGE_KEY, &snapshot)
                    .await?
            }
            None => self.db.xadd(&keys.stream, BATTLE_MESSAGE_KEY, &snapshot).await?,
        };
        // After the append, so a log created by this call gets a TTL too.
        self.refresh(&keys).await?;

        debug!(%room_id, %cursor, state = %battle.state, "snapshot appended");
        Ok(cursor)
    }

    /// The newest snapshot.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] if the room has no log.
    pub async fn read_latest(&self, room_id: &RoomId) -> Result<(Cursor, Battle), RoomError> {
        let keys = RoomKeys::new(room_id);
        let (cursor, snapshot) = self
            .db
            .xlast(&keys.stream, BATTLE_MESSAGE_KEY)
            .await
            .map_err(|e| not_found_as_room(room_id, e))?;
        Ok((cursor, decode(room_id, &snapshot)?))
    }

    /// The first snapshot after `cursor`, waiting up to
    /// [`RoomConfig::listen_block`] for one.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] if nothing new arrived in time (or the log
    /// is gone).
    pub async fn read_after(
        &self,
        room_id: &RoomId,
        cursor: Cursor,
    ) -> Result<(Cursor, Battle), RoomError> {
        let keys = RoomKeys::new(room_id);
        let (cursor, snapshot) = self
            .db
            .xread_after(
                &keys.stream,
                BATTLE_MESSAGE_KEY,
                cursor,
                self.config.listen_block,
            )
            .await
            .map_err(|e| not_found_as_room(room_id, e))?;
        Ok((cursor, decode(room_id, &snapshot)?))
    }

    /// Adds `login_id` to the room's members.
    pub async fn enter(&self, room_id: &RoomId, login_id: &LoginId) -> Result<(), RoomError> {
        let keys = RoomKeys::new(room_id);
        self.require_room(room_id, &keys).await?;
        self.db.sadd(&keys.members, login_id.as_str()).await?;
        self.refresh(&keys).await?;

        info!(%room_id, %login_id, "member entered");
        Ok(())
    }

    /// Removes `login_id` from the room's members. Never deletes the room.
    pub async fn leave(&self, room_id: &RoomId, login_id: &LoginId) -> Result<(), RoomError> {
        let keys = RoomKeys::new(room_id);
        self.require_room(room_id, &keys).await?;
        self.db.srem(&keys.members, login_id.as_str()).await?;
        self.refresh(&keys).await?;

        info!(%room_id, %login_id, "member left");
        Ok(())
    }

    pub async fn list_members(&self, room_id: &RoomId) -> Result<Vec<LoginId>, RoomError> {
        let keys = RoomKeys::new(room_id);
        let members = self.db.smembers(&keys.members).await?;
        Ok(members.into_iter().map(LoginId::new).collect())
    }

    pub async fn is_member(&self, room_id: &RoomId, login_id: &LoginId) -> Result<bool, RoomError> {
        let keys = RoomKeys::new(room_id);
        Ok(self.db.sismember(&keys.members, login_id.as_str()).await?)
    }

    /// Deletes the room record, member set, and log.
    ///
    /// All three deletes are attempted; the first failure is reported and
    /// whatever did get deleted stays deleted.
    pub async fn delete(&self, room_id: &RoomId) -> Result<(), RoomError> {
        let keys = RoomKeys::new(room_id);
        let (record, members, stream) = tokio::join!(
            self.db.del(&keys.record),
            self.db.del(&keys.members),
            self.db.del(&keys.stream),
        );
        record?;
        members?;
        stream?;

        info!(%room_id, "room deleted");
        Ok(())
    }

    async fn require_room(&self, room_id: &RoomId, keys: &RoomKeys) -> Result<(), RoomError> {
        match self.db.get(&keys.record).await? {
            Some(_) => Ok(()),
            None => Err(RoomError::NotFound(room_id.clone())),
        }
    }

    /// Resets the TTL on all three room keys. Missing keys are skipped.
    async fn refresh(&self, keys: &RoomKeys) -> Result<(), RoomError> {
        let ttl = self.config.ttl;
        let (record, members, stream) = tokio::join!(
            self.db.expire(&keys.record, ttl),
            self.db.expire(&keys.members, ttl),
            self.db.expire(&keys.stream, ttl),
        );
        record?;
        members?;
        stream?;
        Ok(())
    }
}

fn not_found_as_room(room_id: &RoomId, e: StoreError) -> RoomError {
    match e {
        StoreError::NotFound(_) => RoomError::NotFound(room_id.clone()),
        other => RoomError::Store(other),
    }
}

fn decode(room_id: &RoomId, snapshot: &str) -> Result<Battle, RoomError> {
    serde_json::from_str(snapshot).map_err(|source| RoomError::Snapshot {
        room_id: room_id.clone(),
        source,
    })
}
