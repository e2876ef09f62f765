//! The battle use cases: everything the server can ask a room to do.

use std::sync::Arc;

use tactoe_battle::{Battle, RuleError};
use tactoe_protocol::{LoginId, Piece, Player, Position, RoomId};
use tactoe_store::MemDb;
use tracing::{debug, info, warn};

use crate::{BattleListener, BattleRepository, ErrorKind, ResultExt, RoomConfig, RoomError};

/// Runs battle commands against rooms in a store.
///
/// Commands that change the battle ([`declaration`](Self::declaration),
/// [`attack`](Self::attack), [`pick`](Self::pick), [`reset`](Self::reset))
/// read the newest snapshot, apply the rule, and append the result only if
/// no one else appended in between. When someone did, the command starts
/// over from the new snapshot, so the rule is always checked against the
/// state it is applied to.
pub struct BattleInteractor<D: MemDb> {
    repo: BattleRepository<D>,
}

impl<D: MemDb> Clone for BattleInteractor<D> {
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
        }
    }
}

impl<D: MemDb> BattleInteractor<D> {
    pub fn new(db: Arc<D>, config: RoomConfig) -> Self {
        Self {
            repo: BattleRepository::new(db, config),
        }
    }

    pub fn repository(&self) -> &BattleRepository<D> {
        &self.repo
    }

    /// Opens a new room with a fresh battle in Meeting.
    pub async fn create(&self) -> Result<RoomId, RoomError> {
        self.repo.create(Battle::open()).await.context("create room")
    }

    /// Whether the room exists and has a battle to show.
    ///
    /// A missing room is a plain `false`; only store failures are errors.
    pub async fn can_enter(&self, room_id: &RoomId, _login_id: &LoginId) -> Result<bool, RoomError> {
        match self.repo.read_latest(room_id).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.context("check room")),
        }
    }

    /// Joins the room's members and returns a listener for its battle.
    pub async fn enter(
        &self,
        room_id: &RoomId,
        login_id: &LoginId,
    ) -> Result<BattleListener<D>, RoomError> {
        self.repo.enter(room_id, login_id).await.context("enter room")?;
        self.repo.read_latest(room_id).await.context("enter room")?;
        Ok(BattleListener::new(
            self.repo.clone(),
            room_id.clone(),
            login_id.clone(),
        ))
    }

    /// Leaves the room. The last member out deletes it.
    pub async fn leave(&self, room_id: &RoomId, login_id: &LoginId) -> Result<(), RoomError> {
        self.repo.leave(room_id, login_id).await.context("leave room")?;

        let members = self.repo.list_members(room_id).await.context("leave room")?;
        if members.is_empty() {
            self.repo.delete(room_id).await.context("delete room")?;
            info!(%room_id, "last member left, room closed");
        }
        Ok(())
    }

    /// Claims a seat for `login_id`.
    pub async fn declaration(&self, room_id: &RoomId, login_id: &LoginId) -> Result<(), RoomError> {
        self.update(room_id, "declare", |battle| battle.declare(login_id))
            .await
    }

    /// Places a piece for `player`. `position` is the raw cell index.
    pub async fn attack(
        &self,
        room_id: &RoomId,
        player: Player,
        position: u8,
        piece: Piece,
    ) -> Result<(), RoomError> {
        let position = cell(position).context("attack")?;
        self.update(room_id, "attack", |battle| {
            battle.attack(player, position, piece)
        })
        .await
    }

    /// Lifts one of `player`'s pieces. `position` is the raw cell index.
    pub async fn pick(
        &self,
        room_id: &RoomId,
        player: Player,
        position: u8,
        piece: Piece,
    ) -> Result<(), RoomError> {
        let position = cell(position).context("pick")?;
        self.update(room_id, "pick", |battle| battle.pick(player, position, piece))
            .await
    }

    /// Returns the room's battle to Meeting.
    pub async fn reset(&self, room_id: &RoomId) -> Result<(), RoomError> {
        self.update(room_id, "reset", |battle| {
            battle.reset();
            Ok(())
        })
        .await
    }

    /// Read, apply, conditionally append; start over on a lost race.
    async fn update<F>(&self, room_id: &RoomId, op: &'static str, mut apply: F) -> Result<(), RoomError>
    where
        F: FnMut(&mut Battle) -> Result<(), RuleError>,
    {
        let attempts = self.repo.config().max_append_attempts.max(1);

        for attempt in 1..=attempts {
            let (cursor, mut battle) = self.repo.read_latest(room_id).await.context(op)?;
            apply(&mut battle).context(op)?;

            match self.repo.append(room_id, &battle, Some(cursor)).await {
                Ok(cursor) => {
                    debug!(%room_id, op, %cursor, state = %battle.state, "battle updated");
                    return Ok(());
                }
                Err(e) if e.is_conflict() => {
                    warn!(%room_id, op, attempt, "concurrent update, retrying");
                }
                Err(e) => return Err(e.context(op)),
            }
        }

        Err(RoomError::Contended {
            room_id: room_id.clone(),
            attempts,
        }
        .context(op))
    }
}

fn cell(index: u8) -> Result<Position, RuleError> {
    Position::new(index).ok_or(RuleError::InvalidPosition(index))
}
