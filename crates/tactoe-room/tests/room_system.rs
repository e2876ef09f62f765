//! Integration tests for the room system over an in-memory store.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tactoe_battle::{Battle, ManagementState, RuleError};
use tactoe_protocol::{LoginId, Piece, Player, Position, Role, RoomId, ViewState, WinLine};
use tactoe_room::{
    BATTLE_MESSAGE_KEY, BattleInteractor, ErrorKind, RoomConfig, RoomError, RoomKeys,
};
use tactoe_store::{EntryId, MemDb, MemoryDb, StoreError};

// =========================================================================
// Helpers
// =========================================================================

fn config() -> RoomConfig {
    RoomConfig {
        listen_block: Duration::from_millis(200),
        not_found_retry: Duration::from_millis(10),
        ..RoomConfig::default()
    }
}

fn setup() -> (Arc<MemoryDb>, BattleInteractor<MemoryDb>) {
    let db = Arc::new(MemoryDb::default());
    let interactor = BattleInteractor::new(Arc::clone(&db), config());
    (db, interactor)
}

fn alice() -> LoginId {
    LoginId::new("alice")
}

fn bob() -> LoginId {
    LoginId::new("bob")
}

/// A room with alice in seat A and bob in seat B.
async fn started_room<D: MemDb>(interactor: &BattleInteractor<D>) -> RoomId {
    let room = interactor.create().await.unwrap();
    interactor.declaration(&room, &alice()).await.unwrap();
    interactor.declaration(&room, &bob()).await.unwrap();
    room
}

/// A store where another writer wins the race for each queued snapshot:
/// the snapshot lands on the log right before the next conditional append.
#[derive(Default)]
struct RacingDb {
    inner: MemoryDb,
    rivals: Mutex<VecDeque<Battle>>,
}

impl RacingDb {
    fn race_with(&self, battle: Battle) {
        self.rivals.lock().unwrap().push_back(battle);
    }

    fn pending_rivals(&self) -> usize {
        self.rivals.lock().unwrap().len()
    }
}

impl MemDb for RacingDb {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.inner.get(key).await
    }

    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.inner.set_nx(key, value, ttl).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        self.inner.expire(key, ttl).await
    }

    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.inner.del(key).await
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.inner.sadd(key, member).await
    }

    async fn srem(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.inner.srem(key, member).await
    }

    async fn smembers(&self, key: &str) -> Result<Vec<String>, StoreError> {
        self.inner.smembers(key).await
    }

    async fn sismember(&self, key: &str, member: &str) -> Result<bool, StoreError> {
        self.inner.sismember(key, member).await
    }

    async fn xadd(&self, key: &str, field: &str, value: &str) -> Result<EntryId, StoreError> {
        self.inner.xadd(key, field, value).await
    }

    async fn xadd_after(
        &self,
        key: &str,
        expected_last: EntryId,
        field: &str,
        value: &str,
    ) -> Result<EntryId, StoreError> {
        let rival = self.rivals.lock().unwrap().pop_front();
        if let Some(rival) = rival {
            let snapshot = serde_json::to_string(&rival).unwrap();
            self.inner.xadd(key, field, &snapshot).await?;
        }
        self.inner.xadd_after(key, expected_last, field, value).await
    }

    async fn xlast(&self, key: &str, field: &str) -> Result<(EntryId, String), StoreError> {
        self.inner.xlast(key, field).await
    }

    async fn xread_after(
        &self,
        key: &str,
        field: &str,
        after: EntryId,
        block: Duration,
    ) -> Result<(EntryId, String), StoreError> {
        self.inner.xread_after(key, field, after, block).await
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        self.inner.purge_expired().await
    }
}

fn racing_setup(max_append_attempts: usize) -> (Arc<RacingDb>, BattleInteractor<RacingDb>) {
    let db = Arc::new(RacingDb::default());
    let interactor = BattleInteractor::new(
        Arc::clone(&db),
        RoomConfig {
            max_append_attempts,
            ..config()
        },
    );
    (db, interactor)
}

// =========================================================================
// Create / can_enter / enter
// =========================================================================

#[tokio::test]
async fn test_create_writes_meeting_snapshot_with_room_id() {
    let (_db, interactor) = setup();
    let room = interactor.create().await.unwrap();

    assert_eq!(room.as_str().len(), 5);
    let (_, battle) = interactor.repository().read_latest(&room).await.unwrap();
    assert_eq!(battle.room_id, room);
    assert_eq!(battle.state, ManagementState::Meeting);
}

#[tokio::test]
async fn test_create_returns_distinct_rooms() {
    let (_db, interactor) = setup();
    let a = interactor.create().await.unwrap();
    let b = interactor.create().await.unwrap();
    assert_ne!(a, b);
}

#[tokio::test]
async fn test_can_enter_existing_and_missing_room() {
    let (_db, interactor) = setup();
    let room = interactor.create().await.unwrap();

    assert!(interactor.can_enter(&room, &alice()).await.unwrap());
    assert!(
        !interactor
            .can_enter(&RoomId::new("00000"), &alice())
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn test_enter_missing_room_is_not_found() {
    let (_db, interactor) = setup();
    let err = interactor
        .enter(&RoomId::new("00000"), &alice())
        .await
        .err()
        .unwrap();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_fresh_listener_gets_latest_snapshot_immediately() {
    let (_db, interactor) = setup();
    let room = started_room(&interactor).await;

    let mut listener = interactor.enter(&room, &bob()).await.unwrap();
    let situation = listener.listen().await.unwrap();
    assert_eq!(situation.role, Role::PlayerB);
    assert_eq!(situation.state, ViewState::OpponentTurn);
    assert_eq!(situation.player_a_id, alice());
}

// =========================================================================
// Scenario
// =========================================================================

#[tokio::test]
async fn test_alice_and_bob_scenario_streams_every_view() {
    let (_db, interactor) = setup();
    let room = interactor.create().await.unwrap();

    let mut alice_view = interactor.enter(&room, &alice()).await.unwrap();
    let first = alice_view.listen().await.unwrap();
    assert_eq!(first.role, Role::Audience);
    assert_eq!(first.state, ViewState::Meeting);

    interactor.declaration(&room, &alice()).await.unwrap();
    let seated = alice_view.listen().await.unwrap();
    assert_eq!(seated.role, Role::PlayerA);
    assert_eq!(seated.state, ViewState::Meeting);

    interactor.declaration(&room, &bob()).await.unwrap();
    assert_eq!(alice_view.listen().await.unwrap().state, ViewState::PlayerTurn);

    let mut bob_view = interactor.enter(&room, &bob()).await.unwrap();
    assert_eq!(bob_view.listen().await.unwrap().state, ViewState::OpponentTurn);

    // A takes the left column.
    let moves = [
        (Player::A, 0, Piece::Small),
        (Player::B, 1, Piece::Small),
        (Player::A, 3, Piece::Small),
        (Player::B, 2, Piece::Small),
        (Player::A, 6, Piece::Medium),
    ];
    for (player, position, piece) in moves {
        interactor
            .attack(&room, player, position, piece)
            .await
            .unwrap();
    }

    let mut last_alice = None;
    for _ in 0..moves.len() {
        last_alice = Some(alice_view.listen().await.unwrap());
    }
    let mut last_bob = None;
    for _ in 0..moves.len() {
        last_bob = Some(bob_view.listen().await.unwrap());
    }

    let alice_end = last_alice.unwrap();
    let bob_end = last_bob.unwrap();
    assert_eq!(alice_end.state, ViewState::Win);
    assert_eq!(bob_end.state, ViewState::Lose);
    assert_eq!(alice_end.win_line, Some(WinLine::Column1));
    assert_eq!(alice_end.field, bob_end.field);

    // Win is sticky until reset.
    let err = interactor
        .attack(&room, Player::B, 8, Piece::Large)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    interactor.reset(&room).await.unwrap();
    let reset = alice_view.listen().await.unwrap();
    assert_eq!(reset.state, ViewState::Meeting);
    assert_eq!(reset.role, Role::Audience);
    assert!(reset.player_a_id.is_empty());
}

#[tokio::test]
async fn test_listener_cursors_strictly_increase() {
    let (_db, interactor) = setup();
    let room = started_room(&interactor).await;
    let mut listener = interactor.enter(&room, &alice()).await.unwrap();

    listener.listen().await.unwrap();
    let mut cursors = vec![listener.cursor().unwrap()];

    interactor.attack(&room, Player::A, 4, Piece::Small).await.unwrap();
    interactor.attack(&room, Player::B, 0, Piece::Small).await.unwrap();
    interactor.attack(&room, Player::A, 8, Piece::Small).await.unwrap();

    let mut states = Vec::new();
    for _ in 0..3 {
        states.push(listener.listen().await.unwrap().state);
        cursors.push(listener.cursor().unwrap());
    }

    assert!(cursors.windows(2).all(|w| w[0] < w[1]), "{cursors:?}");
    assert_eq!(
        states,
        vec![ViewState::OpponentTurn, ViewState::PlayerTurn, ViewState::OpponentTurn]
    );
}

#[tokio::test]
async fn test_blocked_listener_wakes_on_move() {
    let db = Arc::new(MemoryDb::default());
    let interactor = BattleInteractor::new(
        Arc::clone(&db),
        RoomConfig {
            listen_block: Duration::from_secs(10),
            ..RoomConfig::default()
        },
    );
    let room = started_room(&interactor).await;
    let mut listener = interactor.enter(&room, &bob()).await.unwrap();
    listener.listen().await.unwrap();

    let waiting = tokio::spawn(async move { listener.listen().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    interactor.attack(&room, Player::A, 4, Piece::Medium).await.unwrap();

    let situation = tokio::time::timeout(Duration::from_secs(2), waiting)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(situation.state, ViewState::PlayerTurn);
}

#[tokio::test(start_paused = true)]
async fn test_listen_with_nothing_new_is_not_found() {
    let (_db, interactor) = setup();
    let room = started_room(&interactor).await;
    let mut listener = interactor.enter(&room, &alice()).await.unwrap();
    listener.listen().await.unwrap();

    let err = listener.listen().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(listener.retry_delay(), Duration::from_millis(10));
}

// =========================================================================
// Commands
// =========================================================================

#[tokio::test]
async fn test_declaration_third_login_is_precondition() {
    let (_db, interactor) = setup();
    let room = started_room(&interactor).await;
    let err = interactor
        .declaration(&room, &LoginId::new("carol"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Precondition);
}

#[tokio::test]
async fn test_attack_off_board_is_validation_and_appends_nothing() {
    let (_db, interactor) = setup();
    let room = started_room(&interactor).await;
    let (before, _) = interactor.repository().read_latest(&room).await.unwrap();

    let err = interactor
        .attack(&room, Player::A, 9, Piece::Small)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(matches!(
        err.root(),
        RoomError::Rule(RuleError::InvalidPosition(9))
    ));

    let (after, _) = interactor.repository().read_latest(&room).await.unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn test_pick_then_attack_through_interactor() {
    let (_db, interactor) = setup();
    let room = started_room(&interactor).await;
    interactor.attack(&room, Player::A, 4, Piece::Small).await.unwrap();
    interactor.attack(&room, Player::B, 0, Piece::Small).await.unwrap();

    interactor.pick(&room, Player::A, 4, Piece::Small).await.unwrap();
    let (_, battle) = interactor.repository().read_latest(&room).await.unwrap();
    assert_eq!(battle.state, ManagementState::PlayerAPicked);

    interactor.attack(&room, Player::A, 5, Piece::Small).await.unwrap();
    let (_, battle) = interactor.repository().read_latest(&room).await.unwrap();
    assert_eq!(battle.state, ManagementState::PlayerBTurn);
    assert_eq!(battle.picked_position, None);
}

#[tokio::test]
async fn test_command_on_missing_room_is_not_found() {
    let (_db, interactor) = setup();
    let err = interactor.reset(&RoomId::new("00000")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_concurrent_conflicting_attacks_apply_once() {
    let (_db, interactor) = setup();
    let room = started_room(&interactor).await;

    let (first, second) = tokio::join!(
        interactor.attack(&room, Player::A, 4, Piece::Large),
        interactor.attack(&room, Player::A, 4, Piece::Large),
    );

    let results = [first, second];
    let applied = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(applied, 1);
    let rejected = results.iter().find_map(|r| r.as_ref().err()).unwrap();
    assert_eq!(rejected.kind(), ErrorKind::Validation);

    let (_, battle) = interactor.repository().read_latest(&room).await.unwrap();
    assert_eq!(battle.player_a_holding.large, 1);
    assert_eq!(battle.state, ManagementState::PlayerBTurn);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_declarations_fill_both_seats() {
    let (_db, interactor) = setup();
    let room = interactor.create().await.unwrap();

    let tasks: Vec<_> = ["alice", "bob"]
        .into_iter()
        .map(|name| {
            let interactor = interactor.clone();
            let room = room.clone();
            tokio::spawn(async move {
                interactor
                    .declaration(&room, &LoginId::new(name))
                    .await
            })
        })
        .collect();
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let (_, battle) = interactor.repository().read_latest(&room).await.unwrap();
    assert_eq!(battle.state, ManagementState::PlayerATurn);
    let mut seated = vec![battle.player_a_id, battle.player_b_id];
    seated.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    assert_eq!(seated, vec![alice(), bob()]);
}

// =========================================================================
// Lost races
// =========================================================================

#[tokio::test]
async fn test_append_with_stale_cursor_is_conflict_and_writes_nothing() {
    let (_db, interactor) = setup();
    let room = started_room(&interactor).await;
    let repo = interactor.repository();

    let (stale, mut battle) = repo.read_latest(&room).await.unwrap();
    let newest = repo.append(&room, &battle, Some(stale)).await.unwrap();

    battle.reset();
    let err = repo.append(&room, &battle, Some(stale)).await.unwrap_err();
    assert!(matches!(
        err.root(),
        RoomError::Store(StoreError::Conflict { .. })
    ));

    let (after, latest) = repo.read_latest(&room).await.unwrap();
    assert_eq!(after, newest);
    assert_eq!(latest.state, ManagementState::PlayerATurn);
}

#[tokio::test]
async fn test_attack_after_lost_race_is_checked_against_winning_snapshot() {
    let (db, interactor) = racing_setup(8);
    let room = started_room(&interactor).await;

    let (_, mut rival) = interactor.repository().read_latest(&room).await.unwrap();
    rival
        .attack(Player::A, Position::new(4).unwrap(), Piece::Large)
        .unwrap();
    db.race_with(rival.clone());

    let err = interactor
        .attack(&room, Player::A, 4, Piece::Large)
        .await
        .unwrap_err();
    assert_eq!(db.pending_rivals(), 0);
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(matches!(
        err.root(),
        RoomError::Rule(RuleError::NotYourTurn { .. })
    ));

    let (_, latest) = interactor.repository().read_latest(&room).await.unwrap();
    assert_eq!(latest, rival);
    assert_eq!(latest.player_a_holding.large, 1);
}

#[tokio::test]
async fn test_attack_after_lost_race_retries_and_applies_once() {
    let (db, interactor) = racing_setup(8);
    let room = started_room(&interactor).await;

    let (_, unchanged) = interactor.repository().read_latest(&room).await.unwrap();
    db.race_with(unchanged.clone());
    db.race_with(unchanged);

    interactor
        .attack(&room, Player::A, 4, Piece::Small)
        .await
        .unwrap();
    assert_eq!(db.pending_rivals(), 0);

    let (_, latest) = interactor.repository().read_latest(&room).await.unwrap();
    assert_eq!(latest.state, ManagementState::PlayerBTurn);
    assert_eq!(latest.player_a_holding.small, 1);
}

#[tokio::test]
async fn test_update_gives_up_after_max_append_attempts() {
    let (db, interactor) = racing_setup(3);
    let room = started_room(&interactor).await;

    let (_, unchanged) = interactor.repository().read_latest(&room).await.unwrap();
    for _ in 0..3 {
        db.race_with(unchanged.clone());
    }

    let err = interactor
        .attack(&room, Player::A, 4, Piece::Small)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
    assert!(matches!(
        err.root(),
        RoomError::Contended { attempts: 3, .. }
    ));
    assert_eq!(db.pending_rivals(), 0);

    let (_, latest) = interactor.repository().read_latest(&room).await.unwrap();
    assert_eq!(latest.state, ManagementState::PlayerATurn);
    assert_eq!(latest.player_a_holding.small, 2);
}

// =========================================================================
// Leaving
// =========================================================================

#[tokio::test]
async fn test_leave_ends_that_viewers_stream() {
    let (_db, interactor) = setup();
    let room = started_room(&interactor).await;
    let mut alice_view = interactor.enter(&room, &alice()).await.unwrap();
    let mut bob_view = interactor.enter(&room, &bob()).await.unwrap();
    alice_view.listen().await.unwrap();
    bob_view.listen().await.unwrap();

    interactor.leave(&room, &alice()).await.unwrap();

    let err = alice_view.listen().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Left);
    assert!(interactor.can_enter(&room, &alice()).await.unwrap());
}

#[tokio::test]
async fn test_last_leaver_deletes_room() {
    let (db, interactor) = setup();
    let room = started_room(&interactor).await;
    interactor.enter(&room, &alice()).await.unwrap();
    interactor.enter(&room, &bob()).await.unwrap();

    interactor.leave(&room, &alice()).await.unwrap();
    interactor.leave(&room, &bob()).await.unwrap();

    let err = interactor.repository().read_latest(&room).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let keys = RoomKeys::new(&room);
    assert!(db.get(&keys.record).await.unwrap().is_none());
    assert!(db.smembers(&keys.members).await.unwrap().is_empty());
    assert_eq!(db.key_count().await, 0);
    assert!(!interactor.can_enter(&room, &alice()).await.unwrap());
}

// =========================================================================
// Expiry and failures
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_idle_room_expires() {
    let (_db, interactor) = setup();
    let room = started_room(&interactor).await;

    tokio::time::advance(Duration::from_secs(14 * 60)).await;
    interactor.attack(&room, Player::A, 4, Piece::Small).await.unwrap();

    // The move refreshed the TTL.
    tokio::time::advance(Duration::from_secs(14 * 60)).await;
    assert!(interactor.can_enter(&room, &alice()).await.unwrap());

    tokio::time::advance(Duration::from_secs(2 * 60)).await;
    assert!(!interactor.can_enter(&room, &alice()).await.unwrap());
}

#[tokio::test]
async fn test_corrupt_snapshot_is_internal() {
    let (db, interactor) = setup();
    let room = interactor.create().await.unwrap();
    db.xadd(&RoomKeys::new(&room).stream, BATTLE_MESSAGE_KEY, "{not json")
        .await
        .unwrap();

    let err = interactor
        .attack(&room, Player::A, 0, Piece::Small)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Internal);
}

#[tokio::test]
async fn test_closed_store_is_unavailable() {
    let (db, interactor) = setup();
    let room = interactor.create().await.unwrap();
    db.close("maintenance").await;

    assert_eq!(
        interactor.create().await.unwrap_err().kind(),
        ErrorKind::Unavailable
    );
    assert_eq!(
        interactor.declaration(&room, &alice()).await.unwrap_err().kind(),
        ErrorKind::Unavailable
    );
    assert_eq!(
        interactor.can_enter(&room, &alice()).await.unwrap_err().kind(),
        ErrorKind::Unavailable
    );
}
