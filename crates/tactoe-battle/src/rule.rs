//! The rule operations: declaration, attack, pick, reset, and judgment.
//!
//! Each operation checks everything first and only then mutates, so an
//! `Err` always means "nothing happened".

use tactoe_protocol::{
    Holding, LoginId, MAX_PIECES_PER_SIZE, Piece, PieceStack, Player, Position,
};

use crate::{Battle, ManagementState, RuleError};

impl Battle {
    /// Claims a seat for `login_id`.
    ///
    /// Re-declaring a login that already holds a seat is a no-op, which is
    /// what lets a disconnected player come back. Otherwise seat A is
    /// claimed first, then seat B; claiming seat B starts the game with
    /// player A to move.
    ///
    /// # Errors
    /// [`RuleError::BattleFull`] if both seats belong to other logins.
    pub fn declare(&mut self, login_id: &LoginId) -> Result<(), RuleError> {
        if self.player_a_id == *login_id || self.player_b_id == *login_id {
            return Ok(());
        }

        if self.player_a_id.is_empty() {
            self.player_a_id = login_id.clone();
            return Ok(());
        }

        if self.player_b_id.is_empty() {
            self.player_b_id = login_id.clone();
            self.state = ManagementState::PlayerATurn;
            return Ok(());
        }

        Err(RuleError::BattleFull)
    }

    /// Places one of `player`'s pieces from hand onto `position`.
    ///
    /// On success the hand shrinks by one, any pending pick is cleared,
    /// judgment runs, and the turn passes to the opponent unless the move
    /// won the game.
    ///
    /// # Errors
    /// - [`RuleError::NotYourTurn`] unless the battle is in `player`'s turn
    ///   or picked state.
    /// - [`RuleError::PickedCell`] when placing back on the cell just
    ///   picked from.
    /// - [`RuleError::PickedPieceOnly`] when a different size than the
    ///   picked one is placed.
    /// - [`RuleError::MissingPiece`] when no piece of that size is left.
    /// - [`RuleError::Covered`] when that slot or a larger one is taken.
    /// - [`RuleError::StackOnOwn`] when the piece would sit directly on
    ///   the player's own piece.
    pub fn attack(
        &mut self,
        player: Player,
        position: Position,
        piece: Piece,
    ) -> Result<(), RuleError> {
        self.ensure_turn(player, true)?;

        if self.picked_position == Some(position) {
            return Err(RuleError::PickedCell(position));
        }

        if let Some(picked) = self.picked_piece {
            if picked != piece {
                return Err(RuleError::PickedPieceOnly {
                    picked,
                    requested: piece,
                });
            }
        }

        if self.holding(player).count(piece) == 0 {
            return Err(RuleError::MissingPiece(piece));
        }

        let stack = *self.stack(position);
        if Piece::ALL
            .into_iter()
            .filter(|p| *p >= piece)
            .any(|p| stack.slot(p).is_some())
        {
            return Err(RuleError::Covered { position, piece });
        }

        if directly_beneath(&stack, piece) == Some(player) {
            return Err(RuleError::StackOnOwn(position));
        }

        // Everything checked; apply.
        self.holding_mut(player).take(piece);
        self.field[position.index()].set_slot(piece, Some(player));
        self.picked_position = None;
        self.picked_piece = None;

        self.judge();

        if !self.state.is_finished() {
            self.state = ManagementState::turn_of(player.opponent());
        }

        Ok(())
    }

    /// Lifts one of `player`'s pieces off the board back into hand.
    ///
    /// Only allowed at the start of `player`'s turn. The lifted piece must
    /// be the top of its stack. The following attack is then restricted
    /// to the same size and to a different cell. Judgment runs afterwards,
    /// since uncovering a piece can complete a line.
    ///
    /// # Errors
    /// - [`RuleError::NotYourTurn`] unless the battle is in `player`'s
    ///   (un-picked) turn state.
    /// - [`RuleError::Covered`] when a larger piece sits on top.
    /// - [`RuleError::NotOwnPiece`] when the slot is empty or the
    ///   opponent's.
    pub fn pick(
        &mut self,
        player: Player,
        position: Position,
        piece: Piece,
    ) -> Result<(), RuleError> {
        self.ensure_turn(player, false)?;

        let stack = *self.stack(position);
        if piece.larger().any(|p| stack.slot(p).is_some()) {
            return Err(RuleError::Covered { position, piece });
        }

        if stack.slot(piece) != Some(player) {
            return Err(RuleError::NotOwnPiece { position, piece });
        }

        if self.holding(player).count(piece) >= MAX_PIECES_PER_SIZE {
            return Err(RuleError::Inconsistent(format!(
                "{player} holds every {piece} piece but one is on the board at {position}"
            )));
        }

        self.field[position.index()].set_slot(piece, None);
        self.holding_mut(player).put_back(piece);
        self.picked_position = Some(position);
        self.picked_piece = Some(piece);
        self.state = ManagementState::picked_by(player);

        self.judge();

        Ok(())
    }

    /// Returns the battle to Meeting: seats cleared, hands full, board
    /// empty. Works from any state, including a finished game. The room id
    /// is kept.
    pub fn reset(&mut self) {
        self.state = ManagementState::Meeting;
        self.player_a_id = LoginId::default();
        self.player_b_id = LoginId::default();
        self.player_a_holding = Holding::full();
        self.player_b_holding = Holding::full();
        self.field = [PieceStack::default(); Position::COUNT];
        self.picked_position = None;
        self.picked_piece = None;
        self.win_line = None;
    }

    /// Looks for a completed line and, if found, ends the game.
    ///
    /// A cell belongs to whoever owns its topmost piece. Lines are scanned
    /// in [`WinLine::SCAN_ORDER`](tactoe_protocol::WinLine::SCAN_ORDER)
    /// and the first complete one decides the winner.
    fn judge(&mut self) {
        let owners: Vec<Option<Player>> =
            self.field.iter().map(PieceStack::owner).collect();

        for line in tactoe_protocol::WinLine::SCAN_ORDER {
            let [a, b, c] = line.cells();
            if let Some(owner) = owners[a] {
                if owners[b] == Some(owner) && owners[c] == Some(owner) {
                    self.win_line = Some(line);
                    self.state = ManagementState::won_by(owner);
                    return;
                }
            }
        }
    }

    fn ensure_turn(&self, player: Player, allow_picked: bool) -> Result<(), RuleError> {
        let valid = self.state.turn_owner() == Some(player)
            && (allow_picked || !self.state.is_picked());
        if valid {
            Ok(())
        } else {
            Err(RuleError::NotYourTurn {
                player,
                state: self.state,
            })
        }
    }
}

/// The owner of the topmost piece smaller than `piece` at this cell: the
/// piece that `piece` would land directly on.
fn directly_beneath(stack: &PieceStack, piece: Piece) -> Option<Player> {
    Piece::ALL
        .into_iter()
        .rev()
        .filter(|p| *p < piece)
        .find_map(|p| stack.slot(p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tactoe_protocol::WinLine;

    fn login(id: &str) -> LoginId {
        LoginId::new(id)
    }

    fn pos(index: u8) -> Position {
        Position::new(index).unwrap()
    }

    /// A battle with alice in seat A and bob in seat B, A to move.
    fn started() -> Battle {
        let mut battle = Battle::open();
        battle.declare(&login("alice")).unwrap();
        battle.declare(&login("bob")).unwrap();
        battle
    }

    // =====================================================================
    // declare()
    // =====================================================================

    #[test]
    fn test_declare_first_login_takes_seat_a_and_keeps_meeting() {
        let mut battle = Battle::open();
        battle.declare(&login("alice")).unwrap();
        assert_eq!(battle.player_a_id, login("alice"));
        assert!(battle.player_b_id.is_empty());
        assert_eq!(battle.state, ManagementState::Meeting);
    }

    #[test]
    fn test_declare_second_login_starts_game() {
        let battle = started();
        assert_eq!(battle.player_b_id, login("bob"));
        assert_eq!(battle.state, ManagementState::PlayerATurn);
    }

    #[test]
    fn test_declare_same_login_twice_is_noop() {
        let mut battle = Battle::open();
        battle.declare(&login("alice")).unwrap();
        battle.declare(&login("alice")).unwrap();
        assert!(battle.player_b_id.is_empty());
        assert_eq!(battle.state, ManagementState::Meeting);
    }

    #[test]
    fn test_declare_reconnect_mid_game_changes_nothing() {
        let mut battle = started();
        battle.attack(Player::A, pos(4), Piece::Small).unwrap();
        let before = battle.clone();
        battle.declare(&login("bob")).unwrap();
        assert_eq!(battle, before);
    }

    #[test]
    fn test_declare_third_login_is_rejected() {
        let mut battle = started();
        let err = battle.declare(&login("carol")).unwrap_err();
        assert_eq!(err, RuleError::BattleFull);
        assert!(err.is_precondition());
    }

    // =====================================================================
    // attack()
    // =====================================================================

    #[test]
    fn test_attack_places_piece_and_passes_turn() {
        let mut battle = started();
        battle.attack(Player::A, pos(4), Piece::Small).unwrap();

        assert_eq!(battle.stack(pos(4)).small, Some(Player::A));
        assert_eq!(battle.player_a_holding.small, 1);
        assert_eq!(battle.state, ManagementState::PlayerBTurn);
    }

    #[test]
    fn test_attack_out_of_turn_is_rejected() {
        let mut battle = started();
        let err = battle.attack(Player::B, pos(0), Piece::Small).unwrap_err();
        assert!(matches!(err, RuleError::NotYourTurn { player: Player::B, .. }));
    }

    #[test]
    fn test_attack_during_meeting_is_rejected() {
        let mut battle = Battle::open();
        let err = battle.attack(Player::A, pos(0), Piece::Small).unwrap_err();
        assert!(matches!(err, RuleError::NotYourTurn { .. }));
    }

    #[test]
    fn test_attack_small_on_any_occupied_cell_is_rejected() {
        let mut battle = started();
        battle.attack(Player::A, pos(4), Piece::Small).unwrap();
        let err = battle.attack(Player::B, pos(4), Piece::Small).unwrap_err();
        assert_eq!(
            err,
            RuleError::Covered {
                position: pos(4),
                piece: Piece::Small
            }
        );
    }

    #[test]
    fn test_attack_medium_under_large_is_rejected() {
        let mut battle = started();
        battle.attack(Player::A, pos(4), Piece::Large).unwrap();
        let err = battle.attack(Player::B, pos(4), Piece::Medium).unwrap_err();
        assert!(matches!(err, RuleError::Covered { .. }));
    }

    #[test]
    fn test_attack_large_over_opponent_medium_succeeds() {
        let mut battle = started();
        battle.attack(Player::A, pos(4), Piece::Medium).unwrap();
        battle.attack(Player::B, pos(4), Piece::Large).unwrap();
        assert_eq!(battle.stack(pos(4)).owner(), Some(Player::B));
    }

    #[test]
    fn test_attack_medium_on_own_small_is_rejected() {
        let mut battle = started();
        battle.attack(Player::A, pos(0), Piece::Small).unwrap();
        battle.attack(Player::B, pos(8), Piece::Small).unwrap();
        let err = battle.attack(Player::A, pos(0), Piece::Medium).unwrap_err();
        assert_eq!(err, RuleError::StackOnOwn(pos(0)));
    }

    #[test]
    fn test_attack_large_on_own_small_with_empty_medium_is_rejected() {
        let mut battle = started();
        battle.attack(Player::A, pos(0), Piece::Small).unwrap();
        battle.attack(Player::B, pos(8), Piece::Small).unwrap();
        let err = battle.attack(Player::A, pos(0), Piece::Large).unwrap_err();
        assert_eq!(err, RuleError::StackOnOwn(pos(0)));
    }

    #[test]
    fn test_attack_large_on_opponent_medium_over_own_small_succeeds() {
        let mut battle = started();
        battle.attack(Player::A, pos(0), Piece::Small).unwrap();
        battle.attack(Player::B, pos(0), Piece::Medium).unwrap();
        battle.attack(Player::A, pos(0), Piece::Large).unwrap();
        assert_eq!(battle.stack(pos(0)).top(), Some((Piece::Large, Player::A)));
    }

    #[test]
    fn test_attack_medium_on_opponent_small_succeeds() {
        let mut battle = started();
        battle.attack(Player::A, pos(0), Piece::Small).unwrap();
        battle.attack(Player::B, pos(0), Piece::Medium).unwrap();
        assert_eq!(battle.stack(pos(0)).owner(), Some(Player::B));
    }

    #[test]
    fn test_attack_without_pieces_left_is_rejected() {
        let mut battle = started();
        battle.attack(Player::A, pos(0), Piece::Large).unwrap();
        battle.attack(Player::B, pos(8), Piece::Small).unwrap();
        battle.attack(Player::A, pos(2), Piece::Large).unwrap();
        battle.attack(Player::B, pos(6), Piece::Small).unwrap();
        let err = battle.attack(Player::A, pos(5), Piece::Large).unwrap_err();
        assert_eq!(err, RuleError::MissingPiece(Piece::Large));
    }

    #[test]
    fn test_attack_failure_leaves_battle_untouched() {
        let mut battle = started();
        battle.attack(Player::A, pos(4), Piece::Large).unwrap();
        let before = battle.clone();
        assert!(battle.attack(Player::B, pos(4), Piece::Small).is_err());
        assert_eq!(battle, before);
    }

    // =====================================================================
    // pick()
    // =====================================================================

    #[test]
    fn test_pick_returns_piece_to_hand_and_marks_picked() {
        let mut battle = started();
        battle.attack(Player::A, pos(4), Piece::Small).unwrap();
        battle.attack(Player::B, pos(0), Piece::Small).unwrap();

        battle.pick(Player::A, pos(4), Piece::Small).unwrap();

        assert_eq!(battle.state, ManagementState::PlayerAPicked);
        assert_eq!(battle.player_a_holding.small, 2);
        assert!(battle.stack(pos(4)).is_empty());
        assert_eq!(battle.picked_position, Some(pos(4)));
        assert_eq!(battle.picked_piece, Some(Piece::Small));
    }

    #[test]
    fn test_pick_then_attack_same_cell_is_rejected() {
        let mut battle = started();
        battle.attack(Player::A, pos(4), Piece::Small).unwrap();
        battle.attack(Player::B, pos(0), Piece::Small).unwrap();
        battle.pick(Player::A, pos(4), Piece::Small).unwrap();

        let err = battle.attack(Player::A, pos(4), Piece::Small).unwrap_err();
        assert_eq!(err, RuleError::PickedCell(pos(4)));
    }

    #[test]
    fn test_pick_then_attack_other_size_is_rejected() {
        let mut battle = started();
        battle.attack(Player::A, pos(4), Piece::Small).unwrap();
        battle.attack(Player::B, pos(0), Piece::Small).unwrap();
        battle.pick(Player::A, pos(4), Piece::Small).unwrap();

        let err = battle.attack(Player::A, pos(5), Piece::Large).unwrap_err();
        assert_eq!(
            err,
            RuleError::PickedPieceOnly {
                picked: Piece::Small,
                requested: Piece::Large
            }
        );
    }

    #[test]
    fn test_pick_then_attack_elsewhere_clears_pick_and_passes_turn() {
        let mut battle = started();
        battle.attack(Player::A, pos(4), Piece::Small).unwrap();
        battle.attack(Player::B, pos(0), Piece::Small).unwrap();
        battle.pick(Player::A, pos(4), Piece::Small).unwrap();

        battle.attack(Player::A, pos(5), Piece::Small).unwrap();

        assert_eq!(battle.state, ManagementState::PlayerBTurn);
        assert_eq!(battle.picked_position, None);
        assert_eq!(battle.picked_piece, None);
    }

    #[test]
    fn test_pick_twice_in_one_turn_is_rejected() {
        let mut battle = started();
        battle.attack(Player::A, pos(3), Piece::Small).unwrap();
        battle.attack(Player::B, pos(0), Piece::Small).unwrap();
        battle.attack(Player::A, pos(4), Piece::Small).unwrap();
        battle.attack(Player::B, pos(1), Piece::Medium).unwrap();
        battle.pick(Player::A, pos(3), Piece::Small).unwrap();

        let err = battle.pick(Player::A, pos(4), Piece::Small).unwrap_err();
        assert!(matches!(err, RuleError::NotYourTurn { .. }));
    }

    #[test]
    fn test_pick_opponent_piece_is_rejected() {
        let mut battle = started();
        battle.attack(Player::A, pos(4), Piece::Small).unwrap();
        let err = battle.pick(Player::B, pos(4), Piece::Small).unwrap_err();
        assert_eq!(
            err,
            RuleError::NotOwnPiece {
                position: pos(4),
                piece: Piece::Small
            }
        );
    }

    #[test]
    fn test_pick_covered_piece_is_rejected() {
        let mut battle = started();
        battle.attack(Player::A, pos(4), Piece::Small).unwrap();
        battle.attack(Player::B, pos(4), Piece::Medium).unwrap();
        let before = battle.clone();

        let err = battle.pick(Player::A, pos(4), Piece::Small).unwrap_err();
        assert!(matches!(err, RuleError::Covered { .. }));
        assert_eq!(battle, before, "failed pick must not change the state");
    }

    #[test]
    fn test_pick_out_of_turn_does_not_change_state() {
        let mut battle = started();
        battle.attack(Player::A, pos(4), Piece::Small).unwrap();
        let before = battle.clone();
        assert!(battle.pick(Player::A, pos(4), Piece::Small).is_err());
        assert_eq!(battle, before);
    }

    #[test]
    fn test_pick_uncovering_opponent_line_ends_game() {
        // B owns 0 and 1 outright and has a small at 2 covered by A's medium.
        let mut battle = started();
        battle.attack(Player::A, pos(6), Piece::Small).unwrap();
        battle.attack(Player::B, pos(2), Piece::Small).unwrap();
        battle.attack(Player::A, pos(2), Piece::Medium).unwrap();
        battle.attack(Player::B, pos(0), Piece::Large).unwrap();
        battle.attack(Player::A, pos(8), Piece::Small).unwrap();
        battle.attack(Player::B, pos(1), Piece::Large).unwrap();

        battle.pick(Player::A, pos(2), Piece::Medium).unwrap();

        assert_eq!(battle.state, ManagementState::PlayerBWin);
        assert_eq!(battle.win_line, Some(WinLine::Row1));
    }

    // =====================================================================
    // judgment
    // =====================================================================

    #[test]
    fn test_attack_completing_row_wins() {
        let mut battle = started();
        battle.attack(Player::A, pos(0), Piece::Small).unwrap();
        battle.attack(Player::B, pos(3), Piece::Small).unwrap();
        battle.attack(Player::A, pos(1), Piece::Small).unwrap();
        battle.attack(Player::B, pos(4), Piece::Small).unwrap();
        battle.attack(Player::A, pos(2), Piece::Medium).unwrap();

        assert_eq!(battle.state, ManagementState::PlayerAWin);
        assert_eq!(battle.win_line, Some(WinLine::Row1));
    }

    #[test]
    fn test_finished_battle_rejects_further_moves() {
        let mut battle = started();
        battle.attack(Player::A, pos(0), Piece::Small).unwrap();
        battle.attack(Player::B, pos(3), Piece::Small).unwrap();
        battle.attack(Player::A, pos(1), Piece::Small).unwrap();
        battle.attack(Player::B, pos(4), Piece::Small).unwrap();
        battle.attack(Player::A, pos(2), Piece::Medium).unwrap();

        for player in [Player::A, Player::B] {
            assert!(matches!(
                battle.attack(player, pos(8), Piece::Large),
                Err(RuleError::NotYourTurn { .. })
            ));
            assert!(matches!(
                battle.pick(player, pos(0), Piece::Small),
                Err(RuleError::NotYourTurn { .. })
            ));
        }
        assert_eq!(battle.state, ManagementState::PlayerAWin);
    }

    // =====================================================================
    // reset()
    // =====================================================================

    #[test]
    fn test_reset_from_win_returns_to_meeting() {
        let mut battle = started();
        battle.room_id = tactoe_protocol::RoomId::new("55555");
        battle.attack(Player::A, pos(0), Piece::Small).unwrap();
        battle.attack(Player::B, pos(3), Piece::Small).unwrap();
        battle.attack(Player::A, pos(1), Piece::Small).unwrap();
        battle.attack(Player::B, pos(4), Piece::Small).unwrap();
        battle.attack(Player::A, pos(2), Piece::Medium).unwrap();

        battle.reset();

        let mut expected = Battle::open();
        expected.room_id = tactoe_protocol::RoomId::new("55555");
        assert_eq!(battle, expected);
    }

    #[test]
    fn test_directly_beneath_skips_empty_medium() {
        let stack = PieceStack {
            small: Some(Player::B),
            medium: None,
            large: None,
        };
        assert_eq!(directly_beneath(&stack, Piece::Large), Some(Player::B));
        assert_eq!(directly_beneath(&stack, Piece::Small), None);
    }
}
