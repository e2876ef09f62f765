//! The battle snapshot.

use serde::{Deserialize, Serialize};
use tactoe_protocol::{
    Holding, LoginId, Piece, PieceStack, Player, Position, RoomId, WinLine,
};

use crate::ManagementState;

/// The full state of one room's game.
///
/// This is the unit that gets persisted: every successful move produces a
/// new snapshot appended to the room's log. Serialized with named fields;
/// unknown fields are ignored on read so older servers can read snapshots
/// written by newer ones.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Battle {
    pub room_id: RoomId,
    pub player_a_id: LoginId,
    pub player_a_holding: Holding,
    pub player_b_id: LoginId,
    pub player_b_holding: Holding,
    pub state: ManagementState,
    #[serde(default)]
    pub picked_position: Option<Position>,
    #[serde(default)]
    pub picked_piece: Option<Piece>,
    pub field: [PieceStack; Position::COUNT],
    #[serde(default)]
    pub win_line: Option<WinLine>,
}

impl Battle {
    /// A fresh battle: Meeting, no players, full hands, empty board.
    ///
    /// The room id is left empty; the room layer stamps it in once an id
    /// has been reserved.
    pub fn open() -> Self {
        Self {
            room_id: RoomId::default(),
            player_a_id: LoginId::default(),
            player_a_holding: Holding::full(),
            player_b_id: LoginId::default(),
            player_b_holding: Holding::full(),
            state: ManagementState::Meeting,
            picked_position: None,
            picked_piece: None,
            field: [PieceStack::default(); Position::COUNT],
            win_line: None,
        }
    }

    /// The seat held by `login_id`, if any.
    pub fn seat_of(&self, login_id: &LoginId) -> Option<Player> {
        if login_id.is_empty() {
            None
        } else if self.player_a_id == *login_id {
            Some(Player::A)
        } else if self.player_b_id == *login_id {
            Some(Player::B)
        } else {
            None
        }
    }

    /// `player`'s unplaced pieces.
    pub fn holding(&self, player: Player) -> &Holding {
        match player {
            Player::A => &self.player_a_holding,
            Player::B => &self.player_b_holding,
        }
    }

    pub(crate) fn holding_mut(&mut self, player: Player) -> &mut Holding {
        match player {
            Player::A => &mut self.player_a_holding,
            Player::B => &mut self.player_b_holding,
        }
    }

    /// The stack at `position`.
    pub fn stack(&self, position: Position) -> &PieceStack {
        &self.field[position.index()]
    }

    /// How many pieces of `piece` are on the board, per player.
    pub fn on_board(&self, player: Player, piece: Piece) -> usize {
        self.field
            .iter()
            .filter(|stack| stack.slot(piece) == Some(player))
            .count()
    }
}
