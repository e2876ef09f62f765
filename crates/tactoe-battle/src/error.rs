//! Error types for the rule engine.

use tactoe_protocol::{Piece, Player, Position};

use crate::ManagementState;

/// Why a move was rejected.
///
/// Every variant except [`RuleError::BattleFull`] and
/// [`RuleError::Inconsistent`] is a plain rule violation: report it to the
/// caller, don't retry. The battle is never modified when one of these is
/// returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    /// The battle is not waiting on this player (or is not running).
    #[error("it is not {player}'s turn: {state}")]
    NotYourTurn {
        player: Player,
        state: ManagementState,
    },

    /// A raw cell index outside the board.
    #[error("selected unexpected position: {0}")]
    InvalidPosition(u8),

    /// A picked piece can't go straight back where it came from.
    #[error("cannot be relocated to the field from which it was picked: {0}")]
    PickedCell(Position),

    /// After a pick, only the picked size may be placed.
    #[error("only the picked piece can be rearranged: picked {picked}, requested {requested}")]
    PickedPieceOnly { picked: Piece, requested: Piece },

    /// No piece of this size left in hand.
    #[error("missing pieces on holding: {0}")]
    MissingPiece(Piece),

    /// A piece of this size or larger is in the way at this cell.
    #[error("pieces larger than the specified size have been placed. pos: {position}, size: {piece}")]
    Covered { position: Position, piece: Piece },

    /// The piece would sit directly on the same player's piece.
    #[error("cannot stack it on own piece at {0}")]
    StackOnOwn(Position),

    /// The slot is empty or belongs to the other player.
    #[error("it's not the player's piece. pos: {position}, size: {piece}")]
    NotOwnPiece { position: Position, piece: Piece },

    /// Both seats are taken by other logins.
    #[error("battle has already started")]
    BattleFull,

    /// The snapshot itself breaks an invariant (e.g. a full hand with
    /// the same size still on the board). Indicates a bug or a corrupt
    /// snapshot, never a user mistake.
    #[error("battle snapshot is inconsistent: {0}")]
    Inconsistent(String),
}

impl RuleError {
    /// Returns `true` for errors caused by the battle's situation rather
    /// than by the move itself.
    pub fn is_precondition(&self) -> bool {
        matches!(self, Self::BattleFull)
    }

    /// Returns `true` for invariant violations that indicate a bug.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Inconsistent(_))
    }
}
