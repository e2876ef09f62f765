//! Core battle vocabulary shared by the rule engine, the room layer, and
//! clients.
//!
//! Everything here is plain data: serializable, cheap to clone, with no
//! game rules attached. The rules live in `tactoe-battle`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of pieces of each size a player starts with.
pub const MAX_PIECES_PER_SIZE: u8 = 2;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A login identifier, chosen by the user at login.
///
/// Newtype over `String` so a login can't be passed where a room code is
/// expected. Serialized as a plain string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LoginId(String);

impl LoginId {
    /// Wraps a raw login string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the login as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the empty login, used for unclaimed player slots.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for LoginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A short, human-enterable room code (five digits, e.g. `"40213"`).
///
/// Generation and key derivation live in `tactoe-room`; on the wire the
/// code is just a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    /// Wraps a raw room code.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A login bound to its session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Login {
    pub login_id: LoginId,
    pub session_id: String,
}

// ---------------------------------------------------------------------------
// Board vocabulary
// ---------------------------------------------------------------------------

/// One of the two seats at the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Player {
    A,
    B,
}

impl Player {
    /// The other seat.
    pub fn opponent(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

impl fmt::Display for Player {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "player A"),
            Self::B => write!(f, "player B"),
        }
    }
}

/// Piece sizes, ordered small < medium < large.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Piece {
    Small,
    Medium,
    Large,
}

impl Piece {
    /// All sizes, smallest first.
    pub const ALL: [Piece; 3] = [Piece::Small, Piece::Medium, Piece::Large];

    /// Every size strictly larger than `self`.
    pub fn larger(self) -> impl Iterator<Item = Piece> {
        Self::ALL.into_iter().filter(move |p| *p > self)
    }
}

impl fmt::Display for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Small => write!(f, "S"),
            Self::Medium => write!(f, "M"),
            Self::Large => write!(f, "L"),
        }
    }
}

/// A board cell, numbered row-major:
///
/// ```text
/// 0 1 2
/// 3 4 5
/// 6 7 8
/// ```
///
/// Serialized as the bare index. Out-of-range indices fail to
/// deserialize, so a decoded `Position` is always a real cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Position(u8);

impl Position {
    /// Number of cells on the board.
    pub const COUNT: usize = 9;

    /// Returns the cell at `index`, or `None` if it is off the board.
    pub fn new(index: u8) -> Option<Self> {
        (usize::from(index) < Self::COUNT).then_some(Self(index))
    }

    /// Zero-based index into the field.
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl TryFrom<u8> for Position {
    type Error = String;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::new(index).ok_or_else(|| format!("position {index} is off the board"))
    }
}

impl From<Position> for u8 {
    fn from(pos: Position) -> Self {
        pos.0
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One of the eight winning lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WinLine {
    Row1,
    Row2,
    Row3,
    Column1,
    Column2,
    Column3,
    Diagonal,
    AntiDiagonal,
}

impl WinLine {
    /// The order in which judgment looks for a completed line. When two
    /// lines complete at once, the first one here wins.
    pub const SCAN_ORDER: [WinLine; 8] = [
        WinLine::Row1,
        WinLine::Column1,
        WinLine::Diagonal,
        WinLine::Row2,
        WinLine::Row3,
        WinLine::Column2,
        WinLine::Column3,
        WinLine::AntiDiagonal,
    ];

    /// The three cell indices on this line.
    pub fn cells(self) -> [usize; 3] {
        match self {
            Self::Row1 => [0, 1, 2],
            Self::Row2 => [3, 4, 5],
            Self::Row3 => [6, 7, 8],
            Self::Column1 => [0, 3, 6],
            Self::Column2 => [1, 4, 7],
            Self::Column3 => [2, 5, 8],
            Self::Diagonal => [0, 4, 8],
            Self::AntiDiagonal => [2, 4, 6],
        }
    }
}

// ---------------------------------------------------------------------------
// Holding
// ---------------------------------------------------------------------------

/// A player's unplaced pieces, counted by size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Holding {
    pub small: u8,
    pub medium: u8,
    pub large: u8,
}

impl Holding {
    /// The starting inventory: two of each size.
    pub fn full() -> Self {
        Self {
            small: MAX_PIECES_PER_SIZE,
            medium: MAX_PIECES_PER_SIZE,
            large: MAX_PIECES_PER_SIZE,
        }
    }

    /// No pieces at all (what an audience member "holds").
    pub fn empty() -> Self {
        Self::default()
    }

    /// How many pieces of `piece` remain in hand.
    pub fn count(&self, piece: Piece) -> u8 {
        match piece {
            Piece::Small => self.small,
            Piece::Medium => self.medium,
            Piece::Large => self.large,
        }
    }

    fn slot_mut(&mut self, piece: Piece) -> &mut u8 {
        match piece {
            Piece::Small => &mut self.small,
            Piece::Medium => &mut self.medium,
            Piece::Large => &mut self.large,
        }
    }

    /// Takes one piece out of hand. Returns `false` (and changes nothing)
    /// if none are left.
    pub fn take(&mut self, piece: Piece) -> bool {
        let slot = self.slot_mut(piece);
        if *slot == 0 {
            return false;
        }
        *slot -= 1;
        true
    }

    /// Puts one piece back in hand. Returns `false` (and changes nothing)
    /// if the hand is already full for that size.
    pub fn put_back(&mut self, piece: Piece) -> bool {
        let slot = self.slot_mut(piece);
        if *slot >= MAX_PIECES_PER_SIZE {
            return false;
        }
        *slot += 1;
        true
    }
}

// ---------------------------------------------------------------------------
// PieceStack
// ---------------------------------------------------------------------------

/// Occupancy of one board cell across the three piece sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PieceStack {
    pub small: Option<Player>,
    pub medium: Option<Player>,
    pub large: Option<Player>,
}

impl PieceStack {
    /// Who occupies the `piece` slot, if anyone.
    pub fn slot(&self, piece: Piece) -> Option<Player> {
        match piece {
            Piece::Small => self.small,
            Piece::Medium => self.medium,
            Piece::Large => self.large,
        }
    }

    /// Sets the `piece` slot.
    pub fn set_slot(&mut self, piece: Piece, owner: Option<Player>) {
        match piece {
            Piece::Small => self.small = owner,
            Piece::Medium => self.medium = owner,
            Piece::Large => self.large = owner,
        }
    }

    /// The largest occupied size and its owner.
    pub fn top(&self) -> Option<(Piece, Player)> {
        Piece::ALL
            .into_iter()
            .rev()
            .find_map(|piece| self.slot(piece).map(|owner| (piece, owner)))
    }

    /// The player whose piece is visible on top of this cell.
    pub fn owner(&self) -> Option<Player> {
        self.top().map(|(_, owner)| owner)
    }

    /// Returns `true` if no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.top().is_none()
    }
}

// ---------------------------------------------------------------------------
// Per-viewer projection
// ---------------------------------------------------------------------------

/// How the viewer relates to the battle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    PlayerA,
    PlayerB,
    Audience,
}

/// The battle state framed from the viewer's side of the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewState {
    Meeting,
    PlayerTurn,
    PlayerTurnPicked,
    OpponentTurn,
    OpponentTurnPicked,
    Win,
    Lose,
    Error,
}

/// What one viewer sees: the shared board plus their own role, holding
/// and viewer-relative state. One of these is pushed per log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleSituation {
    pub room_id: RoomId,
    pub player_a_id: LoginId,
    pub player_b_id: LoginId,
    pub role: Role,
    pub holding: Holding,
    pub state: ViewState,
    pub picked_position: Option<Position>,
    pub picked_piece: Option<Piece>,
    pub field: [PieceStack; Position::COUNT],
    pub win_line: Option<WinLine>,
}

// =========================================================================
// Tests
// =========================================================================
