//! The battle's management state machine.

use serde::{Deserialize, Serialize};
use tactoe_protocol::Player;

/// Where a battle is in its lifecycle.
///
/// ```text
///            declare ×2
/// Meeting ──────────────→ PlayerATurn ⇄ PlayerBTurn
///    ↑                        │  ↑          │  ↑
///    │                   pick ↓  │ attack   ↓  │
///    │                  PlayerAPicked   PlayerBPicked
///    │                        │               │
///    │              (judgment finds a line)   │
///    │                        ↓               ↓
///    └──── reset ──── PlayerAWin / PlayerBWin
/// ```
///
/// - **Meeting**: waiting for two logins to claim seats.
/// - **PlayerXTurn**: player X may attack or pick.
/// - **PlayerXPicked**: player X lifted a piece and must now place it.
/// - **PlayerXWin**: terminal until reset.
/// - **Error**: reserved for snapshots that failed to apply; never entered
///   by the rule engine itself but still projected to viewers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ManagementState {
    Meeting,
    PlayerATurn,
    PlayerAPicked,
    PlayerBTurn,
    PlayerBPicked,
    PlayerAWin,
    PlayerBWin,
    Error,
}

impl ManagementState {
    /// The un-picked turn state for `player`.
    pub fn turn_of(player: Player) -> Self {
        match player {
            Player::A => Self::PlayerATurn,
            Player::B => Self::PlayerBTurn,
        }
    }

    /// The picked state for `player`.
    pub fn picked_by(player: Player) -> Self {
        match player {
            Player::A => Self::PlayerAPicked,
            Player::B => Self::PlayerBPicked,
        }
    }

    /// The win state for `player`.
    pub fn won_by(player: Player) -> Self {
        match player {
            Player::A => Self::PlayerAWin,
            Player::B => Self::PlayerBWin,
        }
    }

    /// The player the battle is waiting on, if any.
    pub fn turn_owner(self) -> Option<Player> {
        match self {
            Self::PlayerATurn | Self::PlayerAPicked => Some(Player::A),
            Self::PlayerBTurn | Self::PlayerBPicked => Some(Player::B),
            Self::Meeting | Self::PlayerAWin | Self::PlayerBWin | Self::Error => None,
        }
    }

    /// Returns `true` while a picked piece is waiting to be placed.
    pub fn is_picked(self) -> bool {
        matches!(self, Self::PlayerAPicked | Self::PlayerBPicked)
    }

    /// Returns `true` once someone has won.
    pub fn is_finished(self) -> bool {
        matches!(self, Self::PlayerAWin | Self::PlayerBWin)
    }

    /// The winner, if the battle is over.
    pub fn winner(self) -> Option<Player> {
        match self {
            Self::PlayerAWin => Some(Player::A),
            Self::PlayerBWin => Some(Player::B),
            _ => None,
        }
    }
}

impl std::fmt::Display for ManagementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Meeting => write!(f, "Meeting"),
            Self::PlayerATurn => write!(f, "PlayerATurn"),
            Self::PlayerAPicked => write!(f, "PlayerAPicked"),
            Self::PlayerBTurn => write!(f, "PlayerBTurn"),
            Self::PlayerBPicked => write!(f, "PlayerBPicked"),
            Self::PlayerAWin => write!(f, "PlayerAWin"),
            Self::PlayerBWin => write!(f, "PlayerBWin"),
            Self::Error => write!(f, "Error"),
        }
    }
}
