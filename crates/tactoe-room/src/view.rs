//! Per-viewer projection of a battle snapshot.

use tactoe_battle::{Battle, ManagementState};
use tactoe_protocol::{BattleSituation, Holding, LoginId, Player, Role, ViewState};

/// What `viewer` sees of `battle`.
///
/// Player B gets B's holding and B-relative states. Player A gets A's.
/// Anyone else is audience: an empty holding, and states framed from
/// player A's side. The board, player ids, pick, and win line are shared
/// by everyone.
pub fn project(battle: &Battle, viewer: &LoginId) -> BattleSituation {
    let (role, holding, side) = match battle.seat_of(viewer) {
        Some(Player::A) => (Role::PlayerA, *battle.holding(Player::A), Player::A),
        Some(Player::B) => (Role::PlayerB, *battle.holding(Player::B), Player::B),
        None => (Role::Audience, Holding::empty(), Player::A),
    };

    BattleSituation {
        room_id: battle.room_id.clone(),
        player_a_id: battle.player_a_id.clone(),
        player_b_id: battle.player_b_id.clone(),
        role,
        holding,
        state: view_state(battle.state, side),
        picked_position: battle.picked_position,
        picked_piece: battle.picked_piece,
        field: battle.field,
        win_line: battle.win_line,
    }
}

/// `state` as seen from `side`.
fn view_state(state: ManagementState, side: Player) -> ViewState {
    let mine = |player: Player| player == side;
    match state {
        ManagementState::Meeting => ViewState::Meeting,
        ManagementState::Error => ViewState::Error,
        ManagementState::PlayerATurn | ManagementState::PlayerBTurn => {
            if state.turn_owner().is_some_and(mine) {
                ViewState::PlayerTurn
            } else {
                ViewState::OpponentTurn
            }
        }
        ManagementState::PlayerAPicked | ManagementState::PlayerBPicked => {
            if state.turn_owner().is_some_and(mine) {
                ViewState::PlayerTurnPicked
            } else {
                ViewState::OpponentTurnPicked
            }
        }
        ManagementState::PlayerAWin | ManagementState::PlayerBWin => {
            if state.winner().is_some_and(mine) {
                ViewState::Win
            } else {
                ViewState::Lose
            }
        }
    }
}
