//! Rooms for tactoe: where battles are stored, watched, and played.
//!
//! A room is three store keys sharing one TTL: a reservation record, a
//! membership set, and an append-only log of [`Battle`] snapshots. Every
//! successful move appends a snapshot; every viewer tails the log with its
//! own [`BattleListener`] and gets each snapshot projected to its side of
//! the board.
//!
//! # Key types
//!
//! - [`BattleInteractor`]: the use-case layer the server calls
//! - [`BattleRepository`]: room persistence over a [`MemDb`]
//! - [`BattleListener`]: one viewer's cursor over a room's log
//! - [`project`]: snapshot to per-viewer situation
//! - [`RoomConfig`]: TTLs, blocking, and retry tuning
//!
//! [`Battle`]: tactoe_battle::Battle
//! [`MemDb`]: tactoe_store::MemDb

mod config;
mod error;
mod id;
mod interactor;
mod listener;
mod repository;
mod view;

pub use config::RoomConfig;
pub use error::{ErrorKind, ResultExt, RoomError};
pub use id::{RoomKeys, generate_room_id};
pub use interactor::BattleInteractor;
pub use listener::BattleListener;
pub use repository::{BATTLE_MESSAGE_KEY, BattleRepository, Cursor};
pub use view::project;
