//! Rule engine for stacking tic-tac-toe battles.
//!
//! A [`Battle`] is the complete state of one room: who sits in which
//! seat, each seat's unplaced pieces, the board, and whose turn it is.
//! The rule operations ([`Battle::declare`], [`Battle::attack`],
//! [`Battle::pick`], [`Battle::reset`]) validate a move and then apply it;
//! a rejected move leaves the battle untouched.
//!
//! This crate does no I/O. Persisting snapshots and fanning them out to
//! viewers is the room layer's job.

mod battle;
mod error;
mod rule;
mod state;

pub use battle::Battle;
pub use error::RuleError;
pub use state::ManagementState;
