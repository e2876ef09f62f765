//! The key/value store behind tactoe rooms and logins.
//!
//! Everything the server persists lives here under string keys:
//!
//! - **strings** for room reservations and login sessions,
//! - **sets** for room membership,
//! - **streams** (append-only logs of small field maps) for each room's
//!   battle snapshots.
//!
//! Every key can carry a TTL. Expired keys read as absent and are purged by
//! the sweeper ([`spawn_sweeper`]).
//!
//! The [`MemDb`] trait is the seam; [`MemoryDb`] is the in-process
//! implementation the server runs on.

#![allow(async_fn_in_trait)]

mod config;
mod db;
mod error;
mod memory;
mod sweeper;

pub use config::StoreConfig;
pub use db::{EntryId, MemDb};
pub use error::StoreError;
pub use memory::MemoryDb;
pub use sweeper::spawn_sweeper;
