//! Realtime planning-poker session core.
//!
//! Participants join a named room, vote on stories with a fixed card scale,
//! and a moderator reveals and finalizes estimates. The shared room document
//! lives in a hosted realtime store; every client converges by normalizing
//! each snapshot it receives, and all mutations are last-write-wins at field
//! granularity. This crate is the state-synchronization and voting core; it
//! talks to the store only through the [`store::SyncStore`] abstraction.

pub mod assist;
pub mod config;
pub mod consensus;
mod error;
pub mod identity;
pub mod model;
pub mod presence;
pub mod session;
pub mod store;

pub use error::SessionError;
