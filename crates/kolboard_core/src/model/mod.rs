//! Domain model for the deliverable pipeline board.
//!
//! # Responsibility
//! - Define canonical data structures used by the sync engine and the board.
//!
//! # Invariants
//! - Every deliverable is identified by a stable `ItemId`.
//! - Stage keys come from a closed set known at startup.

pub mod item;
pub mod stage;
