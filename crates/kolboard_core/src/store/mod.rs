//! Local item storage and derived stage partitions.
//!
//! # Responsibility
//! - Keep the single process-local copy of board items.
//! - Derive per-stage views without owning any state of their own.

pub mod container_index;
pub mod item_store;
