//! Optimistic synchronization between the local item store and the remote
//! store.
//!
//! # Responsibility
//! - Define the remote boundary and its edge mapping.
//! - Apply, confirm and roll back optimistic mutations.
//! - Reconcile background refreshes with in-flight writes.
//!
//! # Invariants
//! - The local store is only written by `SyncEngine`.
//! - Remote errors become state transitions and events, never panics.

pub mod engine;
pub mod events;
pub mod memory;
pub mod mutation;
pub mod reconcile;
pub mod remote;
pub mod wire;
