//! Drag-and-drop pipeline board.
//!
//! # Responsibility
//! - Keep a stage layout of store items for rendering.
//! - Run move gestures and persist cross-stage drops optimistically.
//!
//! # Invariants
//! - Filtering is display-only and never changes layout membership.

pub mod drag;
pub mod geometry;
pub mod pipeline;
