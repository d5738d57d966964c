//! Core engine of the KOL campaign pipeline board.
//! Owns the local deliverable store, optimistic mutations against the remote
//! store, refresh reconciliation and the drag-and-drop board state.

pub mod board;
pub mod config;
pub mod logging;
pub mod model;
pub mod store;
pub mod sync;

pub use board::drag::{CancelReason, DragError, DragOver, DragSession, DropZone, OverTarget};
pub use board::geometry::{Point, Rect};
pub use board::pipeline::{BoardColumn, BoardFilter, BoardScope, DragResolution, PipelineBoard};
pub use config::{ConfigError, EngineConfig};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::item::{DeliverableMetrics, Item, ItemId, ItemPatch};
pub use model::stage::Stage;
pub use store::container_index::ContainerIndex;
pub use store::item_store::{ItemStore, StoreError, StoreResult};
pub use sync::engine::{RefreshOutcome, SyncEngine, SyncError};
pub use sync::events::{DiscardReason, SyncEvent, SyncEventBus};
pub use sync::memory::InMemoryRemote;
pub use sync::mutation::{MutationId, MutationOutcome, MutationRecord, MutationStatus, MutationTicket};
pub use sync::reconcile::{ReconcileReport, ReconciliationPolicy};
pub use sync::remote::{MutateAck, RemoteError, RemoteOperation, RemoteResult, RemoteSyncClient};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
