//! Sync notifications side channel.
//!
//! # Responsibility
//! - Broadcast engine state transitions to the UI shell (toasts, error
//!   indicators, refresh spinners) without blocking the engine.
//!
//! # Invariants
//! - Emission never fails the caller; events are dropped when nobody listens.
//! - Slow subscribers lag and lose the oldest events instead of applying
//!   backpressure to the engine.

use crate::model::item::ItemId;
use crate::sync::mutation::MutationId;
use crate::sync::reconcile::ReconcileReport;
use crate::sync::remote::RemoteError;
use tokio::sync::broadcast;

/// Why a refresh result was thrown away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscardReason {
    /// `cancel_refresh` ran after this refresh started.
    Cancelled,
    /// A newer refresh already applied its snapshot.
    Superseded,
}

impl DiscardReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Superseded => "superseded",
        }
    }
}

/// Engine notification.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// A patch was written locally and dispatched to the remote.
    MutationApplied {
        mutation_id: MutationId,
        item_id: ItemId,
    },
    /// A patch is waiting behind an in-flight mutation for the same item.
    MutationQueued { item_id: ItemId },
    MutationCommitted {
        mutation_id: MutationId,
        item_id: ItemId,
    },
    /// The remote rejected a patch and the local value was restored.
    MutationRolledBack {
        mutation_id: MutationId,
        item_id: ItemId,
        error: RemoteError,
        /// The user may repeat the action; the engine never does.
        retryable: bool,
    },
    RefreshApplied { report: ReconcileReport },
    /// Read failure; the last good snapshot stays visible.
    RefreshFailed { error: RemoteError },
    RefreshDiscarded { reason: DiscardReason },
}

/// Broadcast bus for `SyncEvent`s.
#[derive(Debug, Clone)]
pub struct SyncEventBus {
    tx: broadcast::Sender<SyncEvent>,
    capacity: usize,
}

impl SyncEventBus {
    /// Creates a bus buffering up to `capacity` events per subscriber.
    ///
    /// `capacity` must be non-zero; `EngineConfig::validate` enforces this.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, capacity }
    }

    /// Receives every event emitted after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: SyncEvent) {
        // No subscribers is the normal state for headless callers.
        let _ = self.tx.send(event);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::{DiscardReason, SyncEvent, SyncEventBus};
    use crate::model::item::ItemId;

    #[test]
    fn emit_without_subscribers_is_silent() {
        let bus = SyncEventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        bus.emit(SyncEvent::RefreshDiscarded {
            reason: DiscardReason::Cancelled,
        });
    }

    #[tokio::test]
    async fn subscriber_receives_events_in_order() {
        let bus = SyncEventBus::new(4);
        let mut rx = bus.subscribe();

        bus.emit(SyncEvent::MutationQueued {
            item_id: ItemId::from("d-1"),
        });
        bus.emit(SyncEvent::RefreshDiscarded {
            reason: DiscardReason::Superseded,
        });

        assert_eq!(
            rx.recv().await.unwrap(),
            SyncEvent::MutationQueued {
                item_id: ItemId::from("d-1")
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            SyncEvent::RefreshDiscarded {
                reason: DiscardReason::Superseded
            }
        );
    }
}
