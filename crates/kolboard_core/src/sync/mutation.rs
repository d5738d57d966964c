//! Mutation records, per-item ledger and completion tickets.
//!
//! # Responsibility
//! - Track the single in-flight mutation allowed per item.
//! - Coalesce intents issued while a mutation is in flight.
//! - Hand callers a ticket that resolves once their intent settles.
//!
//! # Invariants
//! - At most one `Pending` record exists per item.
//! - At most one queued intent exists per item; newer intents merge into it.
//! - Records are owned by the ledger and leave it exactly once, on settle.

use crate::model::item::{Item, ItemId, ItemPatch};
use crate::sync::remote::{MutateAck, RemoteError};
use std::collections::HashMap;
use tokio::sync::oneshot;
use uuid::Uuid;

/// Identifier of one dispatched mutation.
pub type MutationId = Uuid;

/// Lifecycle of a mutation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationStatus {
    Pending,
    Committed,
    RolledBack,
}

impl MutationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Committed => "committed",
            Self::RolledBack => "rolled_back",
        }
    }
}

/// One optimistic write and the snapshot needed to undo it.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub id: MutationId,
    pub item_id: ItemId,
    pub patch: ItemPatch,
    /// Pre-mutation value; dropped once the remote commits.
    pub previous: Option<Item>,
    pub status: MutationStatus,
}

impl MutationRecord {
    pub fn pending(item_id: ItemId, patch: ItemPatch, previous: Item) -> Self {
        Self {
            id: Uuid::new_v4(),
            item_id,
            patch,
            previous: Some(previous),
            status: MutationStatus::Pending,
        }
    }

    pub(crate) fn commit(mut self) -> Self {
        self.status = MutationStatus::Committed;
        self.previous = None;
        self
    }

    pub(crate) fn roll_back(mut self) -> Self {
        self.status = MutationStatus::RolledBack;
        self
    }
}

/// Terminal result delivered to a ticket.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome {
    Committed {
        record: MutationRecord,
        ack: MutateAck,
    },
    /// The remote failed; the item shows its pre-mutation value again.
    RolledBack {
        record: MutationRecord,
        error: RemoteError,
    },
    /// A later intent for the same item absorbed this one before dispatch.
    Coalesced { item_id: ItemId },
    /// The item left the store before the queued intent could be applied.
    Dropped { item_id: ItemId },
    /// The driving task ended without reporting, e.g. runtime shutdown.
    Abandoned { item_id: ItemId },
}

impl MutationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    pub fn is_rolled_back(&self) -> bool {
        matches!(self, Self::RolledBack { .. })
    }
}

/// Handle resolving once an `apply` intent settles.
///
/// Dropping the ticket does not cancel the write.
#[derive(Debug)]
pub struct MutationTicket {
    item_id: ItemId,
    queued: bool,
    rx: oneshot::Receiver<MutationOutcome>,
}

impl MutationTicket {
    pub(crate) fn new(item_id: ItemId, queued: bool, rx: oneshot::Receiver<MutationOutcome>) -> Self {
        Self { item_id, queued, rx }
    }

    pub fn item_id(&self) -> &ItemId {
        &self.item_id
    }

    /// Whether the intent waited behind an in-flight mutation.
    pub fn is_queued(&self) -> bool {
        self.queued
    }

    pub async fn settled(self) -> MutationOutcome {
        match self.rx.await {
            Ok(outcome) => outcome,
            Err(_) => MutationOutcome::Abandoned {
                item_id: self.item_id,
            },
        }
    }
}

pub(crate) type OutcomeSender = oneshot::Sender<MutationOutcome>;

/// Intent waiting for the in-flight mutation of the same item.
#[derive(Debug)]
pub(crate) struct QueuedIntent {
    pub patch: ItemPatch,
    pub waiter: OutcomeSender,
}

/// Per-item bookkeeping of pending records and queued intents.
#[derive(Debug, Default)]
pub struct MutationLedger {
    pending: HashMap<ItemId, MutationRecord>,
    queued: HashMap<ItemId, QueuedIntent>,
}

impl MutationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_pending(&self, item_id: &ItemId) -> bool {
        self.pending.contains_key(item_id)
    }

    pub fn pending(&self, item_id: &ItemId) -> Option<&MutationRecord> {
        self.pending.get(item_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queued.len()
    }

    /// Registers the in-flight record for its item.
    ///
    /// Returns `false` and leaves the ledger unchanged when the item already
    /// has a pending record.
    pub fn begin(&mut self, record: MutationRecord) -> bool {
        if self.pending.contains_key(&record.item_id) {
            return false;
        }
        self.pending.insert(record.item_id.clone(), record);
        true
    }

    /// Removes and returns the pending record of `item_id`.
    pub fn finish(&mut self, item_id: &ItemId) -> Option<MutationRecord> {
        self.pending.remove(item_id)
    }

    /// Queues an intent, merging it over any intent already waiting.
    ///
    /// Returns the waiter of the absorbed intent so it can be told.
    pub(crate) fn enqueue(
        &mut self,
        item_id: ItemId,
        patch: ItemPatch,
        waiter: OutcomeSender,
    ) -> Option<OutcomeSender> {
        match self.queued.remove(&item_id) {
            Some(earlier) => {
                let merged = earlier.patch.merge(patch);
                self.queued.insert(
                    item_id,
                    QueuedIntent {
                        patch: merged,
                        waiter,
                    },
                );
                Some(earlier.waiter)
            }
            None => {
                self.queued.insert(item_id, QueuedIntent { patch, waiter });
                None
            }
        }
    }

    pub(crate) fn take_queued(&mut self, item_id: &ItemId) -> Option<QueuedIntent> {
        self.queued.remove(item_id)
    }
}
