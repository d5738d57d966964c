//! Merge of background refresh snapshots with local optimistic state.
//!
//! # Responsibility
//! - Decide, per item, whether a fetched value or the local value wins.
//!
//! # Invariants
//! - An item with a pending mutation always keeps its local value.
//! - With `guard_recent_writes`, an item whose mutation settled after the
//!   refresh started keeps its local value; the fetched row may predate it.
//! - Every other item takes the fetched value; unguarded local-only items are
//!   dropped because the remote no longer has them.

use crate::model::item::{Item, ItemId};
use crate::store::item_store::ItemStore;
use crate::sync::mutation::MutationLedger;
use std::collections::{HashMap, HashSet};

/// Counters describing one applied refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub updated: usize,
    pub unchanged: usize,
    pub added: usize,
    pub removed: usize,
    pub kept_pending: usize,
    pub kept_recent: usize,
}

/// Per-item merge decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    TakeRemote,
    KeepPending,
    KeepRecentWrite,
}

/// Local facts the policy consults.
#[derive(Debug, Clone, Copy)]
pub struct ReconcileGuards<'a> {
    pub ledger: &'a MutationLedger,
    /// Write epoch at which each item's latest mutation settled.
    pub settled_at: &'a HashMap<ItemId, u64>,
    /// Write epoch observed when the refresh was issued.
    pub refresh_started_at: u64,
}

/// Refresh-versus-pending-write merge policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconciliationPolicy {
    pub guard_recent_writes: bool,
}

impl Default for ReconciliationPolicy {
    fn default() -> Self {
        Self {
            guard_recent_writes: true,
        }
    }
}

impl ReconciliationPolicy {
    pub fn decide(&self, id: &ItemId, guards: &ReconcileGuards<'_>) -> MergeDecision {
        if guards.ledger.has_pending(id) {
            return MergeDecision::KeepPending;
        }
        if self.guard_recent_writes {
            if let Some(settled) = guards.settled_at.get(id) {
                if *settled > guards.refresh_started_at {
                    return MergeDecision::KeepRecentWrite;
                }
            }
        }
        MergeDecision::TakeRemote
    }

    /// Builds the post-refresh item list.
    ///
    /// Order follows the fetched snapshot; guarded local-only items are
    /// appended in their local order.
    pub fn merge(
        &self,
        local: &ItemStore,
        fetched: Vec<Item>,
        guards: &ReconcileGuards<'_>,
    ) -> (Vec<Item>, ReconcileReport) {
        let mut report = ReconcileReport::default();
        let mut merged = Vec::with_capacity(fetched.len());
        let mut seen = HashSet::new();

        for remote in fetched {
            if !seen.insert(remote.id.clone()) {
                continue;
            }
            let current = local.get(&remote.id).ok();
            match (self.decide(&remote.id, guards), current) {
                (MergeDecision::KeepPending, Some(current)) => {
                    report.kept_pending += 1;
                    merged.push(current.clone());
                }
                (MergeDecision::KeepRecentWrite, Some(current)) => {
                    report.kept_recent += 1;
                    merged.push(current.clone());
                }
                (_, Some(current)) => {
                    if current == &remote {
                        report.unchanged += 1;
                    } else {
                        report.updated += 1;
                    }
                    merged.push(remote);
                }
                (_, None) => {
                    report.added += 1;
                    merged.push(remote);
                }
            }
        }

        for current in local.all() {
            if seen.contains(&current.id) {
                continue;
            }
            match self.decide(&current.id, guards) {
                MergeDecision::KeepPending => {
                    report.kept_pending += 1;
                    merged.push(current.clone());
                }
                MergeDecision::KeepRecentWrite => {
                    report.kept_recent += 1;
                    merged.push(current.clone());
                }
                MergeDecision::TakeRemote => report.removed += 1,
            }
        }

        (merged, report)
    }
}
