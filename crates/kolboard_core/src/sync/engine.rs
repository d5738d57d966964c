//! Optimistic mutation controller and refresh coordinator.
//!
//! # Responsibility
//! - Apply patches to the local store synchronously, then confirm them with
//!   the remote store in a detached task.
//! - Roll failed writes back to their pre-mutation snapshot.
//! - Merge background refreshes through the reconciliation policy.
//!
//! # Invariants
//! - At most one `mutate` call is in flight per item; later intents queue and
//!   coalesce until the in-flight one settles.
//! - A remote failure never escapes as an error: it becomes a rollback or a
//!   retained snapshot plus a `SyncEvent`.
//! - Mutation tasks are detached: dropping a ticket or cancelling refreshes
//!   never abandons a write.
//! - The state lock is never held across an await point.

use crate::config::{ConfigError, EngineConfig};
use crate::model::item::{Item, ItemId, ItemPatch};
use crate::store::item_store::{ItemStore, StoreError};
use crate::sync::events::{DiscardReason, SyncEvent, SyncEventBus};
use crate::sync::mutation::{
    MutationId, MutationLedger, MutationOutcome, MutationRecord, MutationTicket, OutcomeSender,
};
use crate::sync::reconcile::{ReconcileGuards, ReconcileReport, ReconciliationPolicy};
use crate::sync::remote::{MutateAck, RemoteError, RemoteSyncClient};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::{broadcast, oneshot};

/// Synchronous rejections from engine entry points.
#[derive(Debug)]
pub enum SyncError {
    ItemNotFound(ItemId),
    EmptyPatch(ItemId),
    /// A mutation for the item is still awaiting the remote.
    MutationInFlight(ItemId),
    /// No tokio runtime was available to drive remote calls.
    RuntimeUnavailable,
    InvalidConfig(ConfigError),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ItemNotFound(id) => write!(f, "item not found: {id}"),
            Self::EmptyPatch(id) => write!(f, "patch for item {id} changes nothing"),
            Self::MutationInFlight(id) => write!(f, "a mutation is already in flight for {id}"),
            Self::RuntimeUnavailable => write!(f, "sync engine requires a tokio runtime"),
            Self::InvalidConfig(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidConfig(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::NotFound(id) => Self::ItemNotFound(id),
        }
    }
}

impl From<ConfigError> for SyncError {
    fn from(value: ConfigError) -> Self {
        Self::InvalidConfig(value)
    }
}

/// Result of one `refresh` call.
#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Applied(ReconcileReport),
    /// The fetch failed; the previous snapshot is still shown.
    Failed(RemoteError),
    Discarded(DiscardReason),
}

#[derive(Debug, Default)]
struct RefreshClock {
    issued: u64,
    applied: u64,
    cancelled_through: u64,
}

struct Dispatch {
    mutation_id: MutationId,
    patch: ItemPatch,
}

#[derive(Default)]
struct EngineState {
    store: ItemStore,
    ledger: MutationLedger,
    /// Bumped on every local write and settle.
    write_epoch: u64,
    settled_at: HashMap<ItemId, u64>,
    refresh: RefreshClock,
}

impl EngineState {
    /// Writes `patch` locally and registers its pending record.
    ///
    /// Leaves the store untouched when the item is missing or already has a
    /// pending record.
    fn begin_mutation(&mut self, item_id: &ItemId, patch: ItemPatch) -> Result<Dispatch, SyncError> {
        if self.ledger.has_pending(item_id) {
            return Err(SyncError::MutationInFlight(item_id.clone()));
        }
        let previous = self.store.patch(item_id, &patch)?;
        self.write_epoch += 1;
        let record = MutationRecord::pending(item_id.clone(), patch.clone(), previous);
        let mutation_id = record.id;
        let registered = self.ledger.begin(record);
        debug_assert!(registered, "ledger refused a record for {item_id}");
        Ok(Dispatch { mutation_id, patch })
    }

    fn settle(
        &mut self,
        item_id: &ItemId,
        result: Result<MutateAck, RemoteError>,
    ) -> MutationOutcome {
        let Some(record) = self.ledger.finish(item_id) else {
            return MutationOutcome::Abandoned {
                item_id: item_id.clone(),
            };
        };
        self.write_epoch += 1;
        self.settled_at.insert(item_id.clone(), self.write_epoch);

        match result {
            Ok(ack) => MutationOutcome::Committed {
                record: record.commit(),
                ack,
            },
            Err(error) => {
                if let Some(previous) = record.previous.clone() {
                    self.store.restore(previous);
                }
                MutationOutcome::RolledBack {
                    record: record.roll_back(),
                    error,
                }
            }
        }
    }
}

struct Shared {
    client: Arc<dyn RemoteSyncClient>,
    config: EngineConfig,
    policy: ReconciliationPolicy,
    events: SyncEventBus,
    runtime: Handle,
    state: Mutex<EngineState>,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Optimistic sync engine owning the local item store.
///
/// Cheap to clone; clones share the same store and ledger.
#[derive(Clone)]
pub struct SyncEngine {
    shared: Arc<Shared>,
}

impl SyncEngine {
    /// Creates an engine bound to the current tokio runtime.
    ///
    /// # Errors
    /// - `RuntimeUnavailable` when called outside a runtime context.
    /// - `InvalidConfig` when `config` fails validation.
    pub fn new(client: Arc<dyn RemoteSyncClient>, config: EngineConfig) -> Result<Self, SyncError> {
        let runtime = Handle::try_current().map_err(|_| SyncError::RuntimeUnavailable)?;
        Self::with_runtime(client, config, runtime)
    }

    /// Creates an engine that spawns remote calls on `runtime`.
    pub fn with_runtime(
        client: Arc<dyn RemoteSyncClient>,
        config: EngineConfig,
        runtime: Handle,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        let policy = config.reconciliation_policy();
        let events = SyncEventBus::new(config.event_capacity);
        Ok(Self {
            shared: Arc::new(Shared {
                client,
                config,
                policy,
                events,
                runtime,
                state: Mutex::new(EngineState::default()),
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.shared.config
    }

    /// Subscribes to engine notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.shared.events.subscribe()
    }

    /// Returns a copy of every item in store order.
    pub fn snapshot(&self) -> Vec<Item> {
        self.shared.lock_state().store.all().to_vec()
    }

    pub fn get(&self, id: &ItemId) -> Option<Item> {
        self.shared.lock_state().store.get(id).ok().cloned()
    }

    /// Runs `read` against the store under the state lock.
    pub fn read_store<R>(&self, read: impl FnOnce(&ItemStore) -> R) -> R {
        read(&self.shared.lock_state().store)
    }

    pub fn has_pending(&self, id: &ItemId) -> bool {
        self.shared.lock_state().ledger.has_pending(id)
    }

    pub fn pending_count(&self) -> usize {
        self.shared.lock_state().ledger.pending_count()
    }

    /// Applies `patch` locally and dispatches it to the remote store.
    ///
    /// The store reflects the patch before this returns, unless another
    /// mutation for the same item is still in flight; then the patch is
    /// queued, merged with any other queued patch, and applied once the
    /// in-flight one settles.
    ///
    /// # Errors
    /// - `EmptyPatch` when `patch` carries no field.
    /// - `ItemNotFound` when `id` is not in the store.
    pub fn apply(&self, id: &ItemId, patch: ItemPatch) -> Result<MutationTicket, SyncError> {
        if patch.is_empty() {
            return Err(SyncError::EmptyPatch(id.clone()));
        }
        let (tx, rx) = oneshot::channel();

        let dispatch = {
            let mut state = self.shared.lock_state();
            if !state.store.contains(id) {
                return Err(SyncError::ItemNotFound(id.clone()));
            }
            if state.ledger.has_pending(id) {
                if let Some(absorbed) = state.ledger.enqueue(id.clone(), patch, tx) {
                    let _ = absorbed.send(MutationOutcome::Coalesced {
                        item_id: id.clone(),
                    });
                }
                debug!("event=mutation_queued module=sync status=pending item_id={id}");
                self.shared
                    .events
                    .emit(SyncEvent::MutationQueued { item_id: id.clone() });
                return Ok(MutationTicket::new(id.clone(), true, rx));
            }
            state.begin_mutation(id, patch)?
        };

        self.dispatch(id.clone(), dispatch, tx);
        Ok(MutationTicket::new(id.clone(), false, rx))
    }

    fn dispatch(&self, item_id: ItemId, dispatch: Dispatch, waiter: OutcomeSender) {
        announce_applied(&self.shared.events, &item_id, dispatch.mutation_id);
        let shared = Arc::clone(&self.shared);
        self.shared
            .runtime
            .spawn(drive_mutations(shared, item_id, dispatch, waiter));
    }

    /// Fetches a fresh snapshot and merges it into the store.
    ///
    /// Read failures keep the current snapshot. Results of refreshes
    /// cancelled by `cancel_refresh`, or overtaken by a newer applied
    /// refresh, are discarded.
    pub async fn refresh(&self) -> RefreshOutcome {
        let (ticket, started_at) = {
            let mut state = self.shared.lock_state();
            state.refresh.issued += 1;
            (state.refresh.issued, state.write_epoch)
        };
        debug!("event=refresh_start module=sync status=pending refresh={ticket}");

        let result = self.shared.client.fetch_all().await;

        let mut guard = self.shared.lock_state();
        let state = &mut *guard;
        let discard = if ticket <= state.refresh.cancelled_through {
            Some(DiscardReason::Cancelled)
        } else if ticket < state.refresh.applied {
            Some(DiscardReason::Superseded)
        } else {
            None
        };
        if let Some(reason) = discard {
            debug!(
                "event=refresh_discard module=sync status=skipped refresh={ticket} reason={}",
                reason.as_str()
            );
            self.shared.events.emit(SyncEvent::RefreshDiscarded { reason });
            return RefreshOutcome::Discarded(reason);
        }

        let fetched = match result {
            Ok(items) => items,
            Err(error) => {
                warn!(
                    "event=refresh_failed module=sync status=error refresh={ticket} code={}",
                    error.code
                );
                self.shared.events.emit(SyncEvent::RefreshFailed {
                    error: error.clone(),
                });
                return RefreshOutcome::Failed(error);
            }
        };

        let report = merge_snapshot(state, &self.shared.policy, fetched, started_at);
        state.refresh.applied = ticket;
        info!(
            "event=refresh_apply module=sync status=ok refresh={ticket} updated={} added={} removed={} kept_pending={} kept_recent={}",
            report.updated, report.added, report.removed, report.kept_pending, report.kept_recent
        );
        self.shared.events.emit(SyncEvent::RefreshApplied {
            report: report.clone(),
        });
        RefreshOutcome::Applied(report)
    }

    /// Merges an externally obtained snapshot as if it was fetched now.
    pub fn load_snapshot(&self, items: Vec<Item>) -> ReconcileReport {
        let mut guard = self.shared.lock_state();
        let state = &mut *guard;
        let started_at = state.write_epoch;
        merge_snapshot(state, &self.shared.policy, items, started_at)
    }

    /// Discards the results of every refresh issued so far.
    ///
    /// Used on navigation away or when the remote connection closes.
    /// In-flight mutations are unaffected.
    pub fn cancel_refresh(&self) {
        let mut state = self.shared.lock_state();
        state.refresh.cancelled_through = state.refresh.issued;
        debug!(
            "event=refresh_cancel module=sync status=ok through={}",
            state.refresh.cancelled_through
        );
    }
}

fn merge_snapshot(
    state: &mut EngineState,
    policy: &ReconciliationPolicy,
    fetched: Vec<Item>,
    started_at: u64,
) -> ReconcileReport {
    let guards = ReconcileGuards {
        ledger: &state.ledger,
        settled_at: &state.settled_at,
        refresh_started_at: started_at,
    };
    let (merged, report) = policy.merge(&state.store, fetched, &guards);
    state.store.replace(merged);
    // Later refreshes start at or after `started_at`, so older settle marks
    // can no longer guard anything.
    state.settled_at.retain(|_, settled| *settled > started_at);
    report
}

fn announce_applied(events: &SyncEventBus, item_id: &ItemId, mutation_id: MutationId) {
    debug!(
        "event=mutation_apply module=sync status=pending item_id={item_id} mutation_id={mutation_id}"
    );
    events.emit(SyncEvent::MutationApplied {
        mutation_id,
        item_id: item_id.clone(),
    });
}

/// Sends one item's mutations to the remote, one at a time.
///
/// After each settle, a queued intent for the same item (if any) is applied
/// locally and dispatched by the same task.
async fn drive_mutations(
    shared: Arc<Shared>,
    item_id: ItemId,
    mut dispatch: Dispatch,
    mut waiter: OutcomeSender,
) {
    loop {
        let result = shared.client.mutate(&item_id, &dispatch.patch).await;

        let next = {
            let mut state = shared.lock_state();
            let outcome = state.settle(&item_id, result);
            report_settle(&shared.events, &item_id, dispatch.mutation_id, &outcome);
            let _ = waiter.send(outcome);

            match state.ledger.take_queued(&item_id) {
                None => None,
                Some(intent) => match state.begin_mutation(&item_id, intent.patch) {
                    Ok(next_dispatch) => Some((next_dispatch, intent.waiter)),
                    Err(_) => {
                        debug!(
                            "event=mutation_drop module=sync status=skipped item_id={item_id}"
                        );
                        let _ = intent.waiter.send(MutationOutcome::Dropped {
                            item_id: item_id.clone(),
                        });
                        None
                    }
                },
            }
        };

        match next {
            Some((next_dispatch, next_waiter)) => {
                announce_applied(&shared.events, &item_id, next_dispatch.mutation_id);
                dispatch = next_dispatch;
                waiter = next_waiter;
            }
            None => break,
        }
    }
}

fn report_settle(
    events: &SyncEventBus,
    item_id: &ItemId,
    mutation_id: MutationId,
    outcome: &MutationOutcome,
) {
    match outcome {
        MutationOutcome::Committed { .. } => {
            info!(
                "event=mutation_commit module=sync status=ok item_id={item_id} mutation_id={mutation_id}"
            );
            events.emit(SyncEvent::MutationCommitted {
                mutation_id,
                item_id: item_id.clone(),
            });
        }
        MutationOutcome::RolledBack { error, .. } => {
            warn!(
                "event=mutation_rollback module=sync status=error item_id={item_id} mutation_id={mutation_id} code={}",
                error.code
            );
            events.emit(SyncEvent::MutationRolledBack {
                mutation_id,
                item_id: item_id.clone(),
                error: error.clone(),
                retryable: true,
            });
        }
        MutationOutcome::Coalesced { .. }
        | MutationOutcome::Dropped { .. }
        | MutationOutcome::Abandoned { .. } => {}
    }
}
