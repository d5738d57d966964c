//! In-memory remote store.
//!
//! # Responsibility
//! - Provide a `RemoteSyncClient` over process-local rows for demos, shells
//!   without a backend, and tests.
//! - Expose latency and failure controls: pausable gates, one-shot failures,
//!   call counters and a per-item in-flight high-water mark.
//!
//! # Invariants
//! - `fetch_all` snapshots rows when called, so a held fetch returns data as
//!   of its start.
//! - `mutate` applies its patch only after passing the gate and only when no
//!   failure is injected.

use crate::model::item::{Item, ItemId, ItemPatch};
use crate::sync::remote::{MutateAck, RemoteError, RemoteOperation, RemoteResult, RemoteSyncClient};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::Semaphore;

/// Pausable admission gate.
#[derive(Debug)]
struct Gate {
    paused: AtomicBool,
    waiting: AtomicUsize,
    permits: Semaphore,
}

impl Gate {
    fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
            waiting: AtomicUsize::new(0),
            permits: Semaphore::new(0),
        }
    }

    async fn pass(&self) {
        if !self.paused.load(Ordering::SeqCst) {
            return;
        }
        self.waiting.fetch_add(1, Ordering::SeqCst);
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
        self.waiting.fetch_sub(1, Ordering::SeqCst);
    }

    fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    fn release(&self, count: usize) {
        self.permits.add_permits(count);
    }

    fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.permits.add_permits(self.waiting.load(Ordering::SeqCst));
    }

    fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct RemoteState {
    rows: Vec<Item>,
    revisions: HashMap<ItemId, u64>,
    fail_next_fetch: Option<RemoteError>,
    fail_next_mutate: Option<RemoteError>,
    fetch_calls: usize,
    mutate_calls: usize,
    in_flight: HashMap<ItemId, usize>,
    max_in_flight: HashMap<ItemId, usize>,
    accepted: Vec<(ItemId, ItemPatch)>,
}

/// Process-local `RemoteSyncClient` implementation.
#[derive(Debug)]
pub struct InMemoryRemote {
    state: Mutex<RemoteState>,
    fetch_gate: Gate,
    mutate_gate: Gate,
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl InMemoryRemote {
    pub fn new(rows: Vec<Item>) -> Self {
        Self {
            state: Mutex::new(RemoteState {
                rows,
                ..RemoteState::default()
            }),
            fetch_gate: Gate::new(),
            mutate_gate: Gate::new(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, RemoteState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current remote rows.
    pub fn rows(&self) -> Vec<Item> {
        self.lock_state().rows.clone()
    }

    pub fn row(&self, id: &ItemId) -> Option<Item> {
        self.lock_state()
            .rows
            .iter()
            .find(|row| &row.id == id)
            .cloned()
    }

    /// Edits a row as another client would, bypassing gates and counters.
    pub fn edit(&self, id: &ItemId, patch: &ItemPatch) -> bool {
        let mut state = self.lock_state();
        match state.rows.iter_mut().find(|row| &row.id == id) {
            Some(row) => {
                patch.apply_to(row);
                true
            }
            None => false,
        }
    }

    /// Inserts a row as another client would.
    pub fn insert(&self, item: Item) {
        self.lock_state().rows.push(item);
    }

    /// Deletes a row as another client would.
    pub fn remove(&self, id: &ItemId) -> bool {
        let mut state = self.lock_state();
        let before = state.rows.len();
        state.rows.retain(|row| &row.id != id);
        state.rows.len() != before
    }

    /// Makes the next `fetch_all` fail with `code`.
    pub fn fail_next_fetch(&self, code: &str) {
        self.lock_state().fail_next_fetch = Some(RemoteError::new(
            RemoteOperation::Fetch,
            code,
            "injected fetch failure",
            true,
        ));
    }

    /// Makes the next `mutate` to pass its gate fail with `code`.
    pub fn fail_next_mutate(&self, code: &str) {
        self.lock_state().fail_next_mutate = Some(RemoteError::new(
            RemoteOperation::Mutate,
            code,
            "injected mutate failure",
            true,
        ));
    }

    /// Holds every subsequent `fetch_all` until released.
    pub fn pause_fetches(&self) {
        self.fetch_gate.pause();
    }

    pub fn release_fetches(&self, count: usize) {
        self.fetch_gate.release(count);
    }

    pub fn resume_fetches(&self) {
        self.fetch_gate.resume();
    }

    /// Holds every subsequent `mutate` until released.
    pub fn pause_mutations(&self) {
        self.mutate_gate.pause();
    }

    pub fn release_mutations(&self, count: usize) {
        self.mutate_gate.release(count);
    }

    pub fn resume_mutations(&self) {
        self.mutate_gate.resume();
    }

    /// Number of `mutate` calls currently held at the gate.
    pub fn held_mutations(&self) -> usize {
        self.mutate_gate.waiting()
    }

    /// Number of `fetch_all` calls currently held at the gate.
    pub fn held_fetches(&self) -> usize {
        self.fetch_gate.waiting()
    }

    pub fn fetch_calls(&self) -> usize {
        self.lock_state().fetch_calls
    }

    pub fn mutate_calls(&self) -> usize {
        self.lock_state().mutate_calls
    }

    /// Highest number of simultaneous `mutate` calls observed for `id`.
    pub fn max_in_flight(&self, id: &ItemId) -> usize {
        self.lock_state()
            .max_in_flight
            .get(id)
            .copied()
            .unwrap_or(0)
    }

    /// Patches accepted for `id`, in order.
    pub fn accepted_patches(&self, id: &ItemId) -> Vec<ItemPatch> {
        self.lock_state()
            .accepted
            .iter()
            .filter(|(item_id, _)| item_id == id)
            .map(|(_, patch)| patch.clone())
            .collect()
    }
}

#[async_trait]
impl RemoteSyncClient for InMemoryRemote {
    async fn fetch_all(&self) -> RemoteResult<Vec<Item>> {
        let result = {
            let mut state = self.lock_state();
            state.fetch_calls += 1;
            match state.fail_next_fetch.take() {
                Some(error) => Err(error),
                None => Ok(state.rows.clone()),
            }
        };
        self.fetch_gate.pass().await;
        result
    }

    async fn mutate(&self, id: &ItemId, patch: &ItemPatch) -> RemoteResult<MutateAck> {
        {
            let mut state = self.lock_state();
            state.mutate_calls += 1;
            let in_flight = {
                let counter = state.in_flight.entry(id.clone()).or_insert(0);
                *counter += 1;
                *counter
            };
            let high_water = state.max_in_flight.entry(id.clone()).or_insert(0);
            *high_water = (*high_water).max(in_flight);
        }

        self.mutate_gate.pass().await;

        let mut state = self.lock_state();
        if let Some(counter) = state.in_flight.get_mut(id) {
            *counter = counter.saturating_sub(1);
        }
        if let Some(error) = state.fail_next_mutate.take() {
            return Err(error);
        }
        let Some(row) = state.rows.iter_mut().find(|row| &row.id == id) else {
            return Err(RemoteError::new(
                RemoteOperation::Mutate,
                "not_found",
                format!("no deliverable row with id {id}"),
                false,
            ));
        };
        patch.apply_to(row);
        let revision = {
            let revision = state.revisions.entry(id.clone()).or_insert(0);
            *revision += 1;
            *revision
        };
        state.accepted.push((id.clone(), patch.clone()));
        Ok(MutateAck {
            item_id: id.clone(),
            revision: Some(revision),
        })
    }
}
