//! Deliverable pipeline board.
//!
//! # Responsibility
//! - Own the rendered stage layout and the drag state machine.
//! - Persist cross-stage drops through the sync engine.
//! - Expose filtered columns without touching layout membership.
//!
//! # Invariants
//! - Outside a drag, the layout partitions the scoped store items exactly.
//! - Store refreshes never rewrite the layout while a drag is active; the
//!   layout is rebuilt when the gesture ends.
//! - Only a stage change against the store's value at release is persisted;
//!   in-stage order is view state.

use crate::board::drag::{CancelReason, DragError, DragOver, DragPhase, DragSession, DropDecision, DropZone};
use crate::board::geometry::{Point, Rect};
use crate::model::item::{Item, ItemId, ItemPatch};
use crate::model::stage::Stage;
use crate::store::container_index::ContainerIndex;
use crate::sync::engine::SyncEngine;
use crate::sync::mutation::MutationTicket;
use log::{debug, info};

/// Which store items the board shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BoardScope {
    #[default]
    All,
    Campaign(String),
}

impl BoardScope {
    pub fn includes(&self, item: &Item) -> bool {
        match self {
            Self::All => true,
            Self::Campaign(campaign_id) => &item.campaign_id == campaign_id,
        }
    }
}

/// Display-only text filter.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoardFilter {
    query: String,
}

impl BoardFilter {
    pub fn new(query: impl AsRef<str>) -> Self {
        Self {
            query: query.as_ref().trim().to_lowercase(),
        }
    }

    /// Case-insensitive match over label and notes; blank matches all.
    pub fn matches(&self, item: &Item) -> bool {
        if self.query.is_empty() {
            return true;
        }
        item.label.to_lowercase().contains(&self.query)
            || item
                .metrics
                .notes
                .as_deref()
                .is_some_and(|notes| notes.to_lowercase().contains(&self.query))
    }
}

/// Column as handed to the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardColumn {
    pub stage: Stage,
    pub title: &'static str,
    /// Visible items in display order.
    pub items: Vec<Item>,
    /// Items in the stage before filtering.
    pub total: usize,
}

/// How a gesture ended.
#[derive(Debug)]
pub enum DragResolution {
    Dropped {
        item_id: ItemId,
        from: Stage,
        to: Stage,
        /// Present only when the stage changed.
        mutation: Option<MutationTicket>,
    },
    Cancelled {
        item_id: ItemId,
        reason: CancelReason,
    },
}

/// Kanban view of deliverables driven by a `SyncEngine`.
pub struct PipelineBoard {
    engine: SyncEngine,
    scope: BoardScope,
    layout: ContainerIndex,
    phase: DragPhase,
    /// Set when a store sync was skipped during a drag.
    stale: bool,
}

impl PipelineBoard {
    pub fn new(engine: SyncEngine, scope: BoardScope) -> Self {
        let mut board = Self {
            engine,
            scope,
            layout: ContainerIndex::default(),
            phase: DragPhase::Idle,
            stale: false,
        };
        board.rebuild_layout();
        board
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn scope(&self) -> &BoardScope {
        &self.scope
    }

    pub fn layout(&self) -> &ContainerIndex {
        &self.layout
    }

    pub fn drag_session(&self) -> Option<&DragSession> {
        self.phase.session()
    }

    pub fn is_dragging(&self) -> bool {
        self.phase.is_dragging()
    }

    /// Whether a store change arrived during the current drag.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Rebuilds the layout from the store unless a drag is active.
    ///
    /// Returns `false` when the sync was deferred to the end of the drag.
    pub fn sync_from_store(&mut self) -> bool {
        if self.phase.is_dragging() {
            self.stale = true;
            return false;
        }
        self.rebuild_layout();
        true
    }

    /// Whether the layout holds every scoped store item exactly once.
    pub fn is_partition_complete(&self) -> bool {
        self.engine.read_store(|store| {
            self.layout.covers_exactly(
                store
                    .all()
                    .iter()
                    .filter(|item| self.scope.includes(item))
                    .map(|item| &item.id),
            )
        })
    }

    /// Columns in board order, narrowed by `filter`.
    pub fn columns(&self, filter: &BoardFilter) -> Vec<BoardColumn> {
        self.engine.read_store(|store| {
            self.layout
                .columns()
                .map(|(stage, ids)| BoardColumn {
                    stage,
                    title: stage.title(),
                    items: ids
                        .iter()
                        .filter_map(|id| store.get(id).ok())
                        .filter(|item| filter.matches(item))
                        .cloned()
                        .collect(),
                    total: ids.len(),
                })
                .collect()
        })
    }

    /// Starts a gesture on `item_id`.
    pub fn begin_drag(&mut self, item_id: &ItemId, cursor_offset: Point) -> Result<(), DragError> {
        let session = self
            .phase
            .begin(&self.layout, item_id.clone(), cursor_offset)?;
        debug!(
            "event=drag_start module=board status=ok item_id={} source={}",
            session.item_id, session.source
        );
        Ok(())
    }

    /// Applies one pointer-over event to the layout.
    ///
    /// Returns whether the layout changed.
    pub fn drag_over(&mut self, event: &DragOver) -> Result<bool, DragError> {
        self.phase.over(&mut self.layout, event)
    }

    /// Ends the gesture at `dragged_rect` over the reported drop zones.
    ///
    /// A drop outside the stage the store holds at release is applied
    /// optimistically and dispatched; the returned ticket resolves once the
    /// remote confirms or the move is rolled back. `from` reports the stage
    /// the gesture started in.
    pub fn release(
        &mut self,
        dragged_rect: &Rect,
        zones: &[DropZone],
    ) -> Result<DragResolution, DragError> {
        let item_id = self
            .phase
            .session()
            .map(|session| session.item_id.clone())
            .ok_or(DragError::NoActiveSession)?;
        let Some(persisted) = self.persisted_stage(&item_id) else {
            self.phase.interrupt();
            return Ok(self.cancelled(item_id, CancelReason::ItemVanished));
        };

        let resolution = match self
            .phase
            .finish(&mut self.layout, dragged_rect, zones, persisted)?
        {
            DropDecision::Cancel { session, reason } => {
                return Ok(self.cancelled(session.item_id, reason));
            }
            DropDecision::Reorder { session } => DragResolution::Dropped {
                item_id: session.item_id,
                from: session.source,
                to: session.current,
                mutation: None,
            },
            DropDecision::Persist { session, target } => {
                match self
                    .engine
                    .apply(&session.item_id, ItemPatch::move_to(target))
                {
                    Ok(ticket) => DragResolution::Dropped {
                        item_id: session.item_id,
                        from: session.source,
                        to: target,
                        mutation: Some(ticket),
                    },
                    Err(_) => {
                        return Ok(self.cancelled(session.item_id, CancelReason::ItemVanished));
                    }
                }
            }
        };

        if let DragResolution::Dropped { item_id, from, to, mutation } = &resolution {
            info!(
                "event=drag_drop module=board status=ok item_id={item_id} from={from} to={to} persisted={}",
                mutation.is_some()
            );
        }
        self.rebuild_layout();
        Ok(resolution)
    }

    /// Interrupts the active gesture, e.g. on navigation.
    pub fn cancel_drag(&mut self) -> Option<DragResolution> {
        let session = self.phase.interrupt()?;
        Some(self.cancelled(session.item_id, CancelReason::Interrupted))
    }

    fn cancelled(&mut self, item_id: ItemId, reason: CancelReason) -> DragResolution {
        debug!(
            "event=drag_cancel module=board status=cancelled item_id={item_id} reason={}",
            reason.as_str()
        );
        self.rebuild_layout();
        DragResolution::Cancelled { item_id, reason }
    }

    /// Stage the store holds for `item_id` right now.
    fn persisted_stage(&self, item_id: &ItemId) -> Option<Stage> {
        let fallback = self.engine.config().fallback_stage;
        self.engine
            .read_store(|store| store.get(item_id).ok().map(|item| item.stage(fallback)))
    }

    fn rebuild_layout(&mut self) {
        let fallback = self.engine.config().fallback_stage;
        let scope = &self.scope;
        self.layout = self.engine.read_store(|store| {
            ContainerIndex::partition(
                store.all().iter().filter(|item| scope.includes(item)),
                fallback,
            )
        });
        self.stale = false;
    }
}
