//! Drag gesture state machine.
//!
//! # Responsibility
//! - Track the single active move gesture on the board.
//! - Translate pointer-over events into view-only splices of the layout.
//! - Decide at release whether the gesture persists a stage change.
//!
//! # Invariants
//! - At most one session is active; `Idle -> Dragging -> Idle`.
//! - Splices only touch the layout; item container keys are untouched until
//!   the board persists a drop.
//! - A drop into the stage the store already holds never persists anything.

use crate::board::geometry::{insertion_index, Point, Rect};
use crate::model::item::ItemId;
use crate::model::stage::Stage;
use crate::store::container_index::ContainerIndex;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// State of the one move gesture currently in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct DragSession {
    pub item_id: ItemId,
    /// Stage of the item when the gesture started.
    pub source: Stage,
    /// Speculative stage under the pointer.
    pub current: Stage,
    /// Pointer offset inside the grabbed card.
    pub cursor_offset: Point,
}

/// What the pointer is currently over.
#[derive(Debug, Clone, PartialEq)]
pub enum OverTarget {
    /// Empty area of a column; the card is appended.
    Container(Stage),
    /// Another card, with its on-screen rectangle.
    Item { id: ItemId, rect: Rect },
}

/// One pointer-over event.
#[derive(Debug, Clone, PartialEq)]
pub struct DragOver {
    pub target: OverTarget,
    /// Current rectangle of the dragged card, when known.
    pub dragged_rect: Option<Rect>,
}

/// Droppable column area reported at release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropZone {
    pub stage: Stage,
    pub rect: Rect,
}

/// Why a gesture ended without a drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Released outside every drop zone.
    NoDropTarget,
    /// Navigation or another external interruption.
    Interrupted,
    /// The dragged item left the store mid-gesture.
    ItemVanished,
}

impl CancelReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoDropTarget => "no_drop_target",
            Self::Interrupted => "interrupted",
            Self::ItemVanished => "item_vanished",
        }
    }
}

/// Drag state machine misuse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DragError {
    SessionActive(ItemId),
    NoActiveSession,
    ItemNotOnBoard(ItemId),
}

impl Display for DragError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SessionActive(id) => write!(f, "a drag session is already active for {id}"),
            Self::NoActiveSession => write!(f, "no drag session is active"),
            Self::ItemNotOnBoard(id) => write!(f, "item is not on the board: {id}"),
        }
    }
}

impl Error for DragError {}

/// Release decision handed back to the board.
#[derive(Debug, Clone, PartialEq)]
pub enum DropDecision {
    /// Dropped outside the persisted stage; the board must persist `target`.
    Persist { session: DragSession, target: Stage },
    /// Dropped into the persisted stage; nothing to persist.
    Reorder { session: DragSession },
    Cancel {
        session: DragSession,
        reason: CancelReason,
    },
}

/// Gesture lifecycle.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragPhase {
    #[default]
    Idle,
    Dragging(DragSession),
}

impl DragPhase {
    pub fn session(&self) -> Option<&DragSession> {
        match self {
            Self::Idle => None,
            Self::Dragging(session) => Some(session),
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self, Self::Dragging(_))
    }

    /// `Idle -> Dragging`, capturing the item's current stage as source.
    pub fn begin(
        &mut self,
        layout: &ContainerIndex,
        item_id: ItemId,
        cursor_offset: Point,
    ) -> Result<&DragSession, DragError> {
        if let Self::Dragging(session) = self {
            return Err(DragError::SessionActive(session.item_id.clone()));
        }
        let source = layout
            .container_of(&item_id)
            .ok_or_else(|| DragError::ItemNotOnBoard(item_id.clone()))?;
        *self = Self::Dragging(DragSession {
            item_id,
            source,
            current: source,
            cursor_offset,
        });
        match self {
            Self::Dragging(session) => Ok(session),
            Self::Idle => Err(DragError::NoActiveSession),
        }
    }

    /// Splices the dragged card into the hovered position.
    ///
    /// Returns whether the layout changed.
    pub fn over(&mut self, layout: &mut ContainerIndex, event: &DragOver) -> Result<bool, DragError> {
        let Self::Dragging(session) = self else {
            return Err(DragError::NoActiveSession);
        };

        let (stage, index) = match &event.target {
            OverTarget::Container(stage) => {
                let len = remaining(layout, *stage, &session.item_id).len();
                (*stage, len)
            }
            OverTarget::Item { id, rect } => {
                if id == &session.item_id {
                    return Ok(false);
                }
                let Some(stage) = layout.container_of(id) else {
                    return Ok(false);
                };
                let column = remaining(layout, stage, &session.item_id);
                let Some(over_index) = column.iter().position(|candidate| candidate == id) else {
                    return Ok(false);
                };
                (
                    stage,
                    insertion_index(over_index, rect, event.dragged_rect.as_ref()),
                )
            }
        };

        let changed = layout.splice(&session.item_id, stage, index);
        session.current = stage;
        Ok(changed)
    }

    /// `Dragging -> Idle`, resolving the drop stage from `zones`.
    ///
    /// The zone overlapping `dragged_rect` the most wins; ties prefer the
    /// speculative stage, then the first zone listed. The drop persists when
    /// it differs from `persisted`, the stage the store holds at release;
    /// `session.source` may be stale by then.
    pub fn finish(
        &mut self,
        layout: &mut ContainerIndex,
        dragged_rect: &Rect,
        zones: &[DropZone],
        persisted: Stage,
    ) -> Result<DropDecision, DragError> {
        let Self::Dragging(mut session) = std::mem::take(self) else {
            return Err(DragError::NoActiveSession);
        };

        let Some(target) = resolve_drop_zone(zones, dragged_rect, session.current) else {
            return Ok(DropDecision::Cancel {
                session,
                reason: CancelReason::NoDropTarget,
            });
        };
        if target != session.current {
            let len = remaining(layout, target, &session.item_id).len();
            layout.splice(&session.item_id, target, len);
            session.current = target;
        }

        if session.current == persisted {
            Ok(DropDecision::Reorder { session })
        } else {
            Ok(DropDecision::Persist {
                target: session.current,
                session,
            })
        }
    }

    /// Ends the gesture without a drop.
    pub fn interrupt(&mut self) -> Option<DragSession> {
        match std::mem::take(self) {
            Self::Idle => None,
            Self::Dragging(session) => Some(session),
        }
    }
}

/// Picks the stage whose zone overlaps `dragged` the most.
pub fn resolve_drop_zone(zones: &[DropZone], dragged: &Rect, current: Stage) -> Option<Stage> {
    let mut best: Option<(Stage, f64)> = None;
    for zone in zones {
        let overlap = zone.rect.intersection_area(dragged);
        if overlap <= 0.0 {
            continue;
        }
        let replace = match best {
            None => true,
            Some((stage, area)) => {
                overlap > area || (overlap == area && zone.stage == current && stage != current)
            }
        };
        if replace {
            best = Some((zone.stage, overlap));
        }
    }
    best.map(|(stage, _)| stage)
}

fn remaining(layout: &ContainerIndex, stage: Stage, dragged: &ItemId) -> Vec<ItemId> {
    layout
        .ids(stage)
        .iter()
        .filter(|id| *id != dragged)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{resolve_drop_zone, DragError, DragOver, DragPhase, DropDecision, DropZone, OverTarget};
    use crate::board::geometry::{Point, Rect};
    use crate::model::item::{Item, ItemId};
    use crate::model::stage::Stage;
    use crate::store::container_index::ContainerIndex;

    fn layout() -> ContainerIndex {
        let items = vec![
            Item::new("d-1", "Ayu", Stage::Negotiating),
            Item::new("d-2", "Bima", Stage::Posted),
            Item::new("d-3", "Citra", Stage::Posted),
        ];
        ContainerIndex::partition(&items, Stage::ToContact)
    }

    fn zone(stage: Stage, left: f64) -> DropZone {
        DropZone {
            stage,
            rect: Rect::new(left, 0.0, 100.0, 500.0),
        }
    }

    #[test]
    fn begin_rejects_second_session_and_unknown_items() {
        let layout = layout();
        let mut phase = DragPhase::default();
        assert_eq!(
            phase
                .begin(&layout, ItemId::from("ghost"), Point::default())
                .unwrap_err(),
            DragError::ItemNotOnBoard(ItemId::from("ghost"))
        );
        phase
            .begin(&layout, ItemId::from("d-1"), Point::new(4.0, 4.0))
            .unwrap();
        assert!(matches!(
            phase.begin(&layout, ItemId::from("d-2"), Point::default()),
            Err(DragError::SessionActive(_))
        ));
    }

    #[test]
    fn over_item_inserts_before_or_after_hovered_card() {
        let mut layout = layout();
        let mut phase = DragPhase::default();
        phase
            .begin(&layout, ItemId::from("d-1"), Point::default())
            .unwrap();

        let over_d2 = DragOver {
            target: OverTarget::Item {
                id: ItemId::from("d-2"),
                rect: Rect::new(200.0, 0.0, 100.0, 40.0),
            },
            dragged_rect: Some(Rect::new(200.0, 10.0, 100.0, 40.0)),
        };
        assert!(phase.over(&mut layout, &over_d2).unwrap());
        assert_eq!(
            layout.ids(Stage::Posted),
            &[ItemId::from("d-1"), ItemId::from("d-2"), ItemId::from("d-3")]
        );

        let below_d3 = DragOver {
            target: OverTarget::Item {
                id: ItemId::from("d-3"),
                rect: Rect::new(200.0, 50.0, 100.0, 40.0),
            },
            dragged_rect: Some(Rect::new(200.0, 95.0, 100.0, 40.0)),
        };
        assert!(phase.over(&mut layout, &below_d3).unwrap());
        assert_eq!(
            layout.ids(Stage::Posted),
            &[ItemId::from("d-2"), ItemId::from("d-3"), ItemId::from("d-1")]
        );
        assert_eq!(phase.session().unwrap().current, Stage::Posted);
    }

    #[test]
    fn finish_without_overlap_cancels() {
        let mut layout = layout();
        let mut phase = DragPhase::default();
        phase
            .begin(&layout, ItemId::from("d-1"), Point::default())
            .unwrap();
        let decision = phase
            .finish(
                &mut layout,
                &Rect::new(900.0, 0.0, 50.0, 50.0),
                &[zone(Stage::Posted, 0.0)],
                Stage::Negotiating,
            )
            .unwrap();
        assert!(matches!(decision, DropDecision::Cancel { .. }));
        assert!(!phase.is_dragging());
    }

    #[test]
    fn finish_in_source_stage_is_reorder() {
        let mut layout = layout();
        let mut phase = DragPhase::default();
        phase
            .begin(&layout, ItemId::from("d-2"), Point::default())
            .unwrap();
        let decision = phase
            .finish(
                &mut layout,
                &Rect::new(10.0, 10.0, 50.0, 50.0),
                &[zone(Stage::Posted, 0.0)],
                Stage::Posted,
            )
            .unwrap();
        assert!(matches!(decision, DropDecision::Reorder { .. }));
    }

    #[test]
    fn finish_compares_against_persisted_stage_not_gesture_source() {
        let mut layout = layout();
        let mut phase = DragPhase::default();
        phase
            .begin(&layout, ItemId::from("d-2"), Point::default())
            .unwrap();

        // The store moved d-2 back to negotiating while the gesture ran.
        let decision = phase
            .finish(
                &mut layout,
                &Rect::new(10.0, 10.0, 50.0, 50.0),
                &[zone(Stage::Posted, 0.0)],
                Stage::Negotiating,
            )
            .unwrap();
        match decision {
            DropDecision::Persist { session, target } => {
                assert_eq!(target, Stage::Posted);
                assert_eq!(session.source, Stage::Posted);
            }
            other => panic!("expected persist, got {other:?}"),
        }
    }

    #[test]
    fn resolve_drop_zone_prefers_larger_overlap_then_current_stage() {
        let dragged = Rect::new(60.0, 0.0, 60.0, 40.0);
        let zones = [zone(Stage::Negotiating, 0.0), zone(Stage::Posted, 100.0)];
        assert_eq!(
            resolve_drop_zone(&zones, &dragged, Stage::Negotiating),
            Some(Stage::Negotiating)
        );

        let split = Rect::new(70.0, 0.0, 60.0, 40.0);
        assert_eq!(
            resolve_drop_zone(&zones, &split, Stage::Posted),
            Some(Stage::Posted)
        );
        assert_eq!(
            resolve_drop_zone(&zones, &split, Stage::Completed),
            Some(Stage::Negotiating)
        );
        assert_eq!(resolve_drop_zone(&[], &split, Stage::Posted), None);
    }
}
