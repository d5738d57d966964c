//! Stage partition of store items.
//!
//! # Responsibility
//! - Project items into ordered per-stage id lists.
//! - Support view-only splices while a drag gesture is in progress.
//!
//! # Invariants
//! - Every stage in `Stage::ALL` has a list, possibly empty.
//! - An id appears in at most one list; `splice` removes before inserting.
//! - The index is never a source of truth; it is rebuilt from the store.

use crate::model::item::{Item, ItemId};
use crate::model::stage::Stage;
use std::collections::{BTreeMap, HashSet};

/// Ordered per-stage membership derived from item container keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerIndex {
    columns: BTreeMap<Stage, Vec<ItemId>>,
}

impl Default for ContainerIndex {
    fn default() -> Self {
        Self {
            columns: Stage::ALL
                .into_iter()
                .map(|stage| (stage, Vec::new()))
                .collect(),
        }
    }
}

impl ContainerIndex {
    /// Groups `items` by resolved stage, keeping input order within a stage.
    ///
    /// Missing or unknown container keys land in `fallback`.
    pub fn partition<'a>(items: impl IntoIterator<Item = &'a Item>, fallback: Stage) -> Self {
        let mut index = Self::default();
        for item in items {
            index
                .columns
                .entry(item.stage(fallback))
                .or_default()
                .push(item.id.clone());
        }
        index
    }

    /// Ids in `stage`, in display order.
    pub fn ids(&self, stage: Stage) -> &[ItemId] {
        self.columns.get(&stage).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates stages in board order with their ids.
    pub fn columns(&self) -> impl Iterator<Item = (Stage, &[ItemId])> {
        self.columns
            .iter()
            .map(|(stage, ids)| (*stage, ids.as_slice()))
    }

    /// Stage currently holding `id`.
    pub fn container_of(&self, id: &ItemId) -> Option<Stage> {
        self.position_of(id).map(|(stage, _)| stage)
    }

    /// Stage and index currently holding `id`.
    pub fn position_of(&self, id: &ItemId) -> Option<(Stage, usize)> {
        self.columns.iter().find_map(|(stage, ids)| {
            ids.iter()
                .position(|candidate| candidate == id)
                .map(|position| (*stage, position))
        })
    }

    pub fn len(&self) -> usize {
        self.columns.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves `id` into `stage` at `index` (clamped to the list length).
    ///
    /// Returns `false` when `id` is not in any list or the layout is unchanged.
    pub fn splice(&mut self, id: &ItemId, stage: Stage, index: usize) -> bool {
        let Some((from_stage, from_index)) = self.position_of(id) else {
            return false;
        };
        if let Some(ids) = self.columns.get_mut(&from_stage) {
            ids.remove(from_index);
        }
        let target = self.columns.entry(stage).or_default();
        let index = index.min(target.len());
        target.insert(index, id.clone());
        from_stage != stage || from_index != index
    }

    /// Returns whether the lists hold exactly `ids`, each once.
    pub fn covers_exactly<'a>(&self, ids: impl IntoIterator<Item = &'a ItemId>) -> bool {
        let expected: HashSet<&ItemId> = ids.into_iter().collect();
        let mut seen = HashSet::new();
        for id in self.columns.values().flatten() {
            if !expected.contains(id) || !seen.insert(id) {
                return false;
            }
        }
        seen.len() == expected.len()
    }
}

#[cfg(test)]
mod tests {
    use super::ContainerIndex;
    use crate::model::item::{Item, ItemId};
    use crate::model::stage::Stage;

    fn items() -> Vec<Item> {
        let mut legacy = Item::new("d-3", "Legacy", Stage::Posted);
        legacy.container_key = Some("archived".to_string());
        let mut missing = Item::new("d-4", "Missing", Stage::Posted);
        missing.container_key = None;
        vec![
            Item::new("d-1", "Ayu", Stage::Negotiating),
            Item::new("d-2", "Bima", Stage::Posted),
            legacy,
            missing,
        ]
    }

    #[test]
    fn partition_defaults_unknown_keys_to_fallback() {
        let items = items();
        let index = ContainerIndex::partition(&items, Stage::ToContact);
        assert_eq!(
            index.ids(Stage::ToContact),
            &[ItemId::from("d-3"), ItemId::from("d-4")]
        );
        assert_eq!(index.ids(Stage::Posted), &[ItemId::from("d-2")]);
        assert!(index.ids(Stage::Completed).is_empty());
        assert!(index.covers_exactly(items.iter().map(|item| &item.id)));
    }

    #[test]
    fn splice_moves_between_and_within_columns() {
        let items = items();
        let mut index = ContainerIndex::partition(&items, Stage::ToContact);
        let id = ItemId::from("d-1");

        assert!(index.splice(&id, Stage::Posted, 0));
        assert_eq!(index.container_of(&id), Some(Stage::Posted));
        assert!(index.ids(Stage::Negotiating).is_empty());

        assert!(index.splice(&id, Stage::Posted, 99));
        assert_eq!(index.position_of(&id), Some((Stage::Posted, 1)));
        assert!(!index.splice(&id, Stage::Posted, 1));
        assert_eq!(index.len(), items.len());
    }

    #[test]
    fn covers_exactly_detects_missing_ids() {
        let items = items();
        let index = ContainerIndex::partition(&items[..2], Stage::ToContact);
        assert!(!index.covers_exactly(items.iter().map(|item| &item.id)));
    }
}
