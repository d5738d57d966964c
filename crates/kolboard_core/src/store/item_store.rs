//! Process-local item store.
//!
//! # Responsibility
//! - Hold the authoritative local copy of every deliverable.
//! - Provide full overwrite (refresh) and partial overwrite (mutation) paths.
//!
//! # Invariants
//! - Ids are unique; `replace` keeps the first occurrence of a duplicate id.
//! - Insertion order is preserved and drives in-column ordering.

use crate::model::item::{Item, ItemId, ItemPatch};
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type StoreResult<T> = Result<T, StoreError>;

/// Item lookup errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound(ItemId),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "item not found: {id}"),
        }
    }
}

impl Error for StoreError {}

/// Addressable collection of mutable deliverable records.
#[derive(Debug, Clone, Default)]
pub struct ItemStore {
    items: Vec<Item>,
    index: HashMap<ItemId, usize>,
}

impl ItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<Item>) -> Self {
        let mut store = Self::new();
        store.replace(items);
        store
    }

    /// Returns every item in insertion order.
    pub fn all(&self) -> &[Item] {
        &self.items
    }

    pub fn get(&self, id: &ItemId) -> StoreResult<&Item> {
        self.index
            .get(id)
            .map(|position| &self.items[*position])
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    pub fn contains(&self, id: &ItemId) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ItemId> {
        self.items.iter().map(|item| &item.id)
    }

    /// Overwrites the whole store.
    pub fn replace(&mut self, items: Vec<Item>) {
        self.items.clear();
        self.index.clear();
        for item in items {
            if self.index.contains_key(&item.id) {
                continue;
            }
            self.index.insert(item.id.clone(), self.items.len());
            self.items.push(item);
        }
    }

    /// Applies a partial overwrite and returns the pre-patch value.
    pub fn patch(&mut self, id: &ItemId, patch: &ItemPatch) -> StoreResult<Item> {
        let position = *self
            .index
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let item = &mut self.items[position];
        let previous = item.clone();
        patch.apply_to(item);
        Ok(previous)
    }

    /// Writes a full item value back in place.
    ///
    /// Returns `false` when the id is no longer present.
    pub fn restore(&mut self, item: Item) -> bool {
        match self.index.get(&item.id) {
            Some(position) => {
                self.items[*position] = item;
                true
            }
            None => false,
        }
    }
}
