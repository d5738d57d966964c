//! Deliverable item model.
//!
//! # Responsibility
//! - Define the record tracked by the board (one influencer within one
//!   campaign) and the partial update shape applied to it.
//!
//! # Invariants
//! - `id` is stable and never reused for another deliverable.
//! - `container_key` keeps the raw remote value; stage resolution happens in
//!   the container index so malformed keys survive a round trip untouched.
//! - Applying a patch only touches fields the patch carries.

use crate::model::stage::Stage;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Stable identifier of a deliverable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ItemId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ItemId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Performance and content payload of one deliverable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeliverableMetrics {
    pub videos_count: u32,
    pub total_views: u64,
    pub total_engagements: u64,
    pub sales_generated: f64,
    pub clicks: Option<u64>,
    pub orders: Option<u64>,
    pub content_link: Option<String>,
    /// ISO-8601 date as stored remotely.
    pub due_date: Option<String>,
    pub notes: Option<String>,
}

/// Board record: one influencer's obligation within one campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub campaign_id: String,
    pub kol_id: String,
    /// Influencer display name, used by search and card rendering.
    pub label: String,
    /// Raw pipeline stage key; `None` when the remote row has no status.
    pub container_key: Option<String>,
    pub metrics: DeliverableMetrics,
}

impl Item {
    /// Creates an item placed in `stage` with empty metrics.
    pub fn new(id: impl Into<ItemId>, label: impl Into<String>, stage: Stage) -> Self {
        Self {
            id: id.into(),
            campaign_id: String::new(),
            kol_id: String::new(),
            label: label.into(),
            container_key: Some(stage.as_key().to_string()),
            metrics: DeliverableMetrics::default(),
        }
    }

    /// Sets the owning campaign.
    pub fn in_campaign(mut self, campaign_id: impl Into<String>) -> Self {
        self.campaign_id = campaign_id.into();
        self
    }

    /// Resolved stage, defaulting missing or unknown keys to `fallback`.
    pub fn stage(&self, fallback: Stage) -> Stage {
        Stage::resolve(self.container_key.as_deref(), fallback)
    }
}

/// Partial update for one item.
///
/// `None` leaves a field untouched. For the clearable string fields,
/// `Some(None)` writes an explicit null.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemPatch {
    pub container_key: Option<Stage>,
    pub videos_count: Option<u32>,
    pub total_views: Option<u64>,
    pub total_engagements: Option<u64>,
    pub sales_generated: Option<f64>,
    pub content_link: Option<Option<String>>,
    pub due_date: Option<Option<String>>,
    pub notes: Option<Option<String>>,
}

impl ItemPatch {
    /// Patch that moves an item into `stage`.
    pub fn move_to(stage: Stage) -> Self {
        Self {
            container_key: Some(stage),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Folds a later patch into this one; fields present in `later` win.
    pub fn merge(self, later: ItemPatch) -> ItemPatch {
        ItemPatch {
            container_key: later.container_key.or(self.container_key),
            videos_count: later.videos_count.or(self.videos_count),
            total_views: later.total_views.or(self.total_views),
            total_engagements: later.total_engagements.or(self.total_engagements),
            sales_generated: later.sales_generated.or(self.sales_generated),
            content_link: later.content_link.or(self.content_link),
            due_date: later.due_date.or(self.due_date),
            notes: later.notes.or(self.notes),
        }
    }

    /// Writes every present field into `item`.
    pub fn apply_to(&self, item: &mut Item) {
        if let Some(stage) = self.container_key {
            item.container_key = Some(stage.as_key().to_string());
        }
        let metrics = &mut item.metrics;
        if let Some(value) = self.videos_count {
            metrics.videos_count = value;
        }
        if let Some(value) = self.total_views {
            metrics.total_views = value;
        }
        if let Some(value) = self.total_engagements {
            metrics.total_engagements = value;
        }
        if let Some(value) = self.sales_generated {
            metrics.sales_generated = value;
        }
        if let Some(value) = &self.content_link {
            metrics.content_link = value.clone();
        }
        if let Some(value) = &self.due_date {
            metrics.due_date = value.clone();
        }
        if let Some(value) = &self.notes {
            metrics.notes = value.clone();
        }
    }
}
