//! Edge mapping between dynamic remote rows and typed items.
//!
//! # Responsibility
//! - Convert `campaign_deliverables` JSON rows into `Item` values.
//! - Build partial-update payloads from `ItemPatch`.
//!
//! # Invariants
//! - Identity columns (`id`, `campaign_id`, `kol_id`) are required.
//! - Null or missing metric counters read as zero.
//! - `status` is kept raw; unknown values are resolved later, never rejected.

use crate::model::item::{DeliverableMetrics, Item, ItemId, ItemPatch};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type WireResult<T> = Result<T, WireError>;

/// Row mapping errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    NotAnObject,
    MissingField(&'static str),
    InvalidField { field: &'static str, value: String },
}

impl Display for WireError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => write!(f, "deliverable row must be a JSON object"),
            Self::MissingField(field) => write!(f, "deliverable row is missing `{field}`"),
            Self::InvalidField { field, value } => {
                write!(f, "invalid value `{value}` in deliverable row `{field}`")
            }
        }
    }
}

impl Error for WireError {}

/// Maps one remote row into an item.
pub fn item_from_row(row: &Value) -> WireResult<Item> {
    let row = row.as_object().ok_or(WireError::NotAnObject)?;

    let videos_count = read_count(row, "videos_count")?;
    let videos_count = u32::try_from(videos_count).map_err(|_| WireError::InvalidField {
        field: "videos_count",
        value: videos_count.to_string(),
    })?;

    Ok(Item {
        id: ItemId::new(read_required_string(row, "id")?),
        campaign_id: read_required_string(row, "campaign_id")?,
        kol_id: read_required_string(row, "kol_id")?,
        label: read_optional_string(row, "kol_name")?.unwrap_or_default(),
        container_key: read_optional_string(row, "status")?,
        metrics: DeliverableMetrics {
            videos_count,
            total_views: read_count(row, "total_views")?,
            total_engagements: read_count(row, "total_engagements")?,
            sales_generated: read_amount(row, "sales_generated")?,
            clicks: read_optional_count(row, "clicks")?,
            orders: read_optional_count(row, "orders")?,
            content_link: read_optional_string(row, "content_link")?,
            due_date: read_optional_string(row, "due_date")?,
            notes: read_optional_string(row, "notes")?,
        },
    })
}

/// Maps a list of rows, failing on the first malformed row.
pub fn items_from_rows(rows: &[Value]) -> WireResult<Vec<Item>> {
    rows.iter().map(item_from_row).collect()
}

/// Builds the partial update payload for `patch`.
///
/// Only fields present in the patch are emitted; cleared strings become `null`.
pub fn patch_to_row(patch: &ItemPatch) -> Value {
    let mut row = Map::new();
    if let Some(stage) = patch.container_key {
        row.insert("status".to_string(), Value::from(stage.as_key()));
    }
    if let Some(value) = patch.videos_count {
        row.insert("videos_count".to_string(), Value::from(value));
    }
    if let Some(value) = patch.total_views {
        row.insert("total_views".to_string(), Value::from(value));
    }
    if let Some(value) = patch.total_engagements {
        row.insert("total_engagements".to_string(), Value::from(value));
    }
    if let Some(value) = patch.sales_generated {
        row.insert("sales_generated".to_string(), Value::from(value));
    }
    insert_nullable(&mut row, "content_link", &patch.content_link);
    insert_nullable(&mut row, "due_date", &patch.due_date);
    insert_nullable(&mut row, "notes", &patch.notes);
    Value::Object(row)
}

fn insert_nullable(row: &mut Map<String, Value>, field: &str, value: &Option<Option<String>>) {
    if let Some(value) = value {
        let json = value.as_deref().map(Value::from).unwrap_or(Value::Null);
        row.insert(field.to_string(), json);
    }
}

fn read_required_string(row: &Map<String, Value>, field: &'static str) -> WireResult<String> {
    read_optional_string(row, field)?
        .filter(|value| !value.trim().is_empty())
        .ok_or(WireError::MissingField(field))
}

fn read_optional_string(
    row: &Map<String, Value>,
    field: &'static str,
) -> WireResult<Option<String>> {
    match row.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value.clone())),
        Some(other) => Err(WireError::InvalidField {
            field,
            value: other.to_string(),
        }),
    }
}

fn read_optional_count(row: &Map<String, Value>, field: &'static str) -> WireResult<Option<u64>> {
    match row.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => parse_count(value)
            .map(Some)
            .ok_or_else(|| WireError::InvalidField {
                field,
                value: value.to_string(),
            }),
    }
}

fn read_count(row: &Map<String, Value>, field: &'static str) -> WireResult<u64> {
    Ok(read_optional_count(row, field)?.unwrap_or(0))
}

fn read_amount(row: &Map<String, Value>, field: &'static str) -> WireResult<f64> {
    match row.get(field) {
        None | Some(Value::Null) => Ok(0.0),
        Some(value) => value.as_f64().ok_or_else(|| WireError::InvalidField {
            field,
            value: value.to_string(),
        }),
    }
}

fn parse_count(value: &Value) -> Option<u64> {
    if let Some(count) = value.as_u64() {
        return Some(count);
    }
    // Some exports serialize integer columns as floats (`3.0`).
    let float = value.as_f64()?;
    if float >= 0.0 && float.fract() == 0.0 && float <= u64::MAX as f64 {
        Some(float as u64)
    } else {
        None
    }
}
