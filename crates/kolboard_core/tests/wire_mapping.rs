use kolboard_core::sync::wire::{item_from_row, items_from_rows, patch_to_row, WireError};
use kolboard_core::{ContainerIndex, ItemId, ItemPatch, Stage};
use serde_json::json;

#[test]
fn row_with_nulls_maps_to_zeroed_metrics() {
    let row = json!({
        "id": "d-1",
        "campaign_id": "c-1",
        "kol_id": "k-7",
        "kol_name": "Ayu",
        "status": "negotiating",
        "videos_count": null,
        "total_views": 1200,
        "total_engagements": 88.0,
        "sales_generated": 15.5,
        "clicks": null,
        "content_link": null,
        "notes": "wants a second draft"
    });

    let item = item_from_row(&row).unwrap();
    assert_eq!(item.id, ItemId::from("d-1"));
    assert_eq!(item.label, "Ayu");
    assert_eq!(item.container_key.as_deref(), Some("negotiating"));
    assert_eq!(item.metrics.videos_count, 0);
    assert_eq!(item.metrics.total_views, 1_200);
    assert_eq!(item.metrics.total_engagements, 88);
    assert_eq!(item.metrics.sales_generated, 15.5);
    assert_eq!(item.metrics.clicks, None);
    assert_eq!(item.metrics.content_link, None);
    assert_eq!(item.metrics.notes.as_deref(), Some("wants a second draft"));
}

#[test]
fn unknown_status_is_kept_raw_and_resolved_by_partition() {
    let rows = vec![
        json!({ "id": "d-1", "campaign_id": "c-1", "kol_id": "k-1", "status": "Content Creation" }),
        json!({ "id": "d-2", "campaign_id": "c-1", "kol_id": "k-2", "status": "archived" }),
        json!({ "id": "d-3", "campaign_id": "c-1", "kol_id": "k-3" }),
    ];
    let items = items_from_rows(&rows).unwrap();
    assert_eq!(items[1].container_key.as_deref(), Some("archived"));
    assert_eq!(items[2].container_key, None);

    let index = ContainerIndex::partition(&items, Stage::ToContact);
    assert_eq!(index.container_of(&ItemId::from("d-1")), Some(Stage::ContentCreation));
    assert_eq!(index.container_of(&ItemId::from("d-2")), Some(Stage::ToContact));
    assert_eq!(index.container_of(&ItemId::from("d-3")), Some(Stage::ToContact));
}

#[test]
fn malformed_rows_are_rejected() {
    assert_eq!(item_from_row(&json!([1, 2])).unwrap_err(), WireError::NotAnObject);
    assert_eq!(
        item_from_row(&json!({ "campaign_id": "c-1", "kol_id": "k-1" })).unwrap_err(),
        WireError::MissingField("id")
    );
    assert_eq!(
        item_from_row(&json!({ "id": " ", "campaign_id": "c-1", "kol_id": "k-1" })).unwrap_err(),
        WireError::MissingField("id")
    );
    assert!(matches!(
        item_from_row(&json!({
            "id": "d-1",
            "campaign_id": "c-1",
            "kol_id": "k-1",
            "total_views": "many"
        })),
        Err(WireError::InvalidField { field: "total_views", .. })
    ));

    let rows = vec![
        json!({ "id": "d-1", "campaign_id": "c-1", "kol_id": "k-1" }),
        json!({ "id": "d-2", "campaign_id": "c-1" }),
    ];
    assert_eq!(
        items_from_rows(&rows).unwrap_err(),
        WireError::MissingField("kol_id")
    );
}

#[test]
fn patch_payload_carries_stage_key_and_metrics() {
    let patch = ItemPatch {
        total_views: Some(5_000),
        content_link: Some(Some("https://example.com/v/1".to_string())),
        due_date: Some(None),
        ..ItemPatch::move_to(Stage::Posted)
    };
    assert_eq!(
        patch_to_row(&patch),
        json!({
            "status": "posted",
            "total_views": 5000,
            "content_link": "https://example.com/v/1",
            "due_date": null
        })
    );
    assert_eq!(patch_to_row(&ItemPatch::default()), json!({}));
}
