use kolboard_core::{
    EngineConfig, InMemoryRemote, Item, ItemId, ItemPatch, MutationOutcome, MutationStatus,
    RefreshOutcome, Stage, SyncEngine, SyncError, SyncEvent,
};
use std::sync::Arc;

fn seed_rows() -> Vec<Item> {
    vec![
        Item::new("d-1", "Ayu", Stage::Negotiating).in_campaign("c-1"),
        Item::new("d-2", "Bima", Stage::ToContact).in_campaign("c-1"),
    ]
}

async fn loaded_engine(remote: &Arc<InMemoryRemote>) -> SyncEngine {
    let engine = SyncEngine::new(remote.clone(), EngineConfig::default()).unwrap();
    assert!(matches!(engine.refresh().await, RefreshOutcome::Applied(_)));
    engine
}

async fn let_tasks_run() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

fn stage_of(engine: &SyncEngine, id: &str) -> Option<String> {
    engine
        .get(&ItemId::from(id))
        .and_then(|item| item.container_key)
}

#[tokio::test]
async fn apply_updates_store_before_remote_call_runs() {
    let remote = Arc::new(InMemoryRemote::new(seed_rows()));
    let engine = loaded_engine(&remote).await;
    remote.pause_mutations();

    let ticket = engine
        .apply(&ItemId::from("d-1"), ItemPatch::move_to(Stage::Posted))
        .unwrap();

    assert!(!ticket.is_queued());
    assert_eq!(stage_of(&engine, "d-1").as_deref(), Some("posted"));
    assert_eq!(remote.mutate_calls(), 0);
    assert!(engine.has_pending(&ItemId::from("d-1")));

    remote.resume_mutations();
    let outcome = ticket.settled().await;
    match outcome {
        MutationOutcome::Committed { record, ack } => {
            assert_eq!(record.status, MutationStatus::Committed);
            assert!(record.previous.is_none());
            assert_eq!(ack.item_id, ItemId::from("d-1"));
        }
        other => panic!("expected commit, got {other:?}"),
    }
    assert!(!engine.has_pending(&ItemId::from("d-1")));
    assert_eq!(
        remote
            .row(&ItemId::from("d-1"))
            .unwrap()
            .container_key
            .as_deref(),
        Some("posted")
    );
}

#[tokio::test]
async fn failed_mutate_rolls_back_and_notifies() {
    let remote = Arc::new(InMemoryRemote::new(seed_rows()));
    let engine = loaded_engine(&remote).await;
    let mut events = engine.subscribe();
    remote.fail_next_mutate("network_unavailable");

    let ticket = engine
        .apply(&ItemId::from("d-1"), ItemPatch::move_to(Stage::Posted))
        .unwrap();
    assert_eq!(stage_of(&engine, "d-1").as_deref(), Some("posted"));

    let outcome = ticket.settled().await;
    assert!(outcome.is_rolled_back());
    assert_eq!(stage_of(&engine, "d-1").as_deref(), Some("negotiating"));
    assert_eq!(engine.pending_count(), 0);

    assert!(matches!(
        events.recv().await.unwrap(),
        SyncEvent::MutationApplied { .. }
    ));
    match events.recv().await.unwrap() {
        SyncEvent::MutationRolledBack {
            item_id,
            error,
            retryable,
            ..
        } => {
            assert_eq!(item_id, ItemId::from("d-1"));
            assert_eq!(error.code, "network_unavailable");
            assert!(retryable);
        }
        other => panic!("expected rollback event, got {other:?}"),
    }
    assert_eq!(remote.mutate_calls(), 1);
}

#[tokio::test]
async fn second_apply_waits_for_in_flight_mutation_and_coalesces() {
    let remote = Arc::new(InMemoryRemote::new(seed_rows()));
    let engine = loaded_engine(&remote).await;
    let id = ItemId::from("d-1");
    remote.pause_mutations();

    let first = engine.apply(&id, ItemPatch::move_to(Stage::Posted)).unwrap();
    let_tasks_run().await;
    assert_eq!(remote.held_mutations(), 1);

    let second = engine
        .apply(
            &id,
            ItemPatch {
                total_views: Some(1_200),
                ..ItemPatch::move_to(Stage::ContentCreation)
            },
        )
        .unwrap();
    let third = engine
        .apply(&id, ItemPatch::move_to(Stage::Completed))
        .unwrap();
    assert!(second.is_queued());
    assert!(third.is_queued());

    assert!(matches!(
        second.settled().await,
        MutationOutcome::Coalesced { .. }
    ));
    // Queued intents are not applied until the in-flight write settles.
    assert_eq!(stage_of(&engine, "d-1").as_deref(), Some("posted"));
    assert_eq!(remote.mutate_calls(), 1);

    remote.resume_mutations();
    assert!(first.settled().await.is_committed());
    assert!(third.settled().await.is_committed());

    let item = engine.get(&id).unwrap();
    assert_eq!(item.container_key.as_deref(), Some("completed"));
    assert_eq!(item.metrics.total_views, 1_200);
    assert_eq!(remote.mutate_calls(), 2);
    assert_eq!(remote.max_in_flight(&id), 1);
    assert_eq!(remote.accepted_patches(&id).len(), 2);
}

#[tokio::test]
async fn queued_intent_applies_after_rollback() {
    let remote = Arc::new(InMemoryRemote::new(seed_rows()));
    let engine = loaded_engine(&remote).await;
    let id = ItemId::from("d-1");
    remote.pause_mutations();
    remote.fail_next_mutate("timeout");

    let first = engine.apply(&id, ItemPatch::move_to(Stage::Posted)).unwrap();
    let notes = ItemPatch {
        notes: Some(Some("send brief".to_string())),
        ..ItemPatch::default()
    };
    let second = engine.apply(&id, notes).unwrap();

    remote.resume_mutations();
    assert!(first.settled().await.is_rolled_back());
    assert!(second.settled().await.is_committed());

    let item = engine.get(&id).unwrap();
    assert_eq!(item.container_key.as_deref(), Some("negotiating"));
    assert_eq!(item.metrics.notes.as_deref(), Some("send brief"));
}

#[tokio::test]
async fn mutations_for_different_items_run_concurrently() {
    let remote = Arc::new(InMemoryRemote::new(seed_rows()));
    let engine = loaded_engine(&remote).await;
    remote.pause_mutations();

    let first = engine
        .apply(&ItemId::from("d-1"), ItemPatch::move_to(Stage::Posted))
        .unwrap();
    let second = engine
        .apply(&ItemId::from("d-2"), ItemPatch::move_to(Stage::Negotiating))
        .unwrap();
    assert!(!second.is_queued());
    let_tasks_run().await;
    assert_eq!(remote.held_mutations(), 2);
    assert_eq!(engine.pending_count(), 2);

    remote.resume_mutations();
    assert!(first.settled().await.is_committed());
    assert!(second.settled().await.is_committed());
}

#[tokio::test]
async fn dropped_ticket_does_not_cancel_write() {
    let remote = Arc::new(InMemoryRemote::new(seed_rows()));
    let engine = loaded_engine(&remote).await;

    let ticket = engine
        .apply(&ItemId::from("d-2"), ItemPatch::move_to(Stage::Completed))
        .unwrap();
    drop(ticket);
    let_tasks_run().await;

    assert_eq!(
        remote
            .row(&ItemId::from("d-2"))
            .unwrap()
            .container_key
            .as_deref(),
        Some("completed")
    );
    assert_eq!(engine.pending_count(), 0);
}

#[tokio::test]
async fn cancelling_refresh_leaves_pending_mutation_running() {
    let remote = Arc::new(InMemoryRemote::new(seed_rows()));
    let engine = loaded_engine(&remote).await;
    remote.pause_mutations();
    remote.pause_fetches();

    let ticket = engine
        .apply(&ItemId::from("d-1"), ItemPatch::move_to(Stage::Posted))
        .unwrap();
    let refresher = engine.clone();
    let refresh = tokio::spawn(async move { refresher.refresh().await });
    let_tasks_run().await;

    engine.cancel_refresh();
    remote.resume_fetches();
    remote.resume_mutations();

    assert!(matches!(
        refresh.await.unwrap(),
        RefreshOutcome::Discarded(kolboard_core::DiscardReason::Cancelled)
    ));
    assert!(ticket.settled().await.is_committed());
    assert_eq!(stage_of(&engine, "d-1").as_deref(), Some("posted"));
}

#[tokio::test]
async fn apply_rejects_empty_patch_and_unknown_item() {
    let remote = Arc::new(InMemoryRemote::new(seed_rows()));
    let engine = loaded_engine(&remote).await;

    assert!(matches!(
        engine.apply(&ItemId::from("d-1"), ItemPatch::default()),
        Err(SyncError::EmptyPatch(_))
    ));
    assert!(matches!(
        engine.apply(&ItemId::from("ghost"), ItemPatch::move_to(Stage::Posted)),
        Err(SyncError::ItemNotFound(id)) if id == ItemId::from("ghost")
    ));
    assert_eq!(remote.mutate_calls(), 0);
}
