//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `kolboard_core` linkage without a UI shell.
//! - Replay one drag-to-posted move, one failed move and a refresh against
//!   the in-memory remote, with deterministic output.

use kolboard_core::{
    default_log_level, init_logging, BoardFilter, BoardScope, DragOver, DragResolution, DropZone,
    EngineConfig, InMemoryRemote, Item, ItemId, MutationOutcome, OverTarget, PipelineBoard, Point,
    Rect, RefreshOutcome, Stage, SyncEngine,
};
use log::info;
use std::process::ExitCode;
use std::sync::Arc;

const LOG_DIR_ENV: &str = "KOLBOARD_LOG_DIR";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    println!("kolboard_core version={}", kolboard_core::core_version());
    if let Ok(dir) = std::env::var(LOG_DIR_ENV) {
        if let Err(err) = init_logging(default_log_level(), &dir) {
            eprintln!("logging disabled: {err}");
        }
    }

    match run_demo().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("demo failed: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run_demo() -> Result<(), Box<dyn std::error::Error>> {
    let remote = Arc::new(InMemoryRemote::new(vec![
        Item::new("d-1", "Ayu", Stage::Negotiating).in_campaign("c-1"),
        Item::new("d-2", "Bima", Stage::ToContact).in_campaign("c-1"),
        Item::new("d-3", "Citra", Stage::Posted).in_campaign("c-1"),
    ]));
    let engine = SyncEngine::new(remote.clone(), EngineConfig::default())?;
    print_refresh(engine.refresh().await);

    let mut board = PipelineBoard::new(engine.clone(), BoardScope::Campaign("c-1".to_string()));
    print_board(&board);

    let moved = drag_to(&mut board, "d-1", Stage::Posted)?;
    print_drop(moved).await;
    print_board(&board);

    remote.fail_next_mutate("network_unavailable");
    let failed = drag_to(&mut board, "d-2", Stage::Negotiating)?;
    print_drop(failed).await;
    board.sync_from_store();
    print_board(&board);

    print_refresh(engine.refresh().await);
    info!("event=demo_done module=cli status=ok");
    Ok(())
}

/// One drop zone per column, 100 units wide.
fn zones() -> Vec<DropZone> {
    Stage::ALL
        .into_iter()
        .enumerate()
        .map(|(column, stage)| DropZone {
            stage,
            rect: Rect::new(column as f64 * 100.0, 0.0, 100.0, 800.0),
        })
        .collect()
}

fn drag_to(
    board: &mut PipelineBoard,
    id: &str,
    target: Stage,
) -> Result<DragResolution, Box<dyn std::error::Error>> {
    let column = Stage::ALL
        .iter()
        .position(|stage| *stage == target)
        .unwrap_or(0);
    let card = Rect::new(column as f64 * 100.0 + 20.0, 120.0, 60.0, 40.0);

    board.begin_drag(&ItemId::from(id), Point::new(10.0, 10.0))?;
    board.drag_over(&DragOver {
        target: OverTarget::Container(target),
        dragged_rect: Some(card),
    })?;
    Ok(board.release(&card, &zones())?)
}

async fn print_drop(resolution: DragResolution) {
    match resolution {
        DragResolution::Dropped {
            item_id,
            from,
            to,
            mutation,
        } => {
            println!("drop item={item_id} from={from} to={to}");
            let Some(ticket) = mutation else {
                return;
            };
            let status = match ticket.settled().await {
                MutationOutcome::Committed { .. } => "committed".to_string(),
                MutationOutcome::RolledBack { error, .. } => {
                    format!("rolled_back code={}", error.code)
                }
                other => format!("{other:?}"),
            };
            println!("mutation item={item_id} status={status}");
        }
        DragResolution::Cancelled { item_id, reason } => {
            println!("drop item={item_id} cancelled reason={}", reason.as_str());
        }
    }
}

fn print_board(board: &PipelineBoard) {
    for column in board.columns(&BoardFilter::default()) {
        let labels: Vec<&str> = column.items.iter().map(|item| item.label.as_str()).collect();
        println!("  {:<12} [{}]", column.title, labels.join(", "));
    }
}

fn print_refresh(outcome: RefreshOutcome) {
    match outcome {
        RefreshOutcome::Applied(report) => println!(
            "refresh applied updated={} added={} removed={} kept_pending={} kept_recent={}",
            report.updated, report.added, report.removed, report.kept_pending, report.kept_recent
        ),
        RefreshOutcome::Failed(error) => println!("refresh failed code={}", error.code),
        RefreshOutcome::Discarded(reason) => {
            println!("refresh discarded reason={}", reason.as_str())
        }
    }
}
