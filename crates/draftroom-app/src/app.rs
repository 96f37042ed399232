// Draft event loop.
//
// Owns the `DraftRoom` and reacts to two sources: commands from the console
// and remote changes from the realtime feed. Every state change is followed
// by a fresh snapshot on the UI channel.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use draftroom_core::realtime::{PickSubscription, RemoteChange};
use draftroom_core::room::{DraftError, DraftRoom};

use crate::protocol::{UiUpdate, UserCommand};

/// Run the event loop until the user quits or the command channel closes.
///
/// Listens on two channels using `tokio::select!`:
/// - `cmd_rx`: commands parsed from the console
/// - `remote`: changes other clients made to the same session
pub async fn run(
    mut cmd_rx: mpsc::Receiver<UserCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
    mut room: DraftRoom,
    mut remote: PickSubscription,
) -> anyhow::Result<()> {
    info!(
        "Draft event loop started for event {} (session {})",
        room.event_id(),
        remote.session_id()
    );
    send_snapshot(&room, &ui_tx).await;

    // Once the feed closes, stop polling it so select! never spins on it.
    let mut remote_open = true;

    loop {
        tokio::select! {
            // --- Realtime changes (only poll while the feed is open) ---
            change = remote.next_remote(), if remote_open => {
                match change {
                    Some(RemoteChange::Event(event)) => {
                        debug!("Remote change from {}: {:?}", event.origin, event.kind);
                        refresh(&mut room, &ui_tx, true).await;
                    }
                    Some(RemoteChange::Lagged(missed)) => {
                        info!("Missed {} realtime events, refetching", missed);
                        refresh(&mut room, &ui_tx, true).await;
                    }
                    None => {
                        info!("Realtime feed closed");
                        remote_open = false;
                    }
                }
            }

            // --- User commands ---
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UserCommand::Quit) => {
                        info!("Quit requested");
                        break;
                    }
                    Some(cmd) => {
                        handle_command(&mut room, cmd, &ui_tx).await;
                    }
                    None => {
                        info!("Command channel closed, shutting down");
                        break;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Apply one user command to the room and report the result.
pub async fn handle_command(room: &mut DraftRoom, cmd: UserCommand, ui_tx: &mpsc::Sender<UiUpdate>) {
    match cmd {
        UserCommand::Pick(player_id) => match room.pick(&player_id).await {
            Ok(outcome) => {
                let snapshot = room.snapshot();
                let update = UiUpdate::Picked {
                    player_name: snapshot.player_name(&outcome.pick.player_id).to_string(),
                    team_name: snapshot.team_name(&outcome.pick.team_id).to_string(),
                    pick: outcome.pick,
                    phase: outcome.phase,
                    status_synced: outcome.status_synced,
                };
                let _ = ui_tx.send(update).await;
                let _ = ui_tx.send(UiUpdate::Snapshot(Box::new(snapshot))).await;
            }
            Err(e) => report_error(room, e, ui_tx).await,
        },
        UserCommand::Undo => match room.undo().await {
            Ok(outcome) => {
                let snapshot = room.snapshot();
                let update = UiUpdate::Undone {
                    player_name: snapshot.player_name(&outcome.pick.player_id).to_string(),
                    team_name: snapshot.team_name(&outcome.pick.team_id).to_string(),
                    pick: outcome.pick,
                    status_synced: outcome.status_synced,
                };
                let _ = ui_tx.send(update).await;
                let _ = ui_tx.send(UiUpdate::Snapshot(Box::new(snapshot))).await;
            }
            Err(e) => report_error(room, e, ui_tx).await,
        },
        UserCommand::Finalize => match room.finalize().await {
            Ok(()) => {
                let total_picks = room.state().total_picks();
                let _ = ui_tx.send(UiUpdate::Finalized { total_picks }).await;
                send_snapshot(room, ui_tx).await;
            }
            Err(e) => report_error(room, e, ui_tx).await,
        },
        UserCommand::Refresh => refresh(room, ui_tx, false).await,
        UserCommand::Status => send_snapshot(room, ui_tx).await,
        UserCommand::Export => {
            let update = match serde_json::to_string_pretty(&room.snapshot()) {
                Ok(json) => UiUpdate::Export(json),
                Err(e) => UiUpdate::Error(format!("failed to serialize board: {e}")),
            };
            let _ = ui_tx.send(update).await;
        }
        UserCommand::Quit => {}
    }
}

async fn send_snapshot(room: &DraftRoom, ui_tx: &mpsc::Sender<UiUpdate>) {
    let _ = ui_tx
        .send(UiUpdate::Snapshot(Box::new(room.snapshot())))
        .await;
}

/// Rebuild the room from the store and push the result.
async fn refresh(room: &mut DraftRoom, ui_tx: &mpsc::Sender<UiUpdate>, remote: bool) {
    match room.refresh().await {
        Ok(summary) => {
            let _ = ui_tx
                .send(UiUpdate::Refreshed {
                    picks: summary.applied,
                    remote,
                })
                .await;
            send_snapshot(room, ui_tx).await;
        }
        Err(e) => {
            warn!("Refresh failed: {}", e);
            let _ = ui_tx
                .send(UiUpdate::Error(format!("refresh failed: {e}")))
                .await;
        }
    }
}

/// Surface an error to the user. Conflicts mean another client got there
/// first, so the room is refreshed before the user retries.
async fn report_error(room: &mut DraftRoom, err: DraftError, ui_tx: &mpsc::Sender<UiUpdate>) {
    let _ = ui_tx.send(UiUpdate::Error(err.to_string())).await;
    if err.needs_refresh() {
        info!("Refreshing after conflicting change: {}", err);
        refresh(room, ui_tx, true).await;
    }
}
