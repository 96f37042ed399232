// Line-oriented console: reads commands from stdin and renders UI updates as
// plain text on stdout.

use std::fmt::Write as _;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info};

use draftroom_core::room::{DraftPhase, RoomSnapshot};

use crate::protocol::{UiUpdate, UserCommand};

/// Forward parsed commands to the event loop until the input ends or the
/// user quits. Parse errors are reported on the UI channel. End of input is
/// treated as `quit`.
pub async fn read_commands<R>(
    reader: R,
    cmd_tx: mpsc::Sender<UserCommand>,
    ui_tx: mpsc::Sender<UiUpdate>,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        match UserCommand::parse(&line) {
            Ok(Some(cmd)) => {
                debug!("Command: {:?}", cmd);
                let quit = cmd == UserCommand::Quit;
                if cmd_tx.send(cmd).await.is_err() || quit {
                    return Ok(());
                }
            }
            Ok(None) => {}
            Err(e) => {
                let _ = ui_tx.send(UiUpdate::Error(e.to_string())).await;
            }
        }
    }

    info!("Input closed");
    let _ = cmd_tx.send(UserCommand::Quit).await;
    Ok(())
}

/// Write every UI update to `out` until the channel closes.
pub async fn print_updates<W>(mut ui_rx: mpsc::Receiver<UiUpdate>, mut out: W) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(update) = ui_rx.recv().await {
        let mut text = format_update(&update);
        text.push('\n');
        out.write_all(text.as_bytes()).await?;
        out.flush().await?;
    }
    Ok(())
}

/// Render one update as text.
pub fn format_update(update: &UiUpdate) -> String {
    match update {
        UiUpdate::Snapshot(snapshot) => format_board(snapshot),
        UiUpdate::Picked {
            pick,
            player_name,
            team_name,
            phase,
            status_synced,
        } => {
            let mut s = format!(
                "Pick #{} (round {}): {} -> {}",
                pick.pick_number, pick.round, player_name, team_name
            );
            if *phase == DraftPhase::CompletedPendingConfirmation {
                s.push_str("\nEveryone is drafted. Type 'finalize' to lock the teams or 'undo' to change the last pick.");
            }
            if !status_synced {
                s.push_str("\n(warning: draft status could not be saved; it will be retried)");
            }
            s
        }
        UiUpdate::Undone {
            pick,
            player_name,
            team_name,
            status_synced,
        } => {
            let mut s = format!(
                "Undid pick #{}: {} is back in the pool (was {})",
                pick.pick_number, player_name, team_name
            );
            if !status_synced {
                s.push_str("\n(warning: draft status could not be saved; it will be retried)");
            }
            s
        }
        UiUpdate::Finalized { total_picks } => {
            format!("Draft finalized after {total_picks} picks. Teams are locked.")
        }
        UiUpdate::Refreshed { picks, remote } => {
            if *remote {
                format!("Board updated from another device ({picks} picks)")
            } else {
                format!("Board reloaded ({picks} picks)")
            }
        }
        UiUpdate::Export(json) => json.clone(),
        UiUpdate::Error(message) => format!("error: {message}"),
    }
}

fn format_board(snap: &RoomSnapshot) -> String {
    let mut s = String::new();
    let _ = writeln!(
        s,
        "== {} ({} draft) :: {} ==",
        snap.event_id, snap.format, snap.phase
    );

    for team in &snap.teams {
        let marker = if team.id == snap.on_clock && !is_closed(snap.phase) {
            "*"
        } else {
            " "
        };
        let mut names = vec![format!("{} (c)", snap.player_name(&team.captain_id))];
        names.extend(team.roster.iter().map(|id| snap.player_name(id).to_string()));
        let _ = writeln!(s, "{marker} {}: {}", team.name, names.join(", "));
    }

    if !is_closed(snap.phase) {
        let _ = writeln!(
            s,
            "Round {}, pick #{}: {} on the clock",
            snap.turn.round,
            snap.total_picks + 1,
            snap.team_name(&snap.on_clock)
        );
    }

    if snap.available.is_empty() {
        s.push_str("Available: none");
    } else {
        let _ = write!(s, "Available ({}):", snap.available.len());
        for p in &snap.available {
            let _ = write!(s, "\n  {:<8} {}", p.id, p.name);
            match (&p.position, p.rating) {
                (Some(pos), Some(r)) => {
                    let _ = write!(s, " [{pos}, {r:.1}]");
                }
                (Some(pos), None) => {
                    let _ = write!(s, " [{pos}]");
                }
                (None, Some(r)) => {
                    let _ = write!(s, " [{r:.1}]");
                }
                (None, None) => {}
            }
        }
    }
    s
}

fn is_closed(phase: DraftPhase) -> bool {
    matches!(
        phase,
        DraftPhase::CompletedPendingConfirmation | DraftPhase::Finalized
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftroom_core::draft::pick::DraftPick;
    use draftroom_core::draft::sequencer::{DraftFormat, Turn};
    use draftroom_core::draft::team::{Player, Team};

    fn snapshot() -> RoomSnapshot {
        let mut blue = Team::new("blue", "Blue", None, "c1");
        blue.roster.push("p1".into());
        let red = Team::new("red", "Red", None, "c2");
        let mut p2 = Player::new("p2", "Grace");
        p2.position = Some("GK".into());
        p2.rating = Some(4.0);
        let players = vec![
            Player::new("c1", "Cap One"),
            Player::new("c2", "Cap Two"),
            Player::new("p1", "Ada"),
            p2.clone(),
        ];
        RoomSnapshot {
            event_id: "evt".into(),
            session_id: 1,
            format: DraftFormat::Snake,
            phase: DraftPhase::InProgress,
            turn: Turn { team: 1, round: 1 },
            on_clock: "red".into(),
            total_picks: 1,
            available: vec![p2],
            teams: vec![blue, red],
            picks: vec![DraftPick {
                pick_number: 1,
                team_index: 0,
                team_id: "blue".into(),
                player_id: "p1".into(),
                round: 1,
            }],
            players,
        }
    }

    #[test]
    fn board_shows_rosters_clock_and_pool() {
        let text = format_update(&UiUpdate::Snapshot(Box::new(snapshot())));
        assert!(text.starts_with("== evt (snake draft) :: in progress =="));
        assert!(text.contains("  Blue: Cap One (c), Ada"));
        assert!(text.contains("* Red: Cap Two (c)"));
        assert!(text.contains("Round 1, pick #2: Red on the clock"));
        assert!(text.contains("p2       Grace [GK, 4.0]"));
    }

    #[test]
    fn completed_board_hides_the_clock() {
        let mut snap = snapshot();
        snap.phase = DraftPhase::CompletedPendingConfirmation;
        snap.available.clear();
        let text = format_update(&UiUpdate::Snapshot(Box::new(snap)));
        assert!(!text.contains("on the clock"));
        assert!(text.contains("Available: none"));
    }

    #[test]
    fn pick_message_mentions_unsynced_status() {
        let update = UiUpdate::Picked {
            pick: snapshot().picks[0].clone(),
            player_name: "Ada".into(),
            team_name: "Blue".into(),
            phase: DraftPhase::InProgress,
            status_synced: false,
        };
        let text = format_update(&update);
        assert!(text.starts_with("Pick #1 (round 1): Ada -> Blue"));
        assert!(text.contains("could not be saved"));
    }

    #[tokio::test]
    async fn read_commands_parses_lines_and_quits_at_eof() {
        let input: &[u8] = b"pick p2\n\nbogus\nundo\n";
        let (cmd_tx, mut cmd_rx) = mpsc::channel(8);
        let (ui_tx, mut ui_rx) = mpsc::channel(8);

        read_commands(input, cmd_tx, ui_tx).await.unwrap();

        assert_eq!(cmd_rx.recv().await, Some(UserCommand::Pick("p2".into())));
        assert_eq!(cmd_rx.recv().await, Some(UserCommand::Undo));
        assert_eq!(cmd_rx.recv().await, Some(UserCommand::Quit));
        assert_eq!(cmd_rx.recv().await, None);
        assert!(matches!(ui_rx.recv().await, Some(UiUpdate::Error(_))));
    }

    #[tokio::test]
    async fn read_commands_stops_at_quit() {
        let input: &[u8] = b"status\nquit\npick p1\n";
        let (cmd_tx, mut cmd_rx) = mpsc::channel(8);
        let (ui_tx, _ui_rx) = mpsc::channel(8);

        read_commands(input, cmd_tx, ui_tx).await.unwrap();

        assert_eq!(cmd_rx.recv().await, Some(UserCommand::Status));
        assert_eq!(cmd_rx.recv().await, Some(UserCommand::Quit));
        assert_eq!(cmd_rx.recv().await, None);
    }

    #[tokio::test]
    async fn print_updates_writes_one_block_per_update() {
        let (ui_tx, ui_rx) = mpsc::channel(4);
        ui_tx.send(UiUpdate::Error("nope".into())).await.unwrap();
        ui_tx
            .send(UiUpdate::Finalized { total_picks: 7 })
            .await
            .unwrap();
        drop(ui_tx);

        let mut out = Vec::new();
        print_updates(ui_rx, &mut out).await.unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "error: nope\nDraft finalized after 7 picks. Teams are locked.\n"
        );
    }
}
