// Messages between the console and the draft event loop.

use draftroom_core::draft::pick::DraftPick;
use draftroom_core::room::{DraftPhase, RoomSnapshot};
use thiserror::Error;

/// Commands typed by the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    /// Draft a player for the team on the clock.
    Pick(String),
    Undo,
    Finalize,
    /// Refetch all picks from the store.
    Refresh,
    Status,
    /// Print the board as JSON.
    Export,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command '{0}' (try: pick <id>, undo, finalize, refresh, status, export, quit)")]
    Unknown(String),

    #[error("usage: {0}")]
    Usage(&'static str),
}

impl UserCommand {
    /// Parse one line of input. Blank lines yield `Ok(None)`.
    pub fn parse(line: &str) -> Result<Option<UserCommand>, CommandError> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Ok(None);
        };
        let arg = parts.next();
        let extra = parts.next().is_some();

        let cmd = match verb.to_ascii_lowercase().as_str() {
            "pick" | "p" => match (arg, extra) {
                (Some(id), false) => UserCommand::Pick(id.to_string()),
                _ => return Err(CommandError::Usage("pick <player-id>")),
            },
            "undo" | "u" => UserCommand::Undo,
            "finalize" | "confirm" => UserCommand::Finalize,
            "refresh" | "r" => UserCommand::Refresh,
            "status" | "s" => UserCommand::Status,
            "export" => UserCommand::Export,
            "quit" | "q" | "exit" => UserCommand::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(Some(cmd))
    }
}

/// Updates pushed from the event loop to the console.
#[derive(Debug, Clone, PartialEq)]
pub enum UiUpdate {
    /// Full board after any change.
    Snapshot(Box<RoomSnapshot>),
    Picked {
        pick: DraftPick,
        player_name: String,
        team_name: String,
        phase: DraftPhase,
        status_synced: bool,
    },
    Undone {
        pick: DraftPick,
        player_name: String,
        team_name: String,
        status_synced: bool,
    },
    Finalized {
        total_picks: u32,
    },
    /// State was rebuilt from the store.
    Refreshed {
        picks: usize,
        remote: bool,
    },
    /// Pretty-printed JSON board.
    Export(String),
    Error(String),
}
