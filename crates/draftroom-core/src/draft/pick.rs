// Individual pick representation.

use serde::{Deserialize, Serialize};

/// A single draft pick as held in the orchestrator's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftPick {
    /// Sequential pick number (1-indexed).
    pub pick_number: u32,
    /// Index into the draft's team list.
    pub team_index: usize,
    /// ID of the team that made the pick.
    pub team_id: String,
    /// ID of the drafted player.
    pub player_id: String,
    /// Round the pick was made in (always 1 under alternating).
    pub round: u32,
}
