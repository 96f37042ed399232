// Turn-order arithmetic for alternating and snake drafts.
//
// Everything here is a pure function over counters. The orchestrator owns the
// mutable draft state and asks these functions who picks next (or who picked
// last, for undo).

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How the pick order moves between teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DraftFormat {
    /// Strict round robin: 0, 1, ..., n-1, 0, 1, ...
    Alternating,
    /// Serpentine: direction reverses every round, and the team that closes a
    /// round opens the next one.
    Snake,
}

impl DraftFormat {
    /// Parse a format name. Case-insensitive; "linear" and "round_robin" are
    /// accepted as aliases for alternating.
    pub fn from_str_format(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "alternating" | "linear" | "round_robin" => Some(DraftFormat::Alternating),
            "snake" | "serpentine" => Some(DraftFormat::Snake),
            _ => None,
        }
    }

    pub fn display_str(&self) -> &'static str {
        match self {
            DraftFormat::Alternating => "alternating",
            DraftFormat::Snake => "snake",
        }
    }
}

impl fmt::Display for DraftFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_str())
    }
}

// Accepts the same names and aliases as `from_str_format`.
impl<'de> Deserialize<'de> for DraftFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        DraftFormat::from_str_format(&s)
            .ok_or_else(|| de::Error::unknown_variant(&s, &["alternating", "snake"]))
    }
}

/// Whose turn it is, and which round the upcoming pick belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Turn {
    /// Index of the team on the clock.
    pub team: usize,
    /// 1-based round number. Only advanced under the snake format.
    pub round: u32,
}

impl Turn {
    pub const fn initial() -> Self {
        Turn { team: 0, round: 1 }
    }
}

impl Default for Turn {
    fn default() -> Self {
        Turn::initial()
    }
}

/// Canonical starting values for a fresh draft: team 0 on the clock in
/// round 1 with no picks made.
pub fn initial_state(_format: DraftFormat, _team_count: usize) -> (Turn, u32) {
    (Turn::initial(), 0)
}

/// Compute the turn after the pick that is about to be completed.
///
/// `completed_picks` is the number of picks made *before* this one, so the
/// pick being completed raises the count to `completed_picks + 1`.
///
/// Under snake, the returned round is `floor((completed_picks + 1) / n) + 1`,
/// i.e. the round of the upcoming pick.
pub fn next_turn(
    format: DraftFormat,
    current: Turn,
    completed_picks: u32,
    team_count: usize,
) -> Turn {
    debug_assert!(team_count >= 2, "a draft needs at least two teams");

    match format {
        DraftFormat::Alternating => Turn {
            team: step_forward(current.team, team_count),
            round: current.round,
        },
        DraftFormat::Snake => {
            let n = team_count as u32;
            let picks_after = completed_picks + 1;
            let round = picks_after / n + 1;
            let team = if picks_after % n == 0 {
                // Round boundary: the last picker goes again.
                current.team
            } else if round % 2 == 1 {
                step_forward(current.team, team_count)
            } else {
                step_backward(current.team, team_count)
            };
            Turn { team, round }
        }
    }
}

/// Inverse of [`next_turn`], used by undo.
///
/// `completed_picks` counts the pick being undone (the counter *before* the
/// undo is applied). Returns the turn that was current immediately before
/// that pick. With no completed picks there is nothing to undo and the
/// initial turn is returned.
pub fn previous_turn(
    format: DraftFormat,
    current: Turn,
    completed_picks: u32,
    team_count: usize,
) -> Turn {
    debug_assert!(team_count >= 2, "a draft needs at least two teams");

    if completed_picks == 0 {
        return Turn::initial();
    }

    match format {
        DraftFormat::Alternating => Turn {
            team: step_backward(current.team, team_count),
            round: current.round,
        },
        DraftFormat::Snake => {
            let n = team_count as u32;
            let picks_after = completed_picks;
            let round_after = picks_after / n + 1;
            let team = if picks_after % n == 0 {
                current.team
            } else if round_after % 2 == 1 {
                step_backward(current.team, team_count)
            } else {
                step_forward(current.team, team_count)
            };
            Turn {
                team,
                round: (picks_after - 1) / n + 1,
            }
        }
    }
}

/// True iff no players remain in the available pool.
pub fn is_complete(available_pool_size: usize) -> bool {
    available_pool_size == 0
}

/// Positional form of the pick order: which team makes the pick with
/// 0-based index `pick_index`, assuming team 0 opened the draft.
pub fn team_for_pick(format: DraftFormat, pick_index: u32, team_count: usize) -> usize {
    let n = team_count as u32;
    let position = pick_index % n;
    let team = match format {
        DraftFormat::Alternating => position,
        DraftFormat::Snake => {
            if (pick_index / n) % 2 == 0 {
                position
            } else {
                n - 1 - position
            }
        }
    };
    team as usize
}

fn step_forward(team: usize, team_count: usize) -> usize {
    (team + 1) % team_count
}

fn step_backward(team: usize, team_count: usize) -> usize {
    (team + team_count - 1) % team_count
}
