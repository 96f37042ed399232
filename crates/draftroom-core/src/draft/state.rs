// Draft state: teams, available pool, pick history and the current turn.

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::pick::DraftPick;
use super::sequencer::{self, DraftFormat, Turn};
use super::team::{Player, Team};

/// The complete in-memory state of one draft session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DraftState {
    /// Pick order format, fixed for the session.
    pub format: DraftFormat,
    /// Teams in draft order; index 0 picks first.
    pub teams: Vec<Team>,
    /// Players still available, kept in the event's original player order.
    pub available: Vec<Player>,
    /// All recorded picks in order.
    pub picks: Vec<DraftPick>,
    /// Team on the clock and round of the upcoming pick.
    pub turn: Turn,
    /// Every player in the event, in original order (stored for undo and
    /// restore).
    players: Vec<Player>,
}

/// Outcome of replaying stored picks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub applied: usize,
    pub skipped: usize,
    /// Picks whose team differed from the one the pick order expected.
    pub out_of_turn: usize,
}

impl DraftState {
    /// Create a fresh draft state.
    ///
    /// Captains are removed from the pool; every other player starts
    /// available. Duplicate player IDs keep their first occurrence.
    pub fn new(format: DraftFormat, teams: Vec<Team>, players: Vec<Player>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let players: Vec<Player> = players
            .into_iter()
            .filter(|p| {
                let fresh = seen.insert(p.id.clone());
                if !fresh {
                    warn!("Dropping duplicate player id '{}'", p.id);
                }
                fresh
            })
            .collect();

        let teams: Vec<Team> = teams
            .into_iter()
            .map(|mut t| {
                t.roster.clear();
                t
            })
            .collect();

        let (turn, _) = sequencer::initial_state(format, teams.len());

        let mut state = DraftState {
            format,
            teams,
            available: Vec::new(),
            picks: Vec::new(),
            turn,
            players,
        };
        state.available = state.initial_pool();
        state
    }

    fn initial_pool(&self) -> Vec<Player> {
        self.players
            .iter()
            .filter(|p| !self.teams.iter().any(|t| t.captain_id == p.id))
            .cloned()
            .collect()
    }

    /// Number of picks completed so far.
    pub fn total_picks(&self) -> u32 {
        self.picks.len() as u32
    }

    pub fn team_count(&self) -> usize {
        self.teams.len()
    }

    /// The team whose turn it is.
    pub fn team_on_clock(&self) -> &Team {
        &self.teams[self.turn.team]
    }

    /// Whether at least one pick has been made.
    pub fn started(&self) -> bool {
        !self.picks.is_empty()
    }

    /// The pool is empty and at least one pick was made. A draft whose pool
    /// was empty from the start is never "completed by a pick".
    pub fn is_complete(&self) -> bool {
        self.started() && sequencer::is_complete(self.available.len())
    }

    pub fn is_available(&self, player_id: &str) -> bool {
        self.available.iter().any(|p| p.id == player_id)
    }

    pub fn last_pick(&self) -> Option<&DraftPick> {
        self.picks.last()
    }

    /// Look up a team by ID.
    pub fn team(&self, team_id: &str) -> Option<&Team> {
        self.teams.iter().find(|t| t.id == team_id)
    }

    pub fn team_index(&self, team_id: &str) -> Option<usize> {
        self.teams.iter().position(|t| t.id == team_id)
    }

    /// Look up any player in the event, drafted or not.
    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    /// All players in the event, captains included.
    pub fn all_players(&self) -> &[Player] {
        &self.players
    }

    /// Record a pick for the team on the clock.
    ///
    /// Returns `None` (leaving state untouched) if the player is not in the
    /// available pool.
    pub fn record_pick(&mut self, player_id: &str) -> Option<DraftPick> {
        let team_index = self.turn.team;
        self.apply_pick(team_index, player_id)
    }

    /// Record a pick for an explicit team, then advance the turn with the
    /// sequencer as if the team on the clock had picked.
    fn apply_pick(&mut self, team_index: usize, player_id: &str) -> Option<DraftPick> {
        let completed = self.total_picks();
        let pool_idx = self.available.iter().position(|p| p.id == player_id)?;
        let team = self.teams.get_mut(team_index)?;

        let player = self.available.remove(pool_idx);
        team.roster.push(player.id);

        let pick = DraftPick {
            pick_number: completed + 1,
            team_index,
            team_id: team.id.clone(),
            player_id: player_id.to_string(),
            round: self.turn.round,
        };
        self.picks.push(pick.clone());
        self.turn = sequencer::next_turn(self.format, self.turn, completed, self.teams.len());
        Some(pick)
    }

    /// Reverse the most recent pick.
    ///
    /// The player goes back into the pool at its original position and the
    /// turn steps back with the sequencer. Returns `None` if there is no
    /// pick to undo.
    pub fn undo_last_pick(&mut self) -> Option<DraftPick> {
        let completed = self.total_picks();
        let pick = self.picks.pop()?;

        let team = &mut self.teams[pick.team_index];
        match team.roster.iter().rposition(|id| *id == pick.player_id) {
            Some(idx) => {
                team.roster.remove(idx);
            }
            None => warn!(
                "Undo: player '{}' missing from team '{}' roster",
                pick.player_id, team.id
            ),
        }

        self.return_to_pool(&pick.player_id);
        self.turn = sequencer::previous_turn(self.format, self.turn, completed, self.teams.len());
        Some(pick)
    }

    fn return_to_pool(&mut self, player_id: &str) {
        let Some(order) = self.players.iter().position(|p| p.id == player_id) else {
            warn!("Undo: player '{}' is not part of this event", player_id);
            return;
        };
        let insert_at = self
            .available
            .iter()
            .position(|p| {
                self.players
                    .iter()
                    .position(|q| q.id == p.id)
                    .is_some_and(|o| o > order)
            })
            .unwrap_or(self.available.len());
        self.available.insert(insert_at, self.players[order].clone());
    }

    /// Rebuild the draft state by replaying stored picks in order.
    ///
    /// Each item is a `(team_id, player_id)` pair. Picks naming an unknown
    /// team or a player not in the pool are skipped with a warning. The
    /// stored team is trusted over the computed pick order; mismatches are
    /// counted and logged.
    pub fn restore_from_picks<'a, I>(&mut self, picks: I) -> ReplaySummary
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for team in &mut self.teams {
            team.roster.clear();
        }
        self.picks.clear();
        self.available = self.initial_pool();
        self.turn = sequencer::initial_state(self.format, self.teams.len()).0;

        let mut summary = ReplaySummary::default();
        for (team_id, player_id) in picks {
            let Some(team_index) = self.team_index(team_id) else {
                warn!("Replay: skipping pick of '{}' by unknown team '{}'", player_id, team_id);
                summary.skipped += 1;
                continue;
            };
            if team_index != self.turn.team {
                warn!(
                    "Replay: pick {} by '{}' but '{}' was on the clock",
                    self.total_picks() + 1,
                    team_id,
                    self.team_on_clock().id
                );
                summary.out_of_turn += 1;
            }
            match self.apply_pick(team_index, player_id) {
                Some(_) => summary.applied += 1,
                None => {
                    warn!("Replay: player '{}' is not available, skipping", player_id);
                    summary.skipped += 1;
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn test_teams() -> Vec<Team> {
        vec![
            Team::new("blue", "Blue", Some("#1f6feb".into()), "cap_blue"),
            Team::new("red", "Red", Some("#d73a49".into()), "cap_red"),
        ]
    }

    fn test_players(n: usize) -> Vec<Player> {
        let mut players = vec![
            Player::new("cap_blue", "Blue Captain"),
            Player::new("cap_red", "Red Captain"),
        ];
        players.extend((1..=n).map(|i| Player::new(format!("P{i}"), format!("Player {i}"))));
        players
    }

    fn snake_state(n: usize) -> DraftState {
        DraftState::new(DraftFormat::Snake, test_teams(), test_players(n))
    }

    fn pool_ids(state: &DraftState) -> Vec<&str> {
        state.available.iter().map(|p| p.id.as_str()).collect()
    }

    /// Pool and rosters (captains included) partition the event's players.
    fn assert_partition(state: &DraftState) {
        let mut seen = HashSet::new();
        for id in state
            .available
            .iter()
            .map(|p| p.id.as_str())
            .chain(state.teams.iter().flat_map(|t| t.members()))
        {
            assert!(seen.insert(id.to_string()), "player '{id}' appears twice");
        }
        let all: HashSet<String> = state.all_players().iter().map(|p| p.id.clone()).collect();
        assert_eq!(seen, all);

        let rostered: usize = state.teams.iter().map(|t| t.roster.len()).sum();
        assert_eq!(rostered as u32, state.total_picks());
        assert!(state.turn.team < state.team_count());
    }

    #[test]
    fn new_state_excludes_captains_from_pool() {
        let state = snake_state(4);
        assert_eq!(pool_ids(&state), vec!["P1", "P2", "P3", "P4"]);
        assert_eq!(state.turn, Turn::initial());
        assert_eq!(state.total_picks(), 0);
        assert!(!state.started());
        assert!(!state.is_complete());
        assert_partition(&state);
    }

    #[test]
    fn new_state_drops_duplicate_players() {
        let mut players = test_players(2);
        players.push(Player::new("P1", "Imposter"));
        let state = DraftState::new(DraftFormat::Snake, test_teams(), players);
        assert_eq!(state.all_players().len(), 4);
        assert_eq!(state.player("P1").unwrap().name, "Player 1");
    }

    #[test]
    fn snake_end_to_end_scenario() {
        let mut state = snake_state(4);
        let mut rounds = Vec::new();

        for (player, expected_team) in [("P1", 0), ("P2", 1), ("P3", 1), ("P4", 0)] {
            assert_eq!(state.turn.team, expected_team);
            let pick = state.record_pick(player).unwrap();
            assert_eq!(pick.team_index, expected_team);
            rounds.push(state.turn.round);
            assert_partition(&state);
            if player != "P4" {
                assert!(!state.is_complete());
            }
        }

        assert_eq!(rounds, vec![1, 2, 2, 3]);
        assert_eq!(state.teams[0].roster, vec!["P1", "P4"]);
        assert_eq!(state.teams[1].roster, vec!["P2", "P3"]);
        assert!(state.available.is_empty());
        assert!(state.is_complete());
    }

    #[test]
    fn record_pick_rejects_unavailable_player() {
        let mut state = snake_state(2);
        assert!(state.record_pick("P1").is_some());
        assert!(state.record_pick("P1").is_none());
        assert!(state.record_pick("cap_red").is_none());
        assert!(state.record_pick("nobody").is_none());
        assert_eq!(state.total_picks(), 1);
        assert_partition(&state);
    }

    #[test]
    fn undo_restores_player_and_turn() {
        let mut state = snake_state(4);
        state.record_pick("P2").unwrap();
        state.record_pick("P4").unwrap();
        let before_turn = state.turn;

        state.record_pick("P3").unwrap();
        assert_eq!(state.total_picks(), 3);

        let undone = state.undo_last_pick().unwrap();
        assert_eq!(undone.player_id, "P3");
        assert_eq!(state.total_picks(), 2);
        assert_eq!(state.turn, before_turn);
        // Returned to its original slot in the pool.
        assert_eq!(pool_ids(&state), vec!["P1", "P3"]);
        assert_partition(&state);
    }

    #[test]
    fn undo_on_empty_history_is_none() {
        let mut state = snake_state(2);
        assert!(state.undo_last_pick().is_none());
        assert_eq!(state.turn, Turn::initial());
    }

    #[test]
    fn undo_reopens_completed_draft() {
        let mut state = snake_state(2);
        state.record_pick("P1").unwrap();
        state.record_pick("P2").unwrap();
        assert!(state.is_complete());

        state.undo_last_pick().unwrap();
        assert!(!state.is_complete());
        assert!(state.is_available("P2"));
    }

    #[test]
    fn undo_everything_returns_to_initial_state() {
        let mut state = snake_state(5);
        for id in ["P3", "P1", "P5", "P2", "P4"] {
            state.record_pick(id).unwrap();
        }
        while state.undo_last_pick().is_some() {
            assert_partition(&state);
        }
        assert_eq!(pool_ids(&state), vec!["P1", "P2", "P3", "P4", "P5"]);
        assert_eq!(state.turn, Turn::initial());
        assert!(!state.started());
    }

    #[test]
    fn partition_holds_across_mixed_pick_and_undo() {
        let mut state = DraftState::new(DraftFormat::Alternating, test_teams(), test_players(6));
        let script = ["P1", "P2", "-", "P6", "P3", "-", "-", "P5", "P4", "P2", "P1", "P3", "-"];
        for step in script {
            if step == "-" {
                let before = state.total_picks();
                if state.undo_last_pick().is_some() {
                    assert_eq!(state.total_picks(), before - 1);
                }
            } else {
                state.record_pick(step);
            }
            assert_partition(&state);
        }
    }

    #[test]
    fn restore_from_picks_replays_history() {
        let mut state = snake_state(4);
        let summary = state.restore_from_picks([
            ("blue", "P1"),
            ("red", "P2"),
            ("red", "P3"),
        ]);
        assert_eq!(
            summary,
            ReplaySummary {
                applied: 3,
                skipped: 0,
                out_of_turn: 0
            }
        );
        assert_eq!(state.total_picks(), 3);
        assert_eq!(state.turn, Turn { team: 0, round: 2 });
        assert_eq!(state.teams[1].roster, vec!["P2", "P3"]);
        assert_partition(&state);
    }

    #[test]
    fn restore_from_picks_resets_previous_state() {
        let mut state = snake_state(4);
        state.record_pick("P4").unwrap();

        state.restore_from_picks([("blue", "P1")]);
        assert_eq!(state.total_picks(), 1);
        assert!(state.is_available("P4"));
        assert_eq!(state.teams[0].roster, vec!["P1"]);
    }

    #[test]
    fn restore_from_picks_skips_bad_rows() {
        let mut state = snake_state(3);
        let summary = state.restore_from_picks([
            ("blue", "P1"),
            ("green", "P2"),
            ("red", "P1"),
            ("blue", "P3"),
        ]);
        assert_eq!(summary.applied, 2);
        assert_eq!(summary.skipped, 2);
        // P3 was stored for blue while red was on the clock.
        assert_eq!(summary.out_of_turn, 1);
        assert_eq!(state.teams[0].roster, vec!["P1", "P3"]);
        assert_partition(&state);
    }

    #[test]
    fn team_lookup() {
        let state = snake_state(1);
        assert_eq!(state.team("red").unwrap().name, "Red");
        assert_eq!(state.team_index("red"), Some(1));
        assert!(state.team("green").is_none());
        assert_eq!(state.team_on_clock().id, "blue");
    }
}
