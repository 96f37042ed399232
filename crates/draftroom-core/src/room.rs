// Draft orchestrator.
//
// A `DraftRoom` owns the in-memory draft state for one client and keeps it in
// step with the persisted session. Every mutation is written to the store
// first; the local state only changes once the write has succeeded.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::draft::pick::DraftPick;
use crate::draft::sequencer::{DraftFormat, Turn};
use crate::draft::state::{DraftState, ReplaySummary};
use crate::draft::team::{Player, Team};
use crate::store::{DraftSession, DraftStore, NewPick, SessionId, SessionStatus, StoreError};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("the draft has been finalized")]
    Finalized,

    #[error("player '{0}' is not in the available pool")]
    PlayerUnavailable(String),

    #[error("there is no pick to undo")]
    NothingToUndo,

    #[error("the draft is not complete yet")]
    NotComplete,

    #[error("unknown team '{0}'")]
    UnknownTeam(String),

    #[error("invalid draft setup: {0}")]
    InvalidSetup(String),

    #[error("session was created as a {stored} draft, but the room is configured for {configured}")]
    FormatMismatch {
        configured: DraftFormat,
        stored: DraftFormat,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DraftError {
    /// Whether the local state is likely stale and should be refreshed from
    /// the store before the user retries.
    pub fn needs_refresh(&self) -> bool {
        match self {
            DraftError::Store(e) => e.is_conflict() || matches!(e, StoreError::SessionFinalized(_)),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Supporting types
// ---------------------------------------------------------------------------

/// Lifecycle of a draft as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftPhase {
    NotStarted,
    InProgress,
    /// The pool is empty; picks can still be undone until the draft is
    /// finalized.
    CompletedPendingConfirmation,
    Finalized,
}

impl DraftPhase {
    /// Session status the store should hold for this phase.
    pub fn session_status(&self) -> SessionStatus {
        match self {
            DraftPhase::NotStarted => SessionStatus::NotStarted,
            DraftPhase::InProgress => SessionStatus::InProgress,
            DraftPhase::CompletedPendingConfirmation | DraftPhase::Finalized => {
                SessionStatus::Completed
            }
        }
    }
}

impl fmt::Display for DraftPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DraftPhase::NotStarted => "not started",
            DraftPhase::InProgress => "in progress",
            DraftPhase::CompletedPendingConfirmation => "complete (awaiting confirmation)",
            DraftPhase::Finalized => "finalized",
        };
        f.write_str(s)
    }
}

/// Everything needed to open a room.
#[derive(Debug, Clone)]
pub struct RoomSetup {
    pub event_id: String,
    pub format: DraftFormat,
    /// Teams in draft order, captains assigned.
    pub teams: Vec<Team>,
    /// Every player attending the event, captains included.
    pub players: Vec<Player>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PickOutcome {
    pub pick: DraftPick,
    pub phase: DraftPhase,
    /// False if the session status could not be updated. The pick itself is
    /// persisted either way.
    pub status_synced: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UndoOutcome {
    pub pick: DraftPick,
    pub phase: DraftPhase,
    pub status_synced: bool,
}

/// Serializable view of a room for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomSnapshot {
    pub event_id: String,
    pub session_id: SessionId,
    pub format: DraftFormat,
    pub phase: DraftPhase,
    pub turn: Turn,
    /// Team ID on the clock.
    pub on_clock: String,
    pub total_picks: u32,
    pub available: Vec<Player>,
    pub teams: Vec<Team>,
    pub picks: Vec<DraftPick>,
    /// Every player in the event, for name lookups.
    pub players: Vec<Player>,
}

impl RoomSnapshot {
    /// Display name of a player, falling back to the ID.
    pub fn player_name<'a>(&'a self, player_id: &'a str) -> &'a str {
        self.players
            .iter()
            .find(|p| p.id == player_id)
            .map(|p| p.name.as_str())
            .unwrap_or(player_id)
    }

    pub fn team_name<'a>(&'a self, team_id: &'a str) -> &'a str {
        self.teams
            .iter()
            .find(|t| t.id == team_id)
            .map(|t| t.name.as_str())
            .unwrap_or(team_id)
    }
}

// ---------------------------------------------------------------------------
// DraftRoom
// ---------------------------------------------------------------------------

pub struct DraftRoom {
    store: Arc<dyn DraftStore>,
    event_id: String,
    session: DraftSession,
    state: DraftState,
}

impl DraftRoom {
    /// Open (or create) the session for the setup's event and replay any
    /// picks already stored for it.
    pub async fn open(setup: RoomSetup, store: Arc<dyn DraftStore>) -> Result<Self, DraftError> {
        validate_setup(&setup)?;

        let session = store
            .get_or_create_session(&setup.event_id, setup.format)
            .await?;
        check_format(&session, setup.format)?;
        let state = DraftState::new(setup.format, setup.teams, setup.players);

        let mut room = DraftRoom {
            store,
            event_id: setup.event_id,
            session,
            state,
        };
        let summary = room.refresh().await?;
        info!(
            "Opened draft for event {} (session {}): {} picks replayed, {} available, phase {}",
            room.event_id,
            room.session.id,
            summary.applied,
            room.state.available.len(),
            room.phase()
        );

        // A crash between a pick and its status update leaves the stored
        // status behind; bring it back in line.
        let expected = room.phase().session_status();
        if !room.session.finalized && room.session.status != expected {
            info!(
                "Stored status {} does not match replayed state, updating to {}",
                room.session.status, expected
            );
            room.sync_status(expected).await;
        }

        Ok(room)
    }

    // -- accessors ---------------------------------------------------------

    pub fn phase(&self) -> DraftPhase {
        if self.session.finalized {
            DraftPhase::Finalized
        } else if self.state.is_complete() {
            DraftPhase::CompletedPendingConfirmation
        } else if self.state.started() {
            DraftPhase::InProgress
        } else {
            DraftPhase::NotStarted
        }
    }

    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn session(&self) -> &DraftSession {
        &self.session
    }

    pub fn state(&self) -> &DraftState {
        &self.state
    }

    pub fn turn(&self) -> Turn {
        self.state.turn
    }

    pub fn team_on_clock(&self) -> &Team {
        self.state.team_on_clock()
    }

    pub fn available(&self) -> &[Player] {
        &self.state.available
    }

    pub fn teams(&self) -> &[Team] {
        &self.state.teams
    }

    pub fn history(&self) -> &[DraftPick] {
        &self.state.picks
    }

    /// Drafted players of one team, in pick order.
    pub fn roster(&self, team_id: &str) -> Result<&[String], DraftError> {
        self.state
            .team(team_id)
            .map(|t| t.roster.as_slice())
            .ok_or_else(|| DraftError::UnknownTeam(team_id.to_string()))
    }

    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            event_id: self.event_id.clone(),
            session_id: self.session.id,
            format: self.state.format,
            phase: self.phase(),
            turn: self.state.turn,
            on_clock: self.state.team_on_clock().id.clone(),
            total_picks: self.state.total_picks(),
            available: self.state.available.clone(),
            teams: self.state.teams.clone(),
            picks: self.state.picks.clone(),
            players: self.state.all_players().to_vec(),
        }
    }

    // -- operations --------------------------------------------------------

    /// Draft `player_id` for the team on the clock.
    pub async fn pick(&mut self, player_id: &str) -> Result<PickOutcome, DraftError> {
        if self.session.finalized {
            return Err(DraftError::Finalized);
        }
        if !self.state.is_available(player_id) {
            return Err(DraftError::PlayerUnavailable(player_id.to_string()));
        }

        let new_pick = NewPick {
            team_id: self.state.team_on_clock().id.clone(),
            player_id: player_id.to_string(),
            pick_number: self.state.total_picks() + 1,
        };
        if let Err(e) = self.store.record_pick(self.session.id, &new_pick).await {
            warn!(
                "Failed to persist pick #{} ({} -> {}): {}",
                new_pick.pick_number, new_pick.player_id, new_pick.team_id, e
            );
            return Err(e.into());
        }

        let pick = self
            .state
            .record_pick(player_id)
            .ok_or_else(|| DraftError::PlayerUnavailable(player_id.to_string()))?;
        info!(
            "Pick #{} (round {}): {} -> {}",
            pick.pick_number, pick.round, pick.player_id, pick.team_id
        );

        let phase = self.phase();
        let status_synced = self.sync_status(phase.session_status()).await;
        if phase == DraftPhase::CompletedPendingConfirmation {
            info!("Pool is empty; draft awaiting confirmation");
        }

        Ok(PickOutcome {
            pick,
            phase,
            status_synced,
        })
    }

    /// Reverse the most recent pick.
    pub async fn undo(&mut self) -> Result<UndoOutcome, DraftError> {
        if self.session.finalized {
            return Err(DraftError::Finalized);
        }
        let last = match self.state.last_pick() {
            Some(last) => NewPick {
                team_id: last.team_id.clone(),
                player_id: last.player_id.clone(),
                pick_number: last.pick_number,
            },
            None => return Err(DraftError::NothingToUndo),
        };

        if let Err(e) = self.store.delete_last_pick(self.session.id, &last).await {
            warn!("Failed to delete pick #{} ({}): {}", last.pick_number, last.player_id, e);
            return Err(e.into());
        }

        let pick = self.state.undo_last_pick().ok_or(DraftError::NothingToUndo)?;
        info!(
            "Undid pick #{}: {} returned to the pool from {}",
            pick.pick_number, pick.player_id, pick.team_id
        );

        let phase = self.phase();
        let status_synced = self.sync_status(phase.session_status()).await;

        Ok(UndoOutcome {
            pick,
            phase,
            status_synced,
        })
    }

    /// Commit the completed draft to permanent rosters. Only allowed once the
    /// pool is empty; the room is finalized only if the store succeeds. The
    /// store rejects the commit if its pick count differs from ours.
    pub async fn finalize(&mut self) -> Result<(), DraftError> {
        match self.phase() {
            DraftPhase::Finalized => return Err(DraftError::Finalized),
            DraftPhase::CompletedPendingConfirmation => {}
            _ => return Err(DraftError::NotComplete),
        }

        let total_picks = self.state.total_picks();
        if let Err(e) = self
            .store
            .finalize(self.session.id, &self.event_id, total_picks)
            .await
        {
            warn!("Failed to finalize session {}: {}", self.session.id, e);
            return Err(e.into());
        }

        self.session.finalized = true;
        self.session.status = SessionStatus::Completed;
        info!(
            "Finalized draft for event {} after {} picks",
            self.event_id, total_picks
        );
        Ok(())
    }

    /// Reload the session and its picks from the store and rebuild the state
    /// by replay. Nothing changes locally if either read fails.
    pub async fn refresh(&mut self) -> Result<ReplaySummary, DraftError> {
        let session = self
            .store
            .get_or_create_session(&self.event_id, self.state.format)
            .await?;
        check_format(&session, self.state.format)?;
        let records = self.store.list_picks(session.id).await?;

        let summary = self.state.restore_from_picks(
            records
                .iter()
                .map(|r| (r.team_id.as_str(), r.player_id.as_str())),
        );
        if summary.skipped > 0 || summary.out_of_turn > 0 {
            warn!(
                "Replay of session {}: {} skipped, {} out of turn",
                session.id, summary.skipped, summary.out_of_turn
            );
        }
        self.session = session;
        Ok(summary)
    }

    /// Push `status` to the store if it differs from the cached one. Failures
    /// are logged and reported, never propagated.
    async fn sync_status(&mut self, status: SessionStatus) -> bool {
        if self.session.status == status {
            return true;
        }
        match self.store.update_status(self.session.id, status).await {
            Ok(()) => {
                self.session.status = status;
                true
            }
            Err(e) => {
                warn!(
                    "Failed to update session {} status to {}: {}",
                    self.session.id, status, e
                );
                false
            }
        }
    }
}

/// A session only opens with the format it was created with.
fn check_format(session: &DraftSession, configured: DraftFormat) -> Result<(), DraftError> {
    if session.format != configured {
        return Err(DraftError::FormatMismatch {
            configured,
            stored: session.format,
        });
    }
    Ok(())
}

fn validate_setup(setup: &RoomSetup) -> Result<(), DraftError> {
    if setup.teams.len() < 2 {
        return Err(DraftError::InvalidSetup(format!(
            "a draft needs at least 2 teams, got {}",
            setup.teams.len()
        )));
    }
    let mut ids = HashSet::new();
    let mut captains = HashSet::new();
    for team in &setup.teams {
        if !ids.insert(team.id.as_str()) {
            return Err(DraftError::InvalidSetup(format!(
                "duplicate team id '{}'",
                team.id
            )));
        }
        if !captains.insert(team.captain_id.as_str()) {
            return Err(DraftError::InvalidSetup(format!(
                "player '{}' captains more than one team",
                team.captain_id
            )));
        }
    }
    Ok(())
}
