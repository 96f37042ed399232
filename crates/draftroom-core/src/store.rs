// Persistence collaborators for a draft session.
//
// The orchestrator only talks to storage through `DraftStore`, so the SQLite
// implementation in `db` can be swapped for a hosted backend or a test
// double.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::draft::sequencer::DraftFormat;

pub type SessionId = i64;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("draft session {0} not found")]
    SessionNotFound(SessionId),

    #[error("draft session {0} is finalized and no longer accepts changes")]
    SessionFinalized(SessionId),

    #[error("pick {pick_number} is already recorded for session {session_id}")]
    PickConflict { session_id: SessionId, pick_number: u32 },

    #[error("player {player_id} was already drafted in session {session_id}")]
    PlayerTaken { session_id: SessionId, player_id: String },

    #[error("pick {pick_number} is not the latest pick in session {session_id}")]
    PickNotLast { session_id: SessionId, pick_number: u32 },

    #[error("session {session_id} holds {found} picks, expected {expected}")]
    PickCountMismatch {
        session_id: SessionId,
        expected: u32,
        found: u32,
    },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// Whether the failure means another client changed the session under us,
    /// so the local state should be refetched before retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            StoreError::PickConflict { .. }
                | StoreError::PlayerTaken { .. }
                | StoreError::PickNotLast { .. }
                | StoreError::PickCountMismatch { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Persisted status of a draft session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    NotStarted,
    InProgress,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::NotStarted => "not_started",
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
        }
    }

    pub fn from_str_status(s: &str) -> Option<Self> {
        match s {
            "not_started" => Some(SessionStatus::NotStarted),
            "in_progress" => Some(SessionStatus::InProgress),
            "completed" => Some(SessionStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A draft session row. One per event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSession {
    pub id: SessionId,
    pub event_id: String,
    /// Turn order fixed when the session was created.
    pub format: DraftFormat,
    pub status: SessionStatus,
    /// Set once the picks have been committed to permanent rosters.
    pub finalized: bool,
}

/// A pick the client wants to record, or the pick it believes is the
/// latest when undoing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPick {
    pub team_id: String,
    pub player_id: String,
    /// 1-indexed position of this pick in the session.
    pub pick_number: u32,
}

/// A pick as stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickRecord {
    pub session_id: SessionId,
    pub pick_number: u32,
    pub team_id: String,
    pub player_id: String,
    /// ISO-8601 UTC timestamp assigned by the store.
    pub picked_at: String,
}

// ---------------------------------------------------------------------------
// Collaborator trait
// ---------------------------------------------------------------------------

#[async_trait]
pub trait DraftStore: Send + Sync {
    /// Return the session for `event_id`, creating it with `format` if
    /// needed. Idempotent; an existing session keeps its stored format.
    async fn get_or_create_session(
        &self,
        event_id: &str,
        format: DraftFormat,
    ) -> Result<DraftSession, StoreError>;

    async fn update_status(
        &self,
        session_id: SessionId,
        status: SessionStatus,
    ) -> Result<(), StoreError>;

    /// Record a pick. Pick numbers are unique per session; re-recording an
    /// identical pick returns the stored row.
    async fn record_pick(
        &self,
        session_id: SessionId,
        pick: &NewPick,
    ) -> Result<PickRecord, StoreError>;

    /// Remove the latest pick of the session, provided it is `pick` (same
    /// number, team and player). Succeeds without effect if the pick is
    /// already gone.
    async fn delete_last_pick(
        &self,
        session_id: SessionId,
        pick: &NewPick,
    ) -> Result<(), StoreError>;

    /// All picks of the session ordered by pick number.
    async fn list_picks(&self, session_id: SessionId) -> Result<Vec<PickRecord>, StoreError>;

    /// Commit the session's picks to the event's permanent rosters and close
    /// the session. All or nothing. Fails with `PickCountMismatch` unless the
    /// session holds exactly `expected_picks` picks.
    async fn finalize(
        &self,
        session_id: SessionId,
        event_id: &str,
        expected_picks: u32,
    ) -> Result<(), StoreError>;
}
