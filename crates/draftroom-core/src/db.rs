// SQLite persistence layer for draft sessions and picks.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Transaction};

use crate::draft::sequencer::DraftFormat;
use crate::store::{
    DraftSession, DraftStore, NewPick, PickRecord, SessionId, SessionStatus, StoreError,
};

/// SQLite-backed persistence for draft sessions, picks, and the permanent
/// team rosters written on finalize.
pub struct Database {
    conn: Mutex<Connection>,
}

/// A row of the permanent `team_rosters` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    pub team_id: String,
    pub player_id: String,
    pub pick_number: u32,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral in-memory database (useful
    /// for tests).
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS draft_sessions (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                event_id     TEXT NOT NULL UNIQUE,
                format       TEXT,
                status       TEXT NOT NULL DEFAULT 'not_started',
                created_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                updated_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                finalized_at TEXT
            );

            CREATE TABLE IF NOT EXISTS draft_picks (
                session_id  INTEGER NOT NULL REFERENCES draft_sessions(id),
                pick_number INTEGER NOT NULL,
                team_id     TEXT NOT NULL,
                player_id   TEXT NOT NULL,
                picked_at   TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                PRIMARY KEY (session_id, pick_number),
                UNIQUE (session_id, player_id)
            );

            CREATE TABLE IF NOT EXISTS team_rosters (
                event_id    TEXT NOT NULL,
                team_id     TEXT NOT NULL,
                player_id   TEXT NOT NULL,
                pick_number INTEGER NOT NULL,
                PRIMARY KEY (event_id, player_id)
            );
            ",
        )
        .context("failed to create database schema")?;

        // Migration: sessions created before the format was stored. The
        // column is filled in by the next get_or_create_session.
        conn.execute_batch("ALTER TABLE draft_sessions ADD COLUMN format TEXT;")
            .ok(); // Fails with "duplicate column name" once the column exists

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Acquire the database connection.
    ///
    /// Panics if the mutex is poisoned (another thread panicked while
    /// holding the lock). This should never happen in normal operation.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    /// Fetch the session row, or `SessionNotFound`.
    fn session_row(conn: &Connection, session_id: SessionId) -> Result<DraftSession, StoreError> {
        let row = conn
            .query_row(
                "SELECT id, event_id, format, status, finalized_at
                   FROM draft_sessions WHERE id = ?1",
                params![session_id],
                |row| {
                    Ok((
                        row.get::<_, SessionId>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()
            .context("failed to load draft session")?;

        let (id, event_id, format, status, finalized_at) =
            row.ok_or(StoreError::SessionNotFound(session_id))?;
        Ok(DraftSession {
            id,
            event_id,
            format: parse_format(format.as_deref())?,
            status: parse_status(&status)?,
            finalized: finalized_at.is_some(),
        })
    }

    /// Fetch the session and fail if it is finalized.
    fn open_session(tx: &Transaction<'_>, session_id: SessionId) -> Result<DraftSession, StoreError> {
        let session = Self::session_row(tx, session_id)?;
        if session.finalized {
            return Err(StoreError::SessionFinalized(session_id));
        }
        Ok(session)
    }

    /// Return the session for `event_id`, creating it with `format` on first
    /// use. Uses an upsert so concurrent callers converge on the same row. An
    /// existing session keeps the format it was created with.
    pub fn get_or_create_session(
        &self,
        event_id: &str,
        format: DraftFormat,
    ) -> Result<DraftSession, StoreError> {
        let conn = self.conn();
        let (id, stored_format, status, finalized_at): (
            SessionId,
            Option<String>,
            String,
            Option<String>,
        ) = conn
            .query_row(
                "INSERT INTO draft_sessions (event_id, format) VALUES (?1, ?2)
                 ON CONFLICT(event_id) DO UPDATE
                    SET format = COALESCE(draft_sessions.format, excluded.format)
                 RETURNING id, format, status, finalized_at",
                params![event_id, format.display_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )
            .context("failed to get or create draft session")?;

        Ok(DraftSession {
            id,
            event_id: event_id.to_string(),
            format: parse_format(stored_format.as_deref())?,
            status: parse_status(&status)?,
            finalized: finalized_at.is_some(),
        })
    }

    pub fn update_status(&self, session_id: SessionId, status: SessionStatus) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        Self::open_session(&tx, session_id)?;
        tx.execute(
            "UPDATE draft_sessions
                SET status = ?1, updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
              WHERE id = ?2",
            params![status.as_str(), session_id],
        )
        .context("failed to update session status")?;
        tx.commit().context("failed to commit status update")?;
        Ok(())
    }

    /// Record a single draft pick.
    ///
    /// Re-recording the exact same pick is a no-op that returns the stored
    /// row. A different pick at an occupied pick number, or a second pick of
    /// the same player, is rejected rather than overwritten.
    pub fn record_pick(&self, session_id: SessionId, pick: &NewPick) -> Result<PickRecord, StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        Self::open_session(&tx, session_id)?;

        if let Some(existing) = Self::pick_at(&tx, session_id, pick.pick_number)? {
            if existing.team_id == pick.team_id && existing.player_id == pick.player_id {
                return Ok(existing);
            }
            return Err(StoreError::PickConflict {
                session_id,
                pick_number: pick.pick_number,
            });
        }

        let inserted = tx.query_row(
            "INSERT INTO draft_picks (session_id, pick_number, team_id, player_id)
             VALUES (?1, ?2, ?3, ?4)
             RETURNING picked_at",
            params![session_id, pick.pick_number, pick.team_id, pick.player_id],
            |row| row.get::<_, String>(0),
        );

        let picked_at = match inserted {
            Ok(ts) => ts,
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(StoreError::PlayerTaken {
                    session_id,
                    player_id: pick.player_id.clone(),
                });
            }
            Err(e) => return Err(anyhow::Error::new(e).context("failed to record draft pick").into()),
        };

        tx.commit().context("failed to commit draft pick")?;

        Ok(PickRecord {
            session_id,
            pick_number: pick.pick_number,
            team_id: pick.team_id.clone(),
            player_id: pick.player_id.clone(),
            picked_at,
        })
    }

    fn pick_at(
        conn: &Connection,
        session_id: SessionId,
        pick_number: u32,
    ) -> Result<Option<PickRecord>> {
        conn.query_row(
            "SELECT pick_number, team_id, player_id, picked_at
               FROM draft_picks WHERE session_id = ?1 AND pick_number = ?2",
            params![session_id, pick_number],
            |row| {
                Ok(PickRecord {
                    session_id,
                    pick_number: row.get(0)?,
                    team_id: row.get(1)?,
                    player_id: row.get(2)?,
                    picked_at: row.get(3)?,
                })
            },
        )
        .optional()
        .context("failed to look up draft pick")
    }

    /// Delete the latest pick. Refuses to delete a pick that has later picks
    /// recorded after it, or a stored pick that differs from `pick`.
    pub fn delete_last_pick(&self, session_id: SessionId, pick: &NewPick) -> Result<(), StoreError> {
        let pick_number = pick.pick_number;
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        Self::open_session(&tx, session_id)?;

        let latest: Option<u32> = tx
            .query_row(
                "SELECT MAX(pick_number) FROM draft_picks WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .context("failed to find latest pick")?;

        match latest {
            Some(latest) if latest > pick_number => {
                return Err(StoreError::PickNotLast {
                    session_id,
                    pick_number,
                });
            }
            Some(latest) if latest == pick_number => {
                let stored = Self::pick_at(&tx, session_id, pick_number)?;
                if let Some(stored) = stored {
                    if stored.team_id != pick.team_id || stored.player_id != pick.player_id {
                        return Err(StoreError::PickConflict {
                            session_id,
                            pick_number,
                        });
                    }
                }
                tx.execute(
                    "DELETE FROM draft_picks WHERE session_id = ?1 AND pick_number = ?2",
                    params![session_id, pick_number],
                )
                .context("failed to delete draft pick")?;
            }
            // Already gone.
            _ => {}
        }

        tx.commit().context("failed to commit pick deletion")?;
        Ok(())
    }

    /// Load the picks of a session, ordered by pick number.
    pub fn load_picks(&self, session_id: SessionId) -> Result<Vec<PickRecord>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT pick_number, team_id, player_id, picked_at
                   FROM draft_picks WHERE session_id = ?1 ORDER BY pick_number",
            )
            .context("failed to prepare load_picks query")?;

        let picks = stmt
            .query_map(params![session_id], |row| {
                Ok(PickRecord {
                    session_id,
                    pick_number: row.get(0)?,
                    team_id: row.get(1)?,
                    player_id: row.get(2)?,
                    picked_at: row.get(3)?,
                })
            })
            .context("failed to query draft picks")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map draft pick rows")?;

        Ok(picks)
    }

    /// Copy the session's picks into `team_rosters` and close the session, in
    /// one transaction with automatic rollback on error. The session must hold
    /// exactly `expected_picks` picks.
    pub fn finalize_session(
        &self,
        session_id: SessionId,
        event_id: &str,
        expected_picks: u32,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        let session = Self::open_session(&tx, session_id)?;
        if session.event_id != event_id {
            return Err(anyhow::anyhow!(
                "session {session_id} belongs to event {}, not {event_id}",
                session.event_id
            )
            .into());
        }

        let found: u32 = tx
            .query_row(
                "SELECT COUNT(*) FROM draft_picks WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )
            .context("failed to count draft picks")?;
        if found != expected_picks {
            return Err(StoreError::PickCountMismatch {
                session_id,
                expected: expected_picks,
                found,
            });
        }

        tx.execute(
            "INSERT INTO team_rosters (event_id, team_id, player_id, pick_number)
             SELECT ?1, team_id, player_id, pick_number
               FROM draft_picks WHERE session_id = ?2",
            params![event_id, session_id],
        )
        .context("failed to copy picks into team rosters")?;

        tx.execute(
            "UPDATE draft_sessions
                SET status = 'completed',
                    updated_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now'),
                    finalized_at = strftime('%Y-%m-%dT%H:%M:%fZ', 'now')
              WHERE id = ?1",
            params![session_id],
        )
        .context("failed to close draft session")?;

        tx.commit().context("failed to commit finalize")?;
        Ok(())
    }

    /// Permanent roster entries for an event, ordered by pick number.
    pub fn team_rosters(&self, event_id: &str) -> Result<Vec<RosterEntry>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT team_id, player_id, pick_number
                   FROM team_rosters WHERE event_id = ?1 ORDER BY pick_number",
            )
            .context("failed to prepare team_rosters query")?;

        let rows = stmt
            .query_map(params![event_id], |row| {
                Ok(RosterEntry {
                    team_id: row.get(0)?,
                    player_id: row.get(1)?,
                    pick_number: row.get(2)?,
                })
            })
            .context("failed to query team rosters")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map team roster rows")?;

        Ok(rows)
    }
}

fn parse_format(s: Option<&str>) -> Result<DraftFormat, StoreError> {
    let s = s.ok_or_else(|| anyhow::anyhow!("draft session has no stored format"))?;
    DraftFormat::from_str_format(s)
        .ok_or_else(|| anyhow::anyhow!("unknown draft format '{s}'").into())
}

fn parse_status(s: &str) -> Result<SessionStatus, StoreError> {
    SessionStatus::from_str_status(s)
        .ok_or_else(|| anyhow::anyhow!("unknown draft session status '{s}'").into())
}

// Local SQLite calls are short; they run inline on the caller's task.
#[async_trait]
impl DraftStore for Database {
    async fn get_or_create_session(
        &self,
        event_id: &str,
        format: DraftFormat,
    ) -> Result<DraftSession, StoreError> {
        Database::get_or_create_session(self, event_id, format)
    }

    async fn update_status(
        &self,
        session_id: SessionId,
        status: SessionStatus,
    ) -> Result<(), StoreError> {
        Database::update_status(self, session_id, status)
    }

    async fn record_pick(
        &self,
        session_id: SessionId,
        pick: &NewPick,
    ) -> Result<PickRecord, StoreError> {
        Database::record_pick(self, session_id, pick)
    }

    async fn delete_last_pick(
        &self,
        session_id: SessionId,
        pick: &NewPick,
    ) -> Result<(), StoreError> {
        Database::delete_last_pick(self, session_id, pick)
    }

    async fn list_picks(&self, session_id: SessionId) -> Result<Vec<PickRecord>, StoreError> {
        self.load_picks(session_id)
    }

    async fn finalize(
        &self,
        session_id: SessionId,
        event_id: &str,
        expected_picks: u32,
    ) -> Result<(), StoreError> {
        self.finalize_session(session_id, event_id, expected_picks)
    }
}
