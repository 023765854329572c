// SQLite persistence layer for season state.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::roster::{RosterRow, RosterStore};
use crate::scoring::period::{GamePhase, GameResult, TeamSide};

/// Outcome of an ingestion-lock acquisition attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    /// The lock was free and is now held by the caller.
    Acquired,
    /// A stale holder (older than the TTL) was evicted and the lock is now
    /// held by the caller.
    Stolen { previous_age_secs: i64 },
    /// A live holder still owns the lock; the caller must not write.
    Held { age_secs: i64 },
}

#[derive(Debug, Serialize, Deserialize)]
struct LockValue {
    token: String,
    acquired_at: DateTime<Utc>,
}

/// SQLite-backed persistence for the roster grid, the canonical game table,
/// the append-only transaction log, and key-value season state.
pub struct Database {
    conn: Mutex<Connection>,
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
            CREATE TABLE IF NOT EXISTS roster_slots (
                team   TEXT NOT NULL,
                week   INTEGER NOT NULL,
                slot   INTEGER NOT NULL,
                school TEXT,
                PRIMARY KEY (team, week, slot)
            );

            CREATE TABLE IF NOT EXISTS games (
                game_id         TEXT PRIMARY KEY,
                phase           TEXT NOT NULL,
                winner          TEXT NOT NULL,
                winner_rank     INTEGER NOT NULL,
                loser           TEXT NOT NULL,
                loser_rank      INTEGER NOT NULL,
                winner_score    INTEGER NOT NULL,
                loser_score     INTEGER NOT NULL,
                conference_game INTEGER NOT NULL,
                game_name       TEXT NOT NULL,
                completed_at    TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS transactions (
                position  INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                team      TEXT NOT NULL,
                week      INTEGER NOT NULL,
                dropped   TEXT NOT NULL,
                added     TEXT NOT NULL,
                slot      INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS season_state (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )
        .context("failed to create database schema")?;

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

    /// Verify that the expected tables exist (used by the setup sequence).
    pub fn verify_schema(&self) -> Result<()> {
        let conn = self.conn();
        for table in ["roster_slots", "games", "transactions", "season_state"] {
            let exists: bool = conn
                .query_row(
                    "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1)",
                    params![table],
                    |row| row.get(0),
                )
                .context("failed to query sqlite_master")?;
            if !exists {
                return Err(anyhow!("missing table {table}"));
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Key-value season state
    // ------------------------------------------------------------------

    /// Persist an arbitrary JSON value under `key`. Uses INSERT OR REPLACE so
    /// repeated saves overwrite the previous value.
    pub fn save_state(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn();
        let json_str = serde_json::to_string(value).context("failed to serialize state value")?;
        conn.execute(
            "INSERT OR REPLACE INTO season_state (key, value) VALUES (?1, ?2)",
            params![key, json_str],
        )
        .context("failed to save state")?;
        Ok(())
    }

    /// Load a previously saved JSON value by `key`. Returns `None` if the key
    /// does not exist.
    pub fn load_state(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT value FROM season_state WHERE key = ?1")
            .context("failed to prepare load_state query")?;

        let mut rows = stmt
            .query_map(params![key], |row| row.get::<_, String>(0))
            .context("failed to query season state")?;

        match rows.next() {
            Some(row_result) => {
                let json_str = row_result.context("failed to read state row")?;
                let value: serde_json::Value = serde_json::from_str(&json_str)
                    .context("failed to deserialize state value")?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Remove a key from the season state. Missing keys are a no-op.
    pub fn delete_state(&self, key: &str) -> Result<()> {
        let conn = self.conn();
        conn.execute("DELETE FROM season_state WHERE key = ?1", params![key])
            .context("failed to delete state")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Canonical game table
    // ------------------------------------------------------------------

    /// Append a completed game. Uses INSERT OR IGNORE keyed on game_id —
    /// returns `false` when the id was already present (duplicate dropped,
    /// never double-applied).
    pub fn record_game(&self, game: &GameResult) -> Result<bool> {
        let conn = self.conn();
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO games
                    (game_id, phase, winner, winner_rank, loser, loser_rank,
                     winner_score, loser_score, conference_game, game_name, completed_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    game.game_id,
                    game.phase.as_label(),
                    game.winner.school,
                    game.winner.rank,
                    game.loser.school,
                    game.loser.rank,
                    game.winner_score,
                    game.loser_score,
                    game.conference_game as i64,
                    game.game_name,
                    game.completed_at.to_rfc3339(),
                ],
            )
            .context("failed to record game")?;
        Ok(inserted > 0)
    }

    /// Whether a game with this id has already been ingested.
    pub fn game_exists(&self, game_id: &str) -> Result<bool> {
        let conn = self.conn();
        let exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM games WHERE game_id = ?1)",
                params![game_id],
                |row| row.get(0),
            )
            .context("failed to check game existence")?;
        Ok(exists)
    }

    /// Load the whole canonical game table in one pass (consistent snapshot
    /// for the points engine and leaderboard).
    pub fn load_games(&self) -> Result<Vec<GameResult>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT game_id, phase, winner, winner_rank, loser, loser_rank,
                        winner_score, loser_score, conference_game, game_name, completed_at
                 FROM games ORDER BY completed_at",
            )
            .context("failed to prepare load_games query")?;

        let raw: Vec<(
            String,
            String,
            String,
            u8,
            String,
            u8,
            u32,
            u32,
            i64,
            String,
            String,
        )> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                    row.get(7)?,
                    row.get(8)?,
                    row.get(9)?,
                    row.get(10)?,
                ))
            })
            .context("failed to query games")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map game rows")?;

        raw.into_iter()
            .map(
                |(
                    game_id,
                    phase_label,
                    winner,
                    winner_rank,
                    loser,
                    loser_rank,
                    winner_score,
                    loser_score,
                    conference_game,
                    game_name,
                    completed_at,
                )| {
                    let phase = GamePhase::from_label(&phase_label)
                        .ok_or_else(|| anyhow!("unknown game phase label: {phase_label}"))?;
                    let completed_at = DateTime::parse_from_rfc3339(&completed_at)
                        .with_context(|| format!("bad completed_at for game {game_id}"))?
                        .with_timezone(&Utc);
                    Ok(GameResult {
                        game_id,
                        phase,
                        winner: TeamSide::new(winner, winner_rank),
                        loser: TeamSide::new(loser, loser_rank),
                        winner_score,
                        loser_score,
                        conference_game: conference_game != 0,
                        game_name,
                        completed_at,
                    })
                },
            )
            .collect()
    }

    // ------------------------------------------------------------------
    // Roster grid
    // ------------------------------------------------------------------

    /// Replace the persisted roster grid with the given store's contents in
    /// a single transaction (used at draft completion and after recovery).
    pub fn replace_roster(&self, roster: &RosterStore) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        tx.execute("DELETE FROM roster_slots", [])
            .context("failed to clear roster grid")?;
        for row in roster.rows() {
            tx.execute(
                "INSERT INTO roster_slots (team, week, slot, school) VALUES (?1, ?2, ?3, ?4)",
                params![row.team, row.week, row.slot as i64, row.school],
            )
            .context("failed to write roster slot")?;
        }
        tx.commit().context("failed to commit roster replace")
    }

    /// Load every persisted roster cell.
    pub fn load_roster_rows(&self) -> Result<Vec<RosterRow>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT team, week, slot, school FROM roster_slots ORDER BY team, week, slot")
            .context("failed to prepare roster query")?;

        let rows = stmt
            .query_map([], |row| {
                Ok(RosterRow {
                    team: row.get(0)?,
                    week: row.get(1)?,
                    slot: row.get::<_, i64>(2)? as usize,
                    school: row.get(3)?,
                })
            })
            .context("failed to query roster slots")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map roster rows")?;

        Ok(rows)
    }

    /// Apply a validated swap atomically: write the added school into the
    /// slot for `from_week` through week 16 and append the transaction log
    /// entry. Returns the log position.
    #[allow(clippy::too_many_arguments)]
    pub fn apply_swap(
        &self,
        team: &str,
        from_week: u8,
        last_week: u8,
        slot: usize,
        dropped: &str,
        added: &str,
        timestamp: DateTime<Utc>,
    ) -> Result<i64> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;

        for week in from_week..=last_week {
            tx.execute(
                "INSERT OR REPLACE INTO roster_slots (team, week, slot, school)
                 VALUES (?1, ?2, ?3, ?4)",
                params![team, week, slot as i64, added],
            )
            .context("failed to write swapped slot")?;
        }

        tx.execute(
            "INSERT INTO transactions (timestamp, team, week, dropped, added, slot)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                timestamp.to_rfc3339(),
                team,
                from_week,
                dropped,
                added,
                slot as i64
            ],
        )
        .context("failed to append transaction")?;
        let position = tx.last_insert_rowid();

        tx.commit().context("failed to commit swap")?;
        Ok(position)
    }

    /// Number of transactions a team has used this season.
    pub fn transaction_count(&self, team: &str) -> Result<u32> {
        let conn = self.conn();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM transactions WHERE team = ?1",
                params![team],
                |row| row.get(0),
            )
            .context("failed to count transactions")?;
        Ok(count as u32)
    }

    /// The full transaction history in log order:
    /// (position, timestamp, team, week, dropped, added, slot).
    pub fn load_transaction_log(
        &self,
    ) -> Result<Vec<(i64, DateTime<Utc>, String, u8, String, String, usize)>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "SELECT position, timestamp, team, week, dropped, added, slot
                 FROM transactions ORDER BY position",
            )
            .context("failed to prepare transaction log query")?;

        let raw: Vec<(i64, String, String, u8, String, String, i64)> = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })
            .context("failed to query transaction log")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map transaction rows")?;

        raw.into_iter()
            .map(|(position, ts, team, week, dropped, added, slot)| {
                let timestamp = DateTime::parse_from_rfc3339(&ts)
                    .with_context(|| format!("bad timestamp at log position {position}"))?
                    .with_timezone(&Utc);
                Ok((position, timestamp, team, week, dropped, added, slot as usize))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Ingestion lock
    // ------------------------------------------------------------------

    /// Try to acquire the named mutual-exclusion token.
    ///
    /// A holder older than `ttl` is treated as abandoned (a crashed or hung
    /// pass) and stolen. On `Held` the caller must abort its write and retry
    /// later — never proceed without the lock.
    pub fn try_acquire_lock(
        &self,
        name: &str,
        token: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<LockState> {
        let key = lock_key(name);
        let new_value = serde_json::to_value(LockValue {
            token: token.to_string(),
            acquired_at: now,
        })
        .context("failed to serialize lock value")?;

        match self.load_state(&key)? {
            None => {
                self.save_state(&key, &new_value)?;
                Ok(LockState::Acquired)
            }
            Some(existing) => {
                let held: LockValue = serde_json::from_value(existing)
                    .context("failed to deserialize lock value")?;
                let age = now.signed_duration_since(held.acquired_at);
                if age > ttl {
                    warn!(
                        "stealing abandoned {name} lock (held {}s by token {})",
                        age.num_seconds(),
                        held.token
                    );
                    self.save_state(&key, &new_value)?;
                    Ok(LockState::Stolen {
                        previous_age_secs: age.num_seconds(),
                    })
                } else {
                    Ok(LockState::Held {
                        age_secs: age.num_seconds(),
                    })
                }
            }
        }
    }

    /// Release the named lock if the caller still holds it. Releasing a lock
    /// that was stolen in the meantime is logged and otherwise a no-op.
    pub fn release_lock(&self, name: &str, token: &str) -> Result<()> {
        let key = lock_key(name);
        match self.load_state(&key)? {
            Some(value) => {
                let held: LockValue =
                    serde_json::from_value(value).context("failed to deserialize lock value")?;
                if held.token == token {
                    self.delete_state(&key)?;
                } else {
                    warn!(
                        "not releasing {name} lock: held by token {} (ours was {token})",
                        held.token
                    );
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    // ------------------------------------------------------------------
    // Typed season-state helpers
    // ------------------------------------------------------------------

    /// Store the in-house CFP top-12 field (school -> seed).
    pub fn set_cfp_field(&self, field: &HashMap<String, u8>) -> Result<()> {
        self.save_state("cfp_top12", &serde_json::to_value(field)?)
    }

    pub fn cfp_field(&self) -> Result<HashMap<String, u8>> {
        match self.load_state("cfp_top12")? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(HashMap::new()),
        }
    }

    pub fn set_heisman_winner(&self, school: &str) -> Result<()> {
        self.save_state("heisman_winner", &serde_json::Value::String(school.into()))
    }

    pub fn heisman_winner(&self) -> Result<Option<String>> {
        Ok(self
            .load_state("heisman_winner")?
            .and_then(|v| v.as_str().map(|s| s.to_string())))
    }

    /// Reset the roster grid, transaction log, and season state to a clean
    /// slate (full draft reset). The canonical game table is preserved.
    pub fn clear_season(&self) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin transaction")?;
        tx.execute("DELETE FROM roster_slots", [])
            .context("failed to delete roster slots")?;
        tx.execute("DELETE FROM transactions", [])
            .context("failed to delete transactions")?;
        tx.execute("DELETE FROM season_state", [])
            .context("failed to delete season state")?;
        tx.commit().context("failed to commit clear_season")
    }
}

fn lock_key(name: &str) -> String {
    format!("lock:{name}")
}
