// Lock-guarded ingestion of completed games into the canonical game table.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{info, warn};

use super::feed::{Calendar, FeedError, FeedGame, GameStatus, ScoreFeed};
use crate::leaderboard::cfp_top12_from_rankings;
use crate::scoring::period::{is_championship_name, GamePhase, GameResult};
use crate::store::{Database, LockState};

/// Name of the mutual-exclusion token guarding the game-table write path.
pub const INGEST_LOCK: &str = "ingest";

/// A lock holder older than this is treated as abandoned and stolen.
pub const LOCK_TTL_SECS: i64 = 30;

pub(crate) const CALENDAR_CACHE_KEY: &str = "calendar_cache";
const BOWL_PARTICIPANTS_KEY: &str = "bowl_participants";

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("another ingestion pass holds the {lock} lock (age {age_secs}s); write aborted")]
    LockHeld { lock: String, age_secs: i64 },

    #[error(transparent)]
    Feed(#[from] FeedError),

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Summary of one ingestion pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub fetched: usize,
    pub inserted: usize,
    /// Duplicate game ids dropped (logged, never double-applied).
    pub duplicates: usize,
    /// Whether the calendar came from the cached last-known-good copy.
    pub calendar_from_cache: bool,
    /// Whether the scoreboard fetch failed and the pass continued with no
    /// new games (soft failure).
    pub feed_unavailable: bool,
}

/// Classify a feed game into its schedule phase.
///
/// Playoff rounds and the championship are identified by game-name patterns
/// (the feed's week label misclassifies the post-season); everything else
/// falls back to the feed week or the calendar date, and post-season dates
/// without a week are bowls.
pub fn classify_phase(game: &FeedGame, calendar: &Calendar) -> GamePhase {
    let name = game.name.to_lowercase();
    if is_championship_name(&game.name) {
        return GamePhase::NationalChampionship;
    }
    if name.contains("semifinal") {
        return GamePhase::PlayoffSemifinal;
    }
    if name.contains("quarterfinal") {
        return GamePhase::PlayoffQuarterfinal;
    }
    if name.contains("first round") {
        return GamePhase::PlayoffFirstRound;
    }

    let week = game
        .week
        .filter(|w| (1..=16).contains(w))
        .or_else(|| calendar.week_of(game.start_time.date_naive()));
    match week {
        Some(w) => GamePhase::RegularWeek(w),
        None => GamePhase::Bowl,
    }
}

/// Convert a completed feed game into a canonical [`GameResult`].
pub fn to_game_result(game: &FeedGame, calendar: &Calendar) -> Option<GameResult> {
    let (winner, loser, winner_score, loser_score) = game.winner_loser()?;
    Some(GameResult {
        game_id: game.id.clone(),
        phase: classify_phase(game, calendar),
        winner,
        loser,
        winner_score,
        loser_score,
        conference_game: game.conference_game,
        game_name: game.name.clone(),
        completed_at: game.completed_at.unwrap_or(game.start_time),
    })
}

/// Fetches games from the external feed and appends newly-completed ones to
/// the canonical game table, guarded by the ingestion lock so overlapping
/// scheduler ticks cannot insert duplicate rows.
pub struct IngestionPipeline<'a, F: ScoreFeed> {
    feed: &'a F,
    db: &'a Database,
}

impl<'a, F: ScoreFeed> IngestionPipeline<'a, F> {
    pub fn new(feed: &'a F, db: &'a Database) -> Self {
        IngestionPipeline { feed, db }
    }

    /// Run one ingestion pass at `now`.
    ///
    /// Feed outages degrade softly: the calendar falls back to the cached
    /// last-known-good copy, and an unavailable scoreboard ends the pass
    /// with zero insertions instead of an error. Only a held lock aborts.
    pub async fn ingest_completed(&self, now: DateTime<Utc>) -> Result<IngestReport, IngestError> {
        let token = format!("ingest-{}", now.timestamp_millis());
        match self
            .db
            .try_acquire_lock(INGEST_LOCK, &token, now, Duration::seconds(LOCK_TTL_SECS))?
        {
            LockState::Held { age_secs } => {
                return Err(IngestError::LockHeld {
                    lock: INGEST_LOCK.to_string(),
                    age_secs,
                })
            }
            LockState::Acquired | LockState::Stolen { .. } => {}
        }

        let result = self.ingest_locked().await;
        if let Err(e) = self.db.release_lock(INGEST_LOCK, &token) {
            warn!("failed to release {INGEST_LOCK} lock: {e}");
        }
        result
    }

    async fn ingest_locked(&self) -> Result<IngestReport, IngestError> {
        let mut report = IngestReport::default();

        let calendar = match self.feed.calendar().await {
            Ok(calendar) => {
                self.db.save_state(
                    CALENDAR_CACHE_KEY,
                    &serde_json::to_value(&calendar).map_err(anyhow::Error::from)?,
                )?;
                calendar
            }
            Err(e) => {
                warn!("calendar fetch failed ({e}); using cached copy");
                report.calendar_from_cache = true;
                match self.db.load_state(CALENDAR_CACHE_KEY)? {
                    Some(value) => serde_json::from_value(value).map_err(anyhow::Error::from)?,
                    None => {
                        warn!("no cached calendar available; continuing with an empty one");
                        Calendar::default()
                    }
                }
            }
        };

        let Some((start, end)) = calendar.season_range() else {
            warn!("calendar has no periods; nothing to ingest");
            return Ok(report);
        };

        let games = match self.feed.games_for_range(start, end).await {
            Ok(games) => games,
            Err(e) => {
                warn!("scoreboard fetch failed ({e}); continuing with no new games");
                report.feed_unavailable = true;
                return Ok(report);
            }
        };
        report.fetched = games.len();

        // Any school on a bowl schedule earns the appearance bonus, win or
        // lose, so participants are captured from scheduled games too.
        let mut participants = self.bowl_participants()?;
        for game in &games {
            if classify_phase(game, &calendar) == GamePhase::Bowl {
                participants.insert(game.home.school.clone());
                participants.insert(game.away.school.clone());
            }
        }
        self.db.save_state(
            BOWL_PARTICIPANTS_KEY,
            &serde_json::to_value(&participants).map_err(anyhow::Error::from)?,
        )?;

        for game in &games {
            if game.status != GameStatus::Completed {
                continue;
            }
            let Some(result) = to_game_result(game, &calendar) else {
                continue;
            };
            if self.db.record_game(&result)? {
                report.inserted += 1;
            } else {
                warn!("duplicate game id {} dropped during ingestion", result.game_id);
                report.duplicates += 1;
            }
        }

        info!(
            "ingestion pass: {} fetched, {} inserted, {} duplicates dropped",
            report.fetched, report.inserted, report.duplicates
        );
        Ok(report)
    }

    /// Schools seen on any bowl schedule so far.
    pub fn bowl_participants(&self) -> anyhow::Result<BTreeSet<String>> {
        match self.db.load_state(BOWL_PARTICIPANTS_KEY)? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => Ok(BTreeSet::new()),
        }
    }

    /// Pull current rankings and store the in-house CFP top-12 field. Must
    /// run before bowl scoring so post-season opponent bonuses see fresh
    /// seeds.
    pub async fn refresh_cfp_field(&self) -> Result<HashMap<String, u8>, IngestError> {
        let rankings = self.feed.rankings().await?;
        let field = cfp_top12_from_rankings(&rankings);
        self.db.set_cfp_field(&field)?;
        info!("CFP top-12 field refreshed ({} schools)", field.len());
        Ok(field)
    }
}
