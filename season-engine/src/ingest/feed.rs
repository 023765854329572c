// External score feed: wire types, client trait, and the HTTP implementation.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::config::FeedConfig;
use crate::scoring::period::TeamSide;

/// Retry policy for feed calls: 3 attempts, 1 s base delay, doubling.
pub const MAX_ATTEMPTS: u32 = 3;
pub const BASE_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("score feed request to {url} failed after {attempts} attempt(s): {message}")]
    Unavailable {
        url: String,
        attempts: u32,
        message: String,
    },
}

/// One labeled span of the season calendar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarPeriod {
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// The feed's season calendar. The first 16 periods are weeks 1-16; any
/// later periods cover the post-season.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    pub periods: Vec<CalendarPeriod>,
}

impl Calendar {
    /// The regular-season week containing `date`, if any. Dates falling in
    /// post-season periods (index 16+) are not weeks.
    pub fn week_of(&self, date: NaiveDate) -> Option<u8> {
        self.periods
            .iter()
            .position(|p| p.start <= date && date <= p.end)
            .filter(|&idx| idx < 16)
            .map(|idx| idx as u8 + 1)
    }

    /// First and last calendar dates of the season.
    pub fn season_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        let start = self.periods.iter().map(|p| p.start).min()?;
        let end = self.periods.iter().map(|p| p.end).max()?;
        Some((start, end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    Scheduled,
    Live,
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedTeam {
    pub school: String,
    /// Curated live rank, 0 = unranked.
    #[serde(default)]
    pub rank: u8,
}

/// A game as reported by the feed. A game transitions
/// scheduled -> live -> completed exactly once; only completed games carry
/// final scores the engine can use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedGame {
    pub id: String,
    pub status: GameStatus,
    /// Week label from the feed, when it supplies one. Unreliable for the
    /// post-season; classification falls back to calendar dates.
    #[serde(default)]
    pub week: Option<u8>,
    /// Bowl or game name, empty for ordinary games.
    #[serde(default)]
    pub name: String,
    pub home: FeedTeam,
    pub away: FeedTeam,
    #[serde(default)]
    pub home_score: u32,
    #[serde(default)]
    pub away_score: u32,
    #[serde(default)]
    pub conference_game: bool,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl FeedGame {
    /// Winner and loser sides with their scores, for completed games with a
    /// decisive score. Returns `None` for scheduled/live games (and for a
    /// tied score, which the sport does not produce).
    pub fn winner_loser(&self) -> Option<(TeamSide, TeamSide, u32, u32)> {
        if self.status != GameStatus::Completed || self.home_score == self.away_score {
            return None;
        }
        let home = TeamSide::new(self.home.school.clone(), self.home.rank);
        let away = TeamSide::new(self.away.school.clone(), self.away.rank);
        if self.home_score > self.away_score {
            Some((home, away, self.home_score, self.away_score))
        } else {
            Some((away, home, self.away_score, self.home_score))
        }
    }
}

/// Client seam for the external score feed.
#[async_trait]
pub trait ScoreFeed: Send + Sync {
    async fn calendar(&self) -> Result<Calendar, FeedError>;

    async fn games_for_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FeedGame>, FeedError>;

    /// Batched game refresh. Preserves request order and deduplicates ids.
    async fn game_updates(&self, ids: &[String]) -> Result<Vec<FeedGame>, FeedError>;

    /// Current curated rankings as (rank, school) pairs.
    async fn rankings(&self) -> Result<Vec<(u8, String)>, FeedError>;
}

/// Drop repeated ids while keeping first-seen order.
pub fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

#[derive(Debug, Deserialize)]
struct RankingsResponse {
    ranks: Vec<RankEntry>,
}

#[derive(Debug, Deserialize)]
struct RankEntry {
    rank: u8,
    school: String,
}

/// HTTP implementation of [`ScoreFeed`] with retry and exponential backoff.
pub struct HttpScoreFeed {
    http: reqwest::Client,
    base_url: String,
}

impl HttpScoreFeed {
    pub fn new(config: &FeedConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(HttpScoreFeed {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// GET `base_url/path` and decode JSON, retrying transient failures
    /// (network errors, non-200 statuses, malformed bodies) with doubling
    /// backoff. The overall per-request timeout comes from the client.
    async fn fetch_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, FeedError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut last_error = String::new();

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                tokio::time::sleep(BASE_DELAY * 2u32.pow(attempt - 1)).await;
            }
            match self.http.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    match response.json::<T>().await {
                        Ok(value) => return Ok(value),
                        Err(e) => {
                            last_error = format!("malformed JSON: {e}");
                            warn!("feed response from {url} unparseable (attempt {}): {e}", attempt + 1);
                        }
                    }
                }
                Ok(response) => {
                    last_error = format!("HTTP {}", response.status());
                    warn!("feed returned {} for {url} (attempt {})", response.status(), attempt + 1);
                }
                Err(e) => {
                    last_error = e.to_string();
                    warn!("feed request to {url} failed (attempt {}): {e}", attempt + 1);
                }
            }
        }

        Err(FeedError::Unavailable {
            url,
            attempts: MAX_ATTEMPTS,
            message: last_error,
        })
    }
}

#[async_trait]
impl ScoreFeed for HttpScoreFeed {
    async fn calendar(&self) -> Result<Calendar, FeedError> {
        self.fetch_json("calendar").await
    }

    async fn games_for_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<FeedGame>, FeedError> {
        self.fetch_json(&format!("scoreboard?start={start}&end={end}")).await
    }

    async fn game_updates(&self, ids: &[String]) -> Result<Vec<FeedGame>, FeedError> {
        let wanted = dedup_ids(ids);
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        let fetched: Vec<FeedGame> = self
            .fetch_json(&format!("games?ids={}", wanted.join(",")))
            .await?;

        // The feed does not guarantee order; re-emit in request order.
        let mut by_id: std::collections::HashMap<String, FeedGame> = fetched
            .into_iter()
            .map(|g| (g.id.clone(), g))
            .collect();
        Ok(wanted.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    async fn rankings(&self) -> Result<Vec<(u8, String)>, FeedError> {
        let response: RankingsResponse = self.fetch_json("rankings").await?;
        Ok(response
            .ranks
            .into_iter()
            .map(|entry| (entry.rank, entry.school))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// A 16-week calendar starting 2026-08-31 plus one post-season span.
    fn calendar() -> Calendar {
        let mut periods = Vec::new();
        for week in 0u32..16 {
            let start = date(2026, 8, 31) + chrono::Duration::days(7 * week as i64);
            periods.push(CalendarPeriod {
                label: format!("Week {}", week + 1),
                start,
                end: start + chrono::Duration::days(6),
            });
        }
        periods.push(CalendarPeriod {
            label: "Postseason".to_string(),
            start: date(2026, 12, 19),
            end: date(2027, 1, 31),
        });
        Calendar { periods }
    }

    #[test]
    fn week_of_maps_dates_to_weeks() {
        let cal = calendar();
        assert_eq!(cal.week_of(date(2026, 8, 31)), Some(1));
        assert_eq!(cal.week_of(date(2026, 9, 6)), Some(1));
        assert_eq!(cal.week_of(date(2026, 9, 7)), Some(2));
        // Post-season dates are not weeks.
        assert_eq!(cal.week_of(date(2027, 1, 1)), None);
        // Outside the season entirely.
        assert_eq!(cal.week_of(date(2026, 6, 1)), None);
    }

    #[test]
    fn season_range_spans_all_periods() {
        let cal = calendar();
        let (start, end) = cal.season_range().unwrap();
        assert_eq!(start, date(2026, 8, 31));
        assert_eq!(end, date(2027, 1, 31));
        assert!(Calendar::default().season_range().is_none());
    }

    #[test]
    fn winner_loser_resolves_sides() {
        let game = FeedGame {
            id: "g1".to_string(),
            status: GameStatus::Completed,
            week: Some(3),
            name: String::new(),
            home: FeedTeam {
                school: "Michigan".to_string(),
                rank: 5,
            },
            away: FeedTeam {
                school: "Ohio State".to_string(),
                rank: 2,
            },
            home_score: 21,
            away_score: 24,
            conference_game: true,
            start_time: Utc.with_ymd_and_hms(2026, 9, 12, 19, 0, 0).unwrap(),
            completed_at: Some(Utc.with_ymd_and_hms(2026, 9, 12, 22, 30, 0).unwrap()),
        };
        let (winner, loser, winner_score, loser_score) = game.winner_loser().unwrap();
        assert_eq!(winner.school, "Ohio State");
        assert_eq!(winner.rank, 2);
        assert_eq!(loser.school, "Michigan");
        assert_eq!(winner_score, 24);
        assert_eq!(loser_score, 21);
    }

    #[test]
    fn winner_loser_none_for_unfinished_games() {
        let mut game = FeedGame {
            id: "g1".to_string(),
            status: GameStatus::Scheduled,
            week: None,
            name: String::new(),
            home: FeedTeam {
                school: "A".to_string(),
                rank: 0,
            },
            away: FeedTeam {
                school: "B".to_string(),
                rank: 0,
            },
            home_score: 0,
            away_score: 0,
            conference_game: false,
            start_time: Utc.with_ymd_and_hms(2026, 9, 12, 19, 0, 0).unwrap(),
            completed_at: None,
        };
        assert!(game.winner_loser().is_none());

        game.status = GameStatus::Live;
        game.home_score = 14;
        assert!(game.winner_loser().is_none());
    }

    #[test]
    fn dedup_ids_keeps_first_seen_order() {
        let ids: Vec<String> = ["c", "a", "c", "b", "a"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(dedup_ids(&ids), vec!["c", "a", "b"]);
        assert!(dedup_ids(&[]).is_empty());
    }

    #[test]
    fn feed_game_deserializes_with_defaults() {
        let json = r#"{
            "id": "401520281",
            "status": "completed",
            "home": {"school": "Georgia"},
            "away": {"school": "Alabama", "rank": 4},
            "home_score": 27,
            "away_score": 24,
            "start_time": "2026-12-05T20:00:00Z"
        }"#;
        let game: FeedGame = serde_json::from_str(json).unwrap();
        assert_eq!(game.status, GameStatus::Completed);
        assert_eq!(game.week, None);
        assert_eq!(game.home.rank, 0);
        assert_eq!(game.away.rank, 4);
        assert!(!game.conference_game);
        assert!(game.completed_at.is_none());
    }
}
