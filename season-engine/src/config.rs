// Configuration loading and parsing (config/season.toml).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::draft::order::DraftType;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled SeasonConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SeasonConfig {
    pub league: LeagueConfig,
    pub draft: DraftConfig,
    /// Season-wide final add/drop deadline. After this instant the roster
    /// grid is frozen for the rest of the season.
    pub final_add_drop: DateTime<Utc>,
    pub scoring: ScoringRules,
    pub prizes: PrizeConfig,
    pub feed: FeedConfig,
    pub db_path: String,
    pub data_paths: DataPaths,
}

// ---------------------------------------------------------------------------
// season.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire season.toml file.
#[derive(Debug, Clone, Deserialize)]
struct SeasonFile {
    league: LeagueSection,
    draft: DraftSection,
    deadlines: DeadlineSection,
    scoring: ScoringRules,
    prizes: PrizeConfig,
    feed: FeedConfig,
    database: DatabaseSection,
    data_paths: DataPaths,
}

#[derive(Debug, Clone, Deserialize)]
struct LeagueSection {
    name: String,
    num_teams: usize,
    schools_per_team: usize,
    max_school_selections: u32,
    max_times_school_per_team: u32,
    max_transactions: u32,
    #[serde(default)]
    admins: Vec<String>,
    /// Team name -> owner addresses. Optional until the league is seated.
    #[serde(default)]
    owners: HashMap<String, Vec<String>>,
}

/// League settings assembled from the `[league]` table.
#[derive(Debug, Clone)]
pub struct LeagueConfig {
    pub name: String,
    pub num_teams: usize,
    pub schools_per_team: usize,
    /// League-wide cap on how many times one school may be selected.
    pub max_school_selections: u32,
    /// Per-team cap on repeat selections of one school.
    pub max_times_school_per_team: u32,
    /// Per-team add/drop budget for the season.
    pub max_transactions: u32,
    pub admins: Vec<String>,
    pub owners: HashMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
struct DraftSection {
    draft_type: String,
    date: String,
    turn_seconds: u32,
}

/// Draft settings with the type and date parsed into typed values.
#[derive(Debug, Clone)]
pub struct DraftConfig {
    pub draft_type: DraftType,
    pub date: NaiveDate,
    /// Length of the per-pick countdown.
    pub turn_seconds: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct DeadlineSection {
    final_add_drop: String,
}

/// Point values for every scorable event. All values are non-negative by
/// construction (`u32`); the commissioner supplies them once at season setup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringRules {
    pub win: u32,
    pub conference_game: u32,
    pub over_50: u32,
    pub shutout: u32,
    pub opp_ranked_top10: u32,
    pub opp_ranked_top25: u32,
    pub conference_champ_win: u32,
    pub conference_champ_loss: u32,
    pub heisman_winner: u32,
    pub bowl_appearance: u32,
    pub playoff_first: u32,
    pub playoff_quarter: u32,
    pub playoff_semi: u32,
    pub championship_win: u32,
    pub championship_loss: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PrizeConfig {
    /// How many season prize positions are paid (1-3).
    pub num_winners: u8,
    pub first_cents: u64,
    pub second_cents: u64,
    pub third_cents: u64,
    /// Flat weekly high-points prize. 0 disables the feature.
    #[serde(default)]
    pub weekly_cents: u64,
    /// Whether tied weekly leaders split the weekly prize (vs nobody paid).
    #[serde(default)]
    pub split_weekly_ties: bool,
    #[serde(default = "default_weekly_start")]
    pub weekly_start_week: u8,
    #[serde(default = "default_weekly_end")]
    pub weekly_end_week: u8,
}

fn default_weekly_start() -> u8 {
    1
}

fn default_weekly_end() -> u8 {
    14
}

impl PrizeConfig {
    /// Season prize amounts in payout order.
    pub fn season_prizes(&self) -> [u64; 3] {
        [self.first_cents, self.second_cents, self.third_cents]
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataPaths {
    pub schools: String,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/season.toml` relative to the
/// given `base_dir`.
pub fn load_config_from(base_dir: &Path) -> Result<SeasonConfig, ConfigError> {
    let season_path = base_dir.join("config").join("season.toml");
    let season_text = read_file(&season_path)?;
    let season_file: SeasonFile =
        toml::from_str(&season_text).map_err(|e| ConfigError::ParseError {
            path: season_path.clone(),
            source: e,
        })?;

    assemble(season_file)
}

/// Convenience wrapper: loads config relative to the current working directory.
pub fn load_config() -> Result<SeasonConfig, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    load_config_from(&cwd)
}

/// Assemble the raw file structs into a validated [`SeasonConfig`].
fn assemble(file: SeasonFile) -> Result<SeasonConfig, ConfigError> {
    let draft_type =
        DraftType::parse(&file.draft.draft_type).ok_or_else(|| ConfigError::ValidationError {
            field: "draft.draft_type".into(),
            message: format!(
                "must be \"linear\" or \"snake\", got \"{}\"",
                file.draft.draft_type
            ),
        })?;

    let draft_date = NaiveDate::parse_from_str(&file.draft.date, "%Y-%m-%d").map_err(|e| {
        ConfigError::ValidationError {
            field: "draft.date".into(),
            message: format!("expected YYYY-MM-DD, got \"{}\": {e}", file.draft.date),
        }
    })?;

    let final_add_drop = DateTime::parse_from_rfc3339(&file.deadlines.final_add_drop)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| ConfigError::ValidationError {
            field: "deadlines.final_add_drop".into(),
            message: format!(
                "expected RFC 3339 timestamp, got \"{}\": {e}",
                file.deadlines.final_add_drop
            ),
        })?;

    let config = SeasonConfig {
        league: LeagueConfig {
            name: file.league.name,
            num_teams: file.league.num_teams,
            schools_per_team: file.league.schools_per_team,
            max_school_selections: file.league.max_school_selections,
            max_times_school_per_team: file.league.max_times_school_per_team,
            max_transactions: file.league.max_transactions,
            admins: file.league.admins,
            owners: file.league.owners,
        },
        draft: DraftConfig {
            draft_type,
            date: draft_date,
            turn_seconds: file.draft.turn_seconds,
        },
        final_add_drop,
        scoring: file.scoring,
        prizes: file.prizes,
        feed: file.feed,
        db_path: file.database.path,
        data_paths: file.data_paths,
    };

    validate(&config)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &SeasonConfig) -> Result<(), ConfigError> {
    if config.league.num_teams == 0 {
        return Err(ConfigError::ValidationError {
            field: "league.num_teams".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.league.schools_per_team == 0 {
        return Err(ConfigError::ValidationError {
            field: "league.schools_per_team".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.league.max_school_selections == 0 {
        return Err(ConfigError::ValidationError {
            field: "league.max_school_selections".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.league.max_times_school_per_team == 0
        || config.league.max_times_school_per_team as usize > config.league.schools_per_team
    {
        return Err(ConfigError::ValidationError {
            field: "league.max_times_school_per_team".into(),
            message: format!(
                "must be between 1 and schools_per_team ({}), got {}",
                config.league.schools_per_team, config.league.max_times_school_per_team
            ),
        });
    }

    // Owner lists, when provided, must not be empty: an unowned team could
    // never submit a transaction.
    for (team, owners) in &config.league.owners {
        if owners.is_empty() {
            return Err(ConfigError::ValidationError {
                field: format!("league.owners.{team}"),
                message: "owner list must not be empty".into(),
            });
        }
    }

    if config.draft.turn_seconds == 0 {
        return Err(ConfigError::ValidationError {
            field: "draft.turn_seconds".into(),
            message: "must be greater than 0".into(),
        });
    }

    if !(1..=3).contains(&config.prizes.num_winners) {
        return Err(ConfigError::ValidationError {
            field: "prizes.num_winners".into(),
            message: format!("must be between 1 and 3, got {}", config.prizes.num_winners),
        });
    }

    let (start, end) = (
        config.prizes.weekly_start_week,
        config.prizes.weekly_end_week,
    );
    if start == 0 || end > 16 || start > end {
        return Err(ConfigError::ValidationError {
            field: "prizes.weekly_start_week".into(),
            message: format!("weekly prize window must satisfy 1 <= start <= end <= 16, got {start}..={end}"),
        });
    }

    if config.feed.base_url.is_empty() {
        return Err(ConfigError::ValidationError {
            field: "feed.base_url".into(),
            message: "must not be empty".into(),
        });
    }

    if config.feed.timeout_secs == 0 {
        return Err(ConfigError::ValidationError {
            field: "feed.timeout_secs".into(),
            message: "must be greater than 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
