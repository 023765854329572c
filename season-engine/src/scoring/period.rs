// Season timeline: scoring periods, game phases, and game results.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The week of the conference championship round.
pub const CONFERENCE_CHAMPIONSHIP_WEEK: u8 = 15;

/// The last week for which the roster grid has entries. Post-season periods
/// collapse back to this week for roster lookups.
pub const LAST_ROSTER_WEEK: u8 = 16;

/// Total number of scoring periods in a season.
pub const PERIOD_COUNT: usize = 21;

/// One of the 21 ordered scoring buckets of a season.
///
/// Weeks 1-16 are calendar-ordered; week 15 is the conference championship
/// round. The five post-season buckets occupy indices 17-21: bowl
/// appearances, bowl score results, the Heisman award, playoff-round
/// appearances, and the national championship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeasonPeriod {
    /// Regular-season week 1..=16.
    Week(u8),
    /// Flat points for appearing in any scheduled bowl game.
    BowlAppearance,
    /// Win/loss scoring of completed bowl games.
    BowlScore,
    /// The Heisman trophy bucket (stored at a fixed slot, not date-ordered).
    Heisman,
    /// Playoff-round appearance points.
    Playoff,
    /// The national championship game.
    Championship,
}

impl SeasonPeriod {
    /// 1-based index of this period on the 21-slot timeline.
    pub fn index(&self) -> u8 {
        match self {
            SeasonPeriod::Week(w) => *w,
            SeasonPeriod::BowlAppearance => 17,
            SeasonPeriod::BowlScore => 18,
            SeasonPeriod::Heisman => 19,
            SeasonPeriod::Playoff => 20,
            SeasonPeriod::Championship => 21,
        }
    }

    /// Inverse of [`index`](Self::index). Returns `None` outside 1..=21.
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            1..=16 => Some(SeasonPeriod::Week(index)),
            17 => Some(SeasonPeriod::BowlAppearance),
            18 => Some(SeasonPeriod::BowlScore),
            19 => Some(SeasonPeriod::Heisman),
            20 => Some(SeasonPeriod::Playoff),
            21 => Some(SeasonPeriod::Championship),
            _ => None,
        }
    }

    /// The roster week this period reads from. The roster grid only has
    /// entries for weeks 1-16, so indices 17-21 collapse to week 16.
    pub fn roster_week(&self) -> u8 {
        match self {
            SeasonPeriod::Week(w) => *w,
            _ => LAST_ROSTER_WEEK,
        }
    }

    /// Whether this is the conference championship round (week 15).
    pub fn is_conference_championship(&self) -> bool {
        matches!(self, SeasonPeriod::Week(CONFERENCE_CHAMPIONSHIP_WEEK))
    }

    /// All 21 periods in timeline order.
    pub fn all() -> Vec<SeasonPeriod> {
        (1..=PERIOD_COUNT as u8)
            .filter_map(SeasonPeriod::from_index)
            .collect()
    }
}

impl PartialOrd for SeasonPeriod {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SeasonPeriod {
    fn cmp(&self, other: &Self) -> Ordering {
        self.index().cmp(&other.index())
    }
}

impl fmt::Display for SeasonPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeasonPeriod::Week(w) => write!(f, "Week {w}"),
            SeasonPeriod::BowlAppearance => write!(f, "Bowls"),
            SeasonPeriod::BowlScore => write!(f, "Bowl Scores"),
            SeasonPeriod::Heisman => write!(f, "Heisman"),
            SeasonPeriod::Playoff => write!(f, "Playoffs"),
            SeasonPeriod::Championship => write!(f, "National Championship"),
        }
    }
}

/// Classification of a single game on the season schedule.
///
/// Distinct from [`SeasonPeriod`]: a game has exactly one phase, while one
/// phase can feed several scoring buckets (a bowl game feeds both the
/// appearance and score buckets).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GamePhase {
    /// Regular-season game in week 1..=16 (15 = conference championships).
    RegularWeek(u8),
    /// Post-season bowl game outside the playoff bracket.
    Bowl,
    PlayoffFirstRound,
    PlayoffQuarterfinal,
    PlayoffSemifinal,
    NationalChampionship,
}

impl GamePhase {
    /// Stable string label for database round-trips.
    pub fn as_label(&self) -> String {
        match self {
            GamePhase::RegularWeek(w) => format!("week:{w}"),
            GamePhase::Bowl => "bowl".to_string(),
            GamePhase::PlayoffFirstRound => "playoff:first".to_string(),
            GamePhase::PlayoffQuarterfinal => "playoff:quarter".to_string(),
            GamePhase::PlayoffSemifinal => "playoff:semi".to_string(),
            GamePhase::NationalChampionship => "championship".to_string(),
        }
    }

    /// Parse a label produced by [`as_label`](Self::as_label).
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "bowl" => Some(GamePhase::Bowl),
            "playoff:first" => Some(GamePhase::PlayoffFirstRound),
            "playoff:quarter" => Some(GamePhase::PlayoffQuarterfinal),
            "playoff:semi" => Some(GamePhase::PlayoffSemifinal),
            "championship" => Some(GamePhase::NationalChampionship),
            other => {
                let week = other.strip_prefix("week:")?.parse::<u8>().ok()?;
                (1..=LAST_ROSTER_WEEK).contains(&week).then_some(GamePhase::RegularWeek(week))
            }
        }
    }

    /// Whether this phase belongs to the playoff bracket (championship
    /// excluded; it is scored separately).
    pub fn is_playoff_round(&self) -> bool {
        matches!(
            self,
            GamePhase::PlayoffFirstRound
                | GamePhase::PlayoffQuarterfinal
                | GamePhase::PlayoffSemifinal
        )
    }
}

/// One side of a game result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamSide {
    /// School name, matching the registry.
    pub school: String,
    /// Curated live ranking at game time. 0 = unranked.
    #[serde(default)]
    pub rank: u8,
}

impl TeamSide {
    pub fn new(school: impl Into<String>, rank: u8) -> Self {
        TeamSide {
            school: school.into(),
            rank,
        }
    }

    pub fn unranked(school: impl Into<String>) -> Self {
        TeamSide::new(school, 0)
    }
}

/// A completed game as stored in the canonical game table.
///
/// Immutable once recorded; `game_id` is globally unique and duplicates are
/// dropped at ingestion time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResult {
    pub game_id: String,
    pub phase: GamePhase,
    pub winner: TeamSide,
    pub loser: TeamSide,
    pub winner_score: u32,
    pub loser_score: u32,
    pub conference_game: bool,
    /// Bowl or game name as reported by the feed (e.g. "Rose Bowl").
    pub game_name: String,
    pub completed_at: DateTime<Utc>,
}

impl GameResult {
    /// Whether the given school played in this game.
    pub fn involves(&self, school: &str) -> bool {
        self.winner.school == school || self.loser.school == school
    }

    /// Whether the given school won this game.
    pub fn won_by(&self, school: &str) -> bool {
        self.winner.school == school
    }
}

/// Whether a game name identifies the national championship.
///
/// The championship is located by name pattern plus latest completion time,
/// never by the feed's week label, which has been observed to misclassify
/// the title game.
pub fn is_championship_name(name: &str) -> bool {
    name.to_lowercase().contains("national championship")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn period_indices_cover_all_21_slots() {
        let all = SeasonPeriod::all();
        assert_eq!(all.len(), PERIOD_COUNT);
        for (i, period) in all.iter().enumerate() {
            assert_eq!(period.index() as usize, i + 1);
            assert_eq!(SeasonPeriod::from_index(period.index()), Some(*period));
        }
    }

    #[test]
    fn from_index_rejects_out_of_range() {
        assert_eq!(SeasonPeriod::from_index(0), None);
        assert_eq!(SeasonPeriod::from_index(22), None);
    }

    #[test]
    fn periods_order_by_index() {
        assert!(SeasonPeriod::Week(1) < SeasonPeriod::Week(14));
        assert!(SeasonPeriod::Week(16) < SeasonPeriod::BowlAppearance);
        assert!(SeasonPeriod::BowlAppearance < SeasonPeriod::BowlScore);
        assert!(SeasonPeriod::Heisman < SeasonPeriod::Playoff);
        assert!(SeasonPeriod::Playoff < SeasonPeriod::Championship);
    }

    #[test]
    fn post_season_periods_collapse_to_week_16() {
        assert_eq!(SeasonPeriod::Week(3).roster_week(), 3);
        assert_eq!(SeasonPeriod::Week(16).roster_week(), 16);
        assert_eq!(SeasonPeriod::BowlAppearance.roster_week(), 16);
        assert_eq!(SeasonPeriod::BowlScore.roster_week(), 16);
        assert_eq!(SeasonPeriod::Heisman.roster_week(), 16);
        assert_eq!(SeasonPeriod::Playoff.roster_week(), 16);
        assert_eq!(SeasonPeriod::Championship.roster_week(), 16);
    }

    #[test]
    fn week_15_is_conference_championship() {
        assert!(SeasonPeriod::Week(15).is_conference_championship());
        assert!(!SeasonPeriod::Week(14).is_conference_championship());
        assert!(!SeasonPeriod::BowlScore.is_conference_championship());
    }

    #[test]
    fn phase_label_round_trip() {
        let phases = [
            GamePhase::RegularWeek(1),
            GamePhase::RegularWeek(15),
            GamePhase::RegularWeek(16),
            GamePhase::Bowl,
            GamePhase::PlayoffFirstRound,
            GamePhase::PlayoffQuarterfinal,
            GamePhase::PlayoffSemifinal,
            GamePhase::NationalChampionship,
        ];
        for phase in phases {
            let label = phase.as_label();
            assert_eq!(GamePhase::from_label(&label), Some(phase), "label {label}");
        }
    }

    #[test]
    fn phase_label_rejects_garbage() {
        assert_eq!(GamePhase::from_label("week:0"), None);
        assert_eq!(GamePhase::from_label("week:17"), None);
        assert_eq!(GamePhase::from_label("week:abc"), None);
        assert_eq!(GamePhase::from_label("halftime"), None);
    }

    #[test]
    fn is_playoff_round_excludes_championship() {
        assert!(GamePhase::PlayoffFirstRound.is_playoff_round());
        assert!(GamePhase::PlayoffQuarterfinal.is_playoff_round());
        assert!(GamePhase::PlayoffSemifinal.is_playoff_round());
        assert!(!GamePhase::NationalChampionship.is_playoff_round());
        assert!(!GamePhase::Bowl.is_playoff_round());
    }

    #[test]
    fn game_result_involvement() {
        let game = GameResult {
            game_id: "g1".into(),
            phase: GamePhase::RegularWeek(1),
            winner: TeamSide::new("Michigan", 4),
            loser: TeamSide::unranked("Rutgers"),
            winner_score: 35,
            loser_score: 7,
            conference_game: true,
            game_name: String::new(),
            completed_at: Utc.with_ymd_and_hms(2026, 9, 5, 23, 0, 0).unwrap(),
        };
        assert!(game.involves("Michigan"));
        assert!(game.involves("Rutgers"));
        assert!(!game.involves("Ohio State"));
        assert!(game.won_by("Michigan"));
        assert!(!game.won_by("Rutgers"));
    }

    #[test]
    fn championship_name_matching_is_case_insensitive() {
        assert!(is_championship_name("CFP National Championship"));
        assert!(is_championship_name("college football national championship game"));
        assert!(!is_championship_name("Rose Bowl"));
        assert!(!is_championship_name("CFP Semifinal"));
    }
}
