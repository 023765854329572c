// Pure points computation: game facts + scoring rules -> per-period totals.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::config::ScoringRules;
use crate::scoring::period::{
    is_championship_name, GamePhase, GameResult, SeasonPeriod, CONFERENCE_CHAMPIONSHIP_WEEK,
};

/// Which ranking feeds the beat-ranked-opponent bonus.
///
/// Regular weeks use the live curated rank carried on the game result. Bowl
/// and playoff scoring uses the in-house CFP top-12 field instead — opponent
/// strength in the post-season reflects the authoritative in-house seeding,
/// not a possibly stale external feed. The asymmetry is intentional.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RankSource {
    Live,
    CfpTop12,
}

/// Read-only inputs to a scoring pass beyond the game table itself.
#[derive(Debug, Clone)]
pub struct ScoringContext<'a> {
    /// In-house CFP seeding, school -> seed 1..=12. Must be refreshed before
    /// bowl scoring runs.
    pub cfp_top12: &'a HashMap<String, u8>,
    /// Scraped Heisman winner, if decided.
    pub heisman_winner: Option<&'a str>,
    /// Weeks during which the school is rostered (the active window).
    /// Periods outside it render blank rather than zero.
    pub active_weeks: &'a BTreeSet<u8>,
    /// Schools appearing in any scheduled bowl game.
    pub bowl_participants: &'a BTreeSet<String>,
    /// Whether the season has reached the bowls/CFP stretch.
    pub postseason_reached: bool,
}

/// Compute one school's points for all 21 periods.
///
/// `None` means the period is outside the school's active roster window
/// (rendered blank); `Some(0)` means rostered but nothing earned. Pure: the
/// same immutable game set and rules always produce identical output.
pub fn compute_points(
    school: &str,
    games: &[GameResult],
    rules: &ScoringRules,
    ctx: &ScoringContext<'_>,
) -> BTreeMap<SeasonPeriod, Option<u32>> {
    let mut table = BTreeMap::new();
    for period in SeasonPeriod::all() {
        let value = if ctx.active_weeks.contains(&period.roster_week()) {
            Some(points_for_period(school, period, games, rules, ctx))
        } else {
            None
        };
        table.insert(period, value);
    }
    table
}

/// Sum of a points table, treating blanks as nothing earned.
pub fn season_total(table: &BTreeMap<SeasonPeriod, Option<u32>>) -> u32 {
    table.values().flatten().sum()
}

fn points_for_period(
    school: &str,
    period: SeasonPeriod,
    games: &[GameResult],
    rules: &ScoringRules,
    ctx: &ScoringContext<'_>,
) -> u32 {
    match period {
        SeasonPeriod::Week(CONFERENCE_CHAMPIONSHIP_WEEK) => {
            // Winner-take-all flat bonus; none of the regular bonuses apply.
            games
                .iter()
                .filter(|g| g.phase == GamePhase::RegularWeek(CONFERENCE_CHAMPIONSHIP_WEEK))
                .filter(|g| g.involves(school))
                .map(|g| {
                    if g.won_by(school) {
                        rules.conference_champ_win
                    } else {
                        rules.conference_champ_loss
                    }
                })
                .sum()
        }
        SeasonPeriod::Week(week) => games
            .iter()
            .filter(|g| g.phase == GamePhase::RegularWeek(week))
            .filter(|g| g.won_by(school))
            .map(|g| win_points(g, rules, RankSource::Live, ctx))
            .sum(),
        SeasonPeriod::BowlAppearance => {
            if ctx.postseason_reached && ctx.bowl_participants.contains(school) {
                rules.bowl_appearance
            } else {
                0
            }
        }
        SeasonPeriod::BowlScore => games
            .iter()
            .filter(|g| g.phase == GamePhase::Bowl)
            // A misclassified title game must not double-score here.
            .filter(|g| !is_championship_name(&g.game_name))
            .filter(|g| g.won_by(school))
            .map(|g| win_points(g, rules, RankSource::CfpTop12, ctx))
            .sum(),
        SeasonPeriod::Heisman => {
            if ctx.heisman_winner == Some(school) {
                rules.heisman_winner
            } else {
                0
            }
        }
        SeasonPeriod::Playoff => games
            .iter()
            .filter(|g| g.phase.is_playoff_round())
            .filter(|g| g.involves(school))
            .map(|g| playoff_round_points(school, g.phase, rules, ctx))
            .sum(),
        SeasonPeriod::Championship => match championship_game(games) {
            Some(game) if game.involves(school) => {
                if game.won_by(school) {
                    rules.championship_win
                } else {
                    rules.championship_loss
                }
            }
            _ => 0,
        },
    }
}

/// The standard win formula: base win points plus conference, margin,
/// shutout, and ranked-opponent bonuses.
fn win_points(
    game: &GameResult,
    rules: &ScoringRules,
    rank_source: RankSource,
    ctx: &ScoringContext<'_>,
) -> u32 {
    let mut points = rules.win;
    if game.conference_game {
        points += rules.conference_game;
    }
    // Strictly over 50: a 50-point game earns nothing here.
    if game.winner_score > 50 {
        points += rules.over_50;
    }
    if game.loser_score == 0 {
        points += rules.shutout;
    }
    points += match rank_source {
        RankSource::Live => match game.loser.rank {
            1..=10 => rules.opp_ranked_top10,
            11..=25 => rules.opp_ranked_top25,
            _ => 0,
        },
        RankSource::CfpTop12 => match ctx.cfp_top12.get(&game.loser.school).copied() {
            Some(seed) if (1..=10).contains(&seed) => rules.opp_ranked_top10,
            Some(seed) if (11..=12).contains(&seed) => rules.opp_ranked_top25,
            _ => 0,
        },
    };
    points
}

/// Appearance points for one playoff game. Seeds 1-4 skip the first round,
/// so their quarterfinal pays the first-round and quarterfinal tiers
/// combined.
fn playoff_round_points(
    school: &str,
    phase: GamePhase,
    rules: &ScoringRules,
    ctx: &ScoringContext<'_>,
) -> u32 {
    match phase {
        GamePhase::PlayoffFirstRound => rules.playoff_first,
        GamePhase::PlayoffQuarterfinal => {
            let seed = ctx.cfp_top12.get(school).copied().unwrap_or(0);
            if (1..=4).contains(&seed) {
                rules.playoff_first + rules.playoff_quarter
            } else {
                rules.playoff_quarter
            }
        }
        GamePhase::PlayoffSemifinal => rules.playoff_semi,
        _ => 0,
    }
}

/// Locate the national championship game: the chronologically last game
/// whose name matches the championship pattern. The feed's week label is
/// never trusted for this.
pub fn championship_game(games: &[GameResult]) -> Option<&GameResult> {
    games
        .iter()
        .filter(|g| is_championship_name(&g.game_name))
        .max_by_key(|g| g.completed_at)
}
