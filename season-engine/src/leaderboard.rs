// Team standings, competition ranking, and prize-money distribution.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::config::PrizeConfig;
use crate::roster::RosterStore;
use crate::scoring::period::SeasonPeriod;

/// One team's derived standing. Recomputed each scoring pass, never
/// hand-edited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamStanding {
    pub team: String,
    pub period_totals: BTreeMap<SeasonPeriod, u32>,
    pub season_total: u32,
    /// 1-based competition rank (ties share the same rank).
    pub rank: u32,
    pub prize_cents: u64,
}

/// One row of a per-period ranking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeriodRank {
    pub team: String,
    pub points: u32,
    pub rank: u32,
}

/// Sum each team's rostered schools' points per period.
///
/// A school contributes to a team's period total only while it sits on that
/// team's roster for that period (roster-at-that-period, so mid-season swaps
/// shift which schools count from the swap week onward). Blank school
/// periods contribute nothing.
pub fn team_period_totals(
    roster: &RosterStore,
    school_points: &HashMap<String, BTreeMap<SeasonPeriod, Option<u32>>>,
) -> BTreeMap<String, BTreeMap<SeasonPeriod, u32>> {
    let mut totals = BTreeMap::new();
    for team in roster.teams() {
        let mut period_totals = BTreeMap::new();
        for period in SeasonPeriod::all() {
            let mut sum = 0u32;
            if let Some(slots) = roster.roster_for_period(team, period) {
                for school in slots.iter().flatten() {
                    sum += school_points
                        .get(school)
                        .and_then(|table| table.get(&period).copied().flatten())
                        .unwrap_or(0);
                }
            }
            period_totals.insert(period, sum);
        }
        totals.insert(team.clone(), period_totals);
    }
    totals
}

/// Rank teams by descending season total with standard competition ranking:
/// tied teams share a rank and the next distinct total skips past them.
pub fn rank_teams(
    totals: &BTreeMap<String, BTreeMap<SeasonPeriod, u32>>,
) -> Vec<TeamStanding> {
    let mut standings: Vec<TeamStanding> = totals
        .iter()
        .map(|(team, period_totals)| TeamStanding {
            team: team.clone(),
            period_totals: period_totals.clone(),
            season_total: period_totals.values().sum(),
            rank: 0,
            prize_cents: 0,
        })
        .collect();

    standings.sort_by(|a, b| {
        b.season_total
            .cmp(&a.season_total)
            .then_with(|| a.team.cmp(&b.team))
    });

    let mut i = 0;
    while i < standings.len() {
        let total = standings[i].season_total;
        let rank = i as u32 + 1;
        let mut j = i;
        while j < standings.len() && standings[j].season_total == total {
            standings[j].rank = rank;
            j += 1;
        }
        i = j;
    }
    standings
}

/// Competition ranking of one scoring period.
pub fn period_rankings(standings: &[TeamStanding], period: SeasonPeriod) -> Vec<PeriodRank> {
    let mut rows: Vec<PeriodRank> = standings
        .iter()
        .map(|s| PeriodRank {
            team: s.team.clone(),
            points: s.period_totals.get(&period).copied().unwrap_or(0),
            rank: 0,
        })
        .collect();
    rows.sort_by(|a, b| b.points.cmp(&a.points).then_with(|| a.team.cmp(&b.team)));

    let mut i = 0;
    while i < rows.len() {
        let points = rows[i].points;
        let rank = i as u32 + 1;
        let mut j = i;
        while j < rows.len() && rows[j].points == points {
            rows[j].rank = rank;
            j += 1;
        }
        i = j;
    }
    rows
}

/// Distribute season prize money over ranked standings with tie-pooling.
///
/// Walking distinct ranks in order: when several teams tie, the prize money
/// for as many positions as there are tied teams (capped at `num_winners`)
/// is pooled and split evenly; leftover winner slots continue at the next
/// distinct rank. Remainder cents from the even split go to the earliest
/// teams in standings order.
pub fn distribute_prizes(standings: &mut [TeamStanding], prizes: &PrizeConfig) {
    let table = prizes.season_prizes();
    let num_winners = prizes.num_winners as usize;
    let mut remaining = num_winners;
    let mut cursor = 0usize;

    let mut i = 0;
    while i < standings.len() && remaining > 0 {
        let total = standings[i].season_total;
        let mut j = i;
        while j < standings.len() && standings[j].season_total == total {
            j += 1;
        }
        let tied = j - i;
        let positions = tied.min(remaining);

        let mut pool: u64 = 0;
        for position in cursor..cursor + positions {
            if position < num_winners && position < table.len() {
                pool += table[position];
            }
        }

        let share = pool / tied as u64;
        let mut remainder = pool % tied as u64;
        for standing in &mut standings[i..j] {
            standing.prize_cents = share
                + if remainder > 0 {
                    remainder -= 1;
                    1
                } else {
                    0
                };
        }

        remaining -= positions;
        cursor += tied;
        i = j;
    }
}

/// Weekly high-points payouts for the configured week window.
///
/// Each week's single top team receives the flat weekly amount; when
/// configured to split, tied leaders divide it evenly, otherwise a tied week
/// pays nobody. Returns week -> (team, cents) payouts; empty when the
/// feature is disabled.
pub fn weekly_high_points(
    standings: &[TeamStanding],
    prizes: &PrizeConfig,
) -> BTreeMap<u8, Vec<(String, u64)>> {
    let mut payouts = BTreeMap::new();
    if prizes.weekly_cents == 0 {
        return payouts;
    }

    for week in prizes.weekly_start_week..=prizes.weekly_end_week {
        let period = SeasonPeriod::Week(week);
        let top = standings
            .iter()
            .map(|s| s.period_totals.get(&period).copied().unwrap_or(0))
            .max()
            .unwrap_or(0);
        if top == 0 {
            continue;
        }

        let leaders: Vec<&TeamStanding> = standings
            .iter()
            .filter(|s| s.period_totals.get(&period).copied().unwrap_or(0) == top)
            .collect();

        if leaders.len() == 1 {
            payouts.insert(week, vec![(leaders[0].team.clone(), prizes.weekly_cents)]);
        } else if prizes.split_weekly_ties {
            let share = prizes.weekly_cents / leaders.len() as u64;
            let mut remainder = prizes.weekly_cents % leaders.len() as u64;
            let split = leaders
                .iter()
                .map(|s| {
                    let extra = if remainder > 0 {
                        remainder -= 1;
                        1
                    } else {
                        0
                    };
                    (s.team.clone(), share + extra)
                })
                .collect();
            payouts.insert(week, split);
        }
    }
    payouts
}

/// Reduce a full external ranking list to the in-house CFP top-12 field.
pub fn cfp_top12_from_rankings(rankings: &[(u8, String)]) -> HashMap<String, u8> {
    rankings
        .iter()
        .filter(|(rank, _)| (1..=12).contains(rank))
        .map(|(rank, school)| (school.clone(), *rank))
        .collect()
}
