// Authoritative roster grid: (team, week) -> ordered school slots.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::scoring::period::{SeasonPeriod, LAST_ROSTER_WEEK};

pub const FIRST_WEEK: u8 = 1;

/// One persisted cell of the roster grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterRow {
    pub team: String,
    pub week: u8,
    pub slot: usize,
    pub school: Option<String>,
}

/// The authoritative mapping of (team, week) to ordered school slots for
/// weeks 1-16. Built once from the completed draft and mutated only by
/// validated swaps, which propagate forward from the active week.
///
/// Post-season scoring periods read week 16 via
/// [`SeasonPeriod::roster_week`] — the grid itself never grows past week 16.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterStore {
    teams: Vec<String>,
    slots_per_team: usize,
    grid: HashMap<(String, u8), Vec<Option<String>>>,
}

impl RosterStore {
    /// An all-empty grid for the given teams.
    pub fn empty(teams: Vec<String>, slots_per_team: usize) -> Self {
        let mut grid = HashMap::new();
        for team in &teams {
            for week in FIRST_WEEK..=LAST_ROSTER_WEEK {
                grid.insert((team.clone(), week), vec![None; slots_per_team]);
            }
        }
        RosterStore {
            teams,
            slots_per_team,
            grid,
        }
    }

    /// Materialize the grid from completed draft assignments: each team's
    /// drafted slots are copied into every week 1-16.
    pub fn from_draft(assignments: Vec<(String, Vec<Option<String>>)>) -> Self {
        let slots_per_team = assignments
            .first()
            .map(|(_, slots)| slots.len())
            .unwrap_or(0);
        let teams: Vec<String> = assignments.iter().map(|(t, _)| t.clone()).collect();

        let mut store = RosterStore {
            teams,
            slots_per_team,
            grid: HashMap::new(),
        };
        for (team, slots) in assignments {
            for week in FIRST_WEEK..=LAST_ROSTER_WEEK {
                store.grid.insert((team.clone(), week), slots.clone());
            }
        }
        store
    }

    /// Rebuild the grid from persisted rows.
    pub fn from_rows(teams: Vec<String>, slots_per_team: usize, rows: Vec<RosterRow>) -> Self {
        let mut store = Self::empty(teams, slots_per_team);
        for row in rows {
            if let Some(slots) = store.grid.get_mut(&(row.team, row.week)) {
                if row.slot < slots.len() {
                    slots[row.slot] = row.school;
                }
            }
        }
        store
    }

    /// Every cell of the grid, for persistence.
    pub fn rows(&self) -> Vec<RosterRow> {
        let mut rows = Vec::with_capacity(
            self.teams.len() * LAST_ROSTER_WEEK as usize * self.slots_per_team,
        );
        for team in &self.teams {
            for week in FIRST_WEEK..=LAST_ROSTER_WEEK {
                if let Some(slots) = self.grid.get(&(team.clone(), week)) {
                    for (slot, school) in slots.iter().enumerate() {
                        rows.push(RosterRow {
                            team: team.clone(),
                            week,
                            slot,
                            school: school.clone(),
                        });
                    }
                }
            }
        }
        rows
    }

    pub fn teams(&self) -> &[String] {
        &self.teams
    }

    pub fn slots_per_team(&self) -> usize {
        self.slots_per_team
    }

    /// The team's slot list for a given week.
    pub fn roster(&self, team: &str, week: u8) -> Option<&[Option<String>]> {
        self.grid
            .get(&(team.to_string(), week))
            .map(|slots| slots.as_slice())
    }

    /// The team's slot list for a scoring period (post-season periods read
    /// week 16).
    pub fn roster_for_period(&self, team: &str, period: SeasonPeriod) -> Option<&[Option<String>]> {
        self.roster(team, period.roster_week())
    }

    /// Index of the slot holding `school` on the team's roster that week.
    pub fn slot_of(&self, team: &str, week: u8, school: &str) -> Option<usize> {
        self.roster(team, week)?
            .iter()
            .position(|s| s.as_deref() == Some(school))
    }

    /// How many of the team's slots hold `school` that week (per-team cap).
    pub fn count_for_team(&self, team: &str, week: u8, school: &str) -> usize {
        self.roster(team, week)
            .map(|slots| {
                slots
                    .iter()
                    .filter(|s| s.as_deref() == Some(school))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Write `school` into the given slot for `from_week` through week 16.
    /// Weeks before `from_week` are untouched — swaps never apply
    /// retroactively.
    pub fn swap_forward(&mut self, team: &str, from_week: u8, slot: usize, school: &str) {
        for week in from_week..=LAST_ROSTER_WEEK {
            if let Some(slots) = self.grid.get_mut(&(team.to_string(), week)) {
                if slot < slots.len() {
                    slots[slot] = Some(school.to_string());
                }
            }
        }
    }

    /// Ground-truth selection counts for one week across all teams, used to
    /// reconcile the eligibility tracker.
    pub fn selection_counts(&self, week: u8) -> HashMap<String, u32> {
        let mut counts: HashMap<String, u32> = HashMap::new();
        for team in &self.teams {
            if let Some(slots) = self.grid.get(&(team.clone(), week)) {
                for school in slots.iter().flatten() {
                    *counts.entry(school.clone()).or_insert(0) += 1;
                }
            }
        }
        counts
    }

    /// The weeks during which `team` held `school` in any slot.
    pub fn active_weeks(&self, team: &str, school: &str) -> BTreeSet<u8> {
        (FIRST_WEEK..=LAST_ROSTER_WEEK)
            .filter(|&week| self.count_for_team(team, week, school) > 0)
            .collect()
    }

    /// Contiguous (start, end) week spans during which `team` held `school`.
    pub fn active_windows(&self, team: &str, school: &str) -> Vec<(u8, u8)> {
        let weeks = self.active_weeks(team, school);
        let mut windows: Vec<(u8, u8)> = Vec::new();
        for week in weeks {
            match windows.last_mut() {
                Some((_, end)) if *end + 1 == week => *end = week,
                _ => windows.push((week, week)),
            }
        }
        windows
    }

    /// Union of all teams' active weeks for `school` — the league-wide
    /// window during which the school's points are applicable at all.
    pub fn league_active_weeks(&self, school: &str) -> BTreeSet<u8> {
        let mut weeks = BTreeSet::new();
        for team in &self.teams {
            weeks.extend(self.active_weeks(team, school));
        }
        weeks
    }
}
