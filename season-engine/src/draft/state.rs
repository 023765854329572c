// Turn-based school selection state machine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use super::order::{self, DraftType};
use crate::cache::SelectionCache;
use crate::eligibility::EligibilityTracker;
use crate::registry::SchoolRegistry;
use crate::roster::RosterStore;

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("the draft cannot start before {draft_date} (today is {today})")]
    DateNotReached {
        draft_date: NaiveDate,
        today: NaiveDate,
    },

    #[error("the draft has already started; reset it before starting again")]
    AlreadyStarted,

    #[error("no selection is on the clock (draft phase: {phase:?})")]
    NotOnTheClock { phase: DraftPhase },

    #[error("{school} is not in the school catalog")]
    UnknownSchool { school: String },

    #[error("{school} is unavailable: {reason}")]
    SchoolUnavailable { school: String, reason: String },

    #[error("the draft is not complete; rosters cannot be materialized yet")]
    DraftIncomplete,
}

/// Draft lifecycle. Transitions only move forward; the only way back is a
/// full [`reset`](DraftStateMachine::reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DraftPhase {
    NotStarted,
    InProgress,
    Complete,
}

/// One recorded selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchoolPick {
    /// Sequential pick number (1-indexed).
    pub pick_number: u32,
    /// 0-indexed round the pick was made in.
    pub round: usize,
    pub team: String,
    pub school: String,
}

/// The result of a successful selection.
#[derive(Debug, Clone)]
pub struct PickOutcome {
    pub pick: SchoolPick,
    /// Whether this was the final selection of the draft.
    pub last_selection: bool,
    /// The team now on the clock, if the draft continues.
    pub next_team: Option<String>,
}

/// Snake or linear draft over a fixed team seating order.
///
/// The machine owns the turn cursor: callers submit only the school and the
/// machine resolves which team and board cell the pick lands on.
#[derive(Debug, Clone)]
pub struct DraftStateMachine {
    teams: Vec<String>,
    rounds: usize,
    draft_type: DraftType,
    /// Per-team cap on repeat selections of one school.
    per_team_cap: u32,
    phase: DraftPhase,
    pick_count: usize,
    /// board[round][team_index] = selected school.
    board: Vec<Vec<Option<String>>>,
    picks: Vec<SchoolPick>,
}

impl DraftStateMachine {
    pub fn new(
        teams: Vec<String>,
        rounds: usize,
        draft_type: DraftType,
        per_team_cap: u32,
    ) -> Self {
        let board = vec![vec![None; teams.len()]; rounds];
        DraftStateMachine {
            teams,
            rounds,
            draft_type,
            per_team_cap,
            phase: DraftPhase::NotStarted,
            pick_count: 0,
            board,
            picks: Vec::new(),
        }
    }

    pub fn phase(&self) -> DraftPhase {
        self.phase
    }

    pub fn draft_type(&self) -> DraftType {
        self.draft_type
    }

    pub fn picks(&self) -> &[SchoolPick] {
        &self.picks
    }

    /// Open the draft. Fails if today is before the configured draft date or
    /// the draft already ran.
    pub fn start(&mut self, today: NaiveDate, draft_date: NaiveDate) -> Result<(), DraftError> {
        if self.phase != DraftPhase::NotStarted {
            return Err(DraftError::AlreadyStarted);
        }
        if today < draft_date {
            return Err(DraftError::DateNotReached { draft_date, today });
        }
        for row in &mut self.board {
            row.iter_mut().for_each(|cell| *cell = None);
        }
        self.picks.clear();
        self.pick_count = 0;
        self.phase = DraftPhase::InProgress;
        info!(
            "draft opened: {} teams x {} rounds ({})",
            self.teams.len(),
            self.rounds,
            self.draft_type.as_str()
        );
        Ok(())
    }

    /// The team currently on the clock, if any.
    pub fn on_the_clock(&self) -> Option<&str> {
        if self.phase != DraftPhase::InProgress {
            return None;
        }
        let idx = order::team_for_pick(self.pick_count, self.teams.len(), self.draft_type);
        self.teams.get(idx).map(|s| s.as_str())
    }

    /// How many times the given team has already selected `school`.
    fn team_selection_count(&self, team_idx: usize, school: &str) -> u32 {
        self.board
            .iter()
            .filter(|row| row[team_idx].as_deref() == Some(school))
            .count() as u32
    }

    /// Record a selection for the team on the clock and advance the turn.
    pub fn select_school(
        &mut self,
        school: &str,
        registry: &SchoolRegistry,
        eligibility: &mut EligibilityTracker,
        cache: &mut SelectionCache,
    ) -> Result<PickOutcome, DraftError> {
        if self.phase != DraftPhase::InProgress {
            return Err(DraftError::NotOnTheClock { phase: self.phase });
        }
        if !registry.contains(school) {
            return Err(DraftError::UnknownSchool {
                school: school.to_string(),
            });
        }

        let team_idx = order::team_for_pick(self.pick_count, self.teams.len(), self.draft_type);
        let team = self.teams[team_idx].clone();

        let repeats = self.team_selection_count(team_idx, school);
        if repeats >= self.per_team_cap {
            return Err(DraftError::SchoolUnavailable {
                school: school.to_string(),
                reason: format!(
                    "{team} already holds it {repeats} time(s), per-team cap is {}",
                    self.per_team_cap
                ),
            });
        }

        eligibility
            .try_select(school)
            .map_err(|e| DraftError::SchoolUnavailable {
                school: school.to_string(),
                reason: e.to_string(),
            })?;

        let round = self.pick_count / self.teams.len();
        self.board[round][team_idx] = Some(school.to_string());
        let pick = SchoolPick {
            pick_number: self.pick_count as u32 + 1,
            round,
            team: team.clone(),
            school: school.to_string(),
        };
        self.picks.push(pick.clone());

        let last_selection = order::is_last_pick(self.pick_count, self.teams.len(), self.rounds);
        self.pick_count += 1;
        if last_selection {
            self.phase = DraftPhase::Complete;
            info!("draft complete after {} picks", self.pick_count);
        }

        // The selectable set changes with every pick.
        cache.invalidate();

        let next_team = self.on_the_clock().map(|t| t.to_string());
        Ok(PickOutcome {
            pick,
            last_selection,
            next_team,
        })
    }

    /// The schools the team on the clock may still select: the catalog minus
    /// schools at the global cap minus schools at this team's per-team cap.
    pub fn selectable_schools(
        &self,
        registry: &SchoolRegistry,
        eligibility: &EligibilityTracker,
        cache: &mut SelectionCache,
    ) -> Vec<String> {
        if self.phase != DraftPhase::InProgress {
            return Vec::new();
        }
        let team_idx = order::team_for_pick(self.pick_count, self.teams.len(), self.draft_type);
        cache
            .available_or(|| {
                registry
                    .names()
                    .filter(|school| eligibility.is_available(school))
                    .filter(|school| self.team_selection_count(team_idx, school) < self.per_team_cap)
                    .map(|s| s.to_string())
                    .collect()
            })
            .to_vec()
    }

    /// Full state wipe: clears the board, zeroes the eligibility counters,
    /// and returns to `NotStarted`.
    pub fn reset(&mut self, eligibility: &mut EligibilityTracker, cache: &mut SelectionCache) {
        for row in &mut self.board {
            row.iter_mut().for_each(|cell| *cell = None);
        }
        self.picks.clear();
        self.pick_count = 0;
        self.phase = DraftPhase::NotStarted;
        eligibility.reset_counts();
        cache.invalidate();
        info!("draft reset to a clean slate");
    }

    /// Materialize the initial roster grid from the completed board. Each
    /// team's slots are its picks in round order.
    pub fn into_rosters(&self) -> Result<RosterStore, DraftError> {
        if self.phase != DraftPhase::Complete {
            return Err(DraftError::DraftIncomplete);
        }
        let assignments = self
            .teams
            .iter()
            .enumerate()
            .map(|(idx, team)| {
                let slots: Vec<Option<String>> =
                    (0..self.rounds).map(|r| self.board[r][idx].clone()).collect();
                (team.clone(), slots)
            })
            .collect();
        Ok(RosterStore::from_draft(assignments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{School, SchoolRegistry};

    fn registry() -> SchoolRegistry {
        let schools = [
            "Michigan",
            "Ohio State",
            "Alabama",
            "Georgia",
            "Texas",
            "Oregon",
            "Penn State",
            "Notre Dame",
            "Clemson",
            "Utah",
        ]
        .iter()
        .map(|name| School {
            name: name.to_string(),
            conference: "Test".to_string(),
            primary_color: "#000000".to_string(),
            secondary_color: "#FFFFFF".to_string(),
        })
        .collect();
        SchoolRegistry::from_schools(schools).unwrap()
    }

    fn four_teams() -> Vec<String> {
        (1..=4).map(|i| format!("T{i}")).collect()
    }

    fn draft_day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, 25).unwrap()
    }

    fn started_machine(draft_type: DraftType, rounds: usize) -> DraftStateMachine {
        let mut machine = DraftStateMachine::new(four_teams(), rounds, draft_type, 1);
        machine.start(draft_day(), draft_day()).unwrap();
        machine
    }

    #[test]
    fn cannot_start_before_draft_date() {
        let mut machine = DraftStateMachine::new(four_teams(), 2, DraftType::Snake, 1);
        let today = NaiveDate::from_ymd_opt(2026, 8, 24).unwrap();
        let err = machine.start(today, draft_day()).unwrap_err();
        assert!(matches!(err, DraftError::DateNotReached { .. }));
        assert_eq!(machine.phase(), DraftPhase::NotStarted);
    }

    #[test]
    fn start_is_single_shot() {
        let mut machine = started_machine(DraftType::Snake, 2);
        let err = machine.start(draft_day(), draft_day()).unwrap_err();
        assert!(matches!(err, DraftError::AlreadyStarted));
    }

    #[test]
    fn select_before_start_is_rejected() {
        let mut machine = DraftStateMachine::new(four_teams(), 2, DraftType::Snake, 1);
        let mut elig = EligibilityTracker::initialize(registry().names(), 3);
        let mut cache = SelectionCache::new();
        let err = machine
            .select_school("Michigan", &registry(), &mut elig, &mut cache)
            .unwrap_err();
        assert!(matches!(
            err,
            DraftError::NotOnTheClock {
                phase: DraftPhase::NotStarted
            }
        ));
    }

    // Scenario: 4 teams, 2 rounds, snake -> T1,T2,T3,T4 then T4,T3,T2,T1.
    #[test]
    fn snake_draft_turn_order_through_the_machine() {
        let reg = registry();
        let mut machine = started_machine(DraftType::Snake, 2);
        let mut elig = EligibilityTracker::initialize(reg.names(), 3);
        let mut cache = SelectionCache::new();

        let schools = [
            "Michigan",
            "Ohio State",
            "Alabama",
            "Georgia",
            "Texas",
            "Oregon",
            "Penn State",
            "Notre Dame",
        ];
        let mut observed = Vec::new();
        for school in schools {
            observed.push(machine.on_the_clock().unwrap().to_string());
            machine
                .select_school(school, &reg, &mut elig, &mut cache)
                .unwrap();
        }
        assert_eq!(
            observed,
            vec!["T1", "T2", "T3", "T4", "T4", "T3", "T2", "T1"]
        );
        assert_eq!(machine.phase(), DraftPhase::Complete);
    }

    #[test]
    fn linear_draft_repeats_seating_order() {
        let reg = registry();
        let mut machine = started_machine(DraftType::Linear, 2);
        let mut elig = EligibilityTracker::initialize(reg.names(), 3);
        let mut cache = SelectionCache::new();

        let mut observed = Vec::new();
        for school in [
            "Michigan",
            "Ohio State",
            "Alabama",
            "Georgia",
            "Texas",
            "Oregon",
            "Penn State",
            "Notre Dame",
        ] {
            observed.push(machine.on_the_clock().unwrap().to_string());
            machine
                .select_school(school, &reg, &mut elig, &mut cache)
                .unwrap();
        }
        assert_eq!(
            observed,
            vec!["T1", "T2", "T3", "T4", "T1", "T2", "T3", "T4"]
        );
    }

    #[test]
    fn last_selection_freezes_further_picks() {
        let reg = registry();
        let mut machine = started_machine(DraftType::Snake, 1);
        let mut elig = EligibilityTracker::initialize(reg.names(), 3);
        let mut cache = SelectionCache::new();

        let mut last = None;
        for school in ["Michigan", "Ohio State", "Alabama", "Georgia"] {
            last = Some(
                machine
                    .select_school(school, &reg, &mut elig, &mut cache)
                    .unwrap(),
            );
        }
        let outcome = last.unwrap();
        assert!(outcome.last_selection);
        assert!(outcome.next_team.is_none());

        let err = machine
            .select_school("Texas", &reg, &mut elig, &mut cache)
            .unwrap_err();
        assert!(matches!(
            err,
            DraftError::NotOnTheClock {
                phase: DraftPhase::Complete
            }
        ));
    }

    #[test]
    fn unknown_school_rejected() {
        let reg = registry();
        let mut machine = started_machine(DraftType::Snake, 2);
        let mut elig = EligibilityTracker::initialize(reg.names(), 3);
        let mut cache = SelectionCache::new();

        let err = machine
            .select_school("Slippery Rock", &reg, &mut elig, &mut cache)
            .unwrap_err();
        assert!(matches!(err, DraftError::UnknownSchool { .. }));
        assert_eq!(machine.picks().len(), 0);
    }

    #[test]
    fn global_cap_blocks_selection_and_leaves_counter() {
        let reg = registry();
        let mut machine = started_machine(DraftType::Linear, 2);
        // Cap of 1: the second team cannot take the same school.
        let mut elig = EligibilityTracker::initialize(reg.names(), 1);
        let mut cache = SelectionCache::new();

        machine
            .select_school("Michigan", &reg, &mut elig, &mut cache)
            .unwrap();
        let err = machine
            .select_school("Michigan", &reg, &mut elig, &mut cache)
            .unwrap_err();
        match err {
            DraftError::SchoolUnavailable { school, reason } => {
                assert_eq!(school, "Michigan");
                assert!(reason.contains("cap"));
            }
            other => panic!("expected SchoolUnavailable, got {other}"),
        }
        assert_eq!(elig.current("Michigan"), 1);
        // The turn did not advance on failure.
        assert_eq!(machine.on_the_clock(), Some("T2"));
    }

    #[test]
    fn per_team_cap_blocks_repeat_pick() {
        let reg = registry();
        // Single team, 2 rounds, per-team cap 1.
        let mut machine = DraftStateMachine::new(vec!["Solo".to_string()], 2, DraftType::Linear, 1);
        machine.start(draft_day(), draft_day()).unwrap();
        let mut elig = EligibilityTracker::initialize(reg.names(), 3);
        let mut cache = SelectionCache::new();

        machine
            .select_school("Georgia", &reg, &mut elig, &mut cache)
            .unwrap();
        let err = machine
            .select_school("Georgia", &reg, &mut elig, &mut cache)
            .unwrap_err();
        assert!(matches!(err, DraftError::SchoolUnavailable { .. }));
    }

    #[test]
    fn selectable_schools_shrink_as_picks_land() {
        let reg = registry();
        let mut machine = started_machine(DraftType::Linear, 2);
        let mut elig = EligibilityTracker::initialize(reg.names(), 1);
        let mut cache = SelectionCache::new();

        let before = machine.selectable_schools(&reg, &elig, &mut cache);
        assert_eq!(before.len(), reg.len());

        machine
            .select_school("Michigan", &reg, &mut elig, &mut cache)
            .unwrap();
        let after = machine.selectable_schools(&reg, &elig, &mut cache);
        assert_eq!(after.len(), reg.len() - 1);
        assert!(!after.contains(&"Michigan".to_string()));
    }

    #[test]
    fn reset_wipes_board_and_counters() {
        let reg = registry();
        let mut machine = started_machine(DraftType::Snake, 2);
        let mut elig = EligibilityTracker::initialize(reg.names(), 3);
        let mut cache = SelectionCache::new();

        machine
            .select_school("Michigan", &reg, &mut elig, &mut cache)
            .unwrap();
        machine.reset(&mut elig, &mut cache);

        assert_eq!(machine.phase(), DraftPhase::NotStarted);
        assert!(machine.picks().is_empty());
        assert_eq!(elig.current("Michigan"), 0);

        // A fresh start is allowed after reset.
        machine.start(draft_day(), draft_day()).unwrap();
        assert_eq!(machine.on_the_clock(), Some("T1"));
    }

    #[test]
    fn into_rosters_requires_completion() {
        let machine = started_machine(DraftType::Snake, 2);
        assert!(matches!(
            machine.into_rosters().unwrap_err(),
            DraftError::DraftIncomplete
        ));
    }

    #[test]
    fn into_rosters_assigns_picks_in_round_order() {
        let reg = registry();
        let mut machine = started_machine(DraftType::Snake, 2);
        let mut elig = EligibilityTracker::initialize(reg.names(), 3);
        let mut cache = SelectionCache::new();

        for school in [
            "Michigan",
            "Ohio State",
            "Alabama",
            "Georgia",
            "Texas",
            "Oregon",
            "Penn State",
            "Notre Dame",
        ] {
            machine
                .select_school(school, &reg, &mut elig, &mut cache)
                .unwrap();
        }

        let rosters = machine.into_rosters().unwrap();
        // T1 picked first overall and last overall (snake).
        let t1 = rosters.roster("T1", 1).unwrap();
        assert_eq!(t1[0].as_deref(), Some("Michigan"));
        assert_eq!(t1[1].as_deref(), Some("Notre Dame"));
        // T4 had back-to-back picks at the turn.
        let t4 = rosters.roster("T4", 1).unwrap();
        assert_eq!(t4[0].as_deref(), Some("Georgia"));
        assert_eq!(t4[1].as_deref(), Some("Texas"));
    }
}
