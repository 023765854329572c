// Weekly add/drop transaction pipeline: ordered validation, then an
// all-or-nothing apply.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::config::SeasonConfig;
use crate::eligibility::EligibilityTracker;
use crate::roster::RosterStore;
use crate::scoring::period::LAST_ROSTER_WEEK;
use crate::store::Database;

/// A submitted swap. Roster size is fixed, so every change is a swap — a
/// drop-only or add-only request is rejected outright.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub team: String,
    /// Who is submitting (an owner address or an admin address).
    pub actor: String,
    pub drop_school: String,
    pub add_school: String,
}

/// One entry of the append-only transaction history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Monotonically increasing log position; prior history is never
    /// overwritten.
    pub position: i64,
    pub timestamp: DateTime<Utc>,
    pub team: String,
    /// The week the swap took effect from.
    pub week: u8,
    pub dropped: String,
    pub added: String,
    pub slot: usize,
}

/// Rejection reasons, in validation order. The Display text is the literal
/// rule shown to the user.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Both a dropped school and an added school are required; partial swaps are not allowed")]
    HalfOpenSwap,

    #[error("{actor} is not an owner of {team} and is not a league admin")]
    NotAuthorized { actor: String, team: String },

    #[error("Final add/drop deadline has passed ({deadline})")]
    FinalDeadlinePassed { deadline: String },

    #[error("Week {week} games have started; add/drops are locked until next week")]
    WeekLocked { week: u8 },

    #[error("{team} has used all {max} add/drops for the season")]
    QuotaExhausted { team: String, max: u32 },

    #[error("{school} is not on {team}'s week {week} roster")]
    DropNotOnRoster {
        school: String,
        team: String,
        week: u8,
    },

    #[error("{school} has reached the league-wide selection cap ({max})")]
    AddAtGlobalCap { school: String, max: u32 },

    #[error("{team} already holds {school} the maximum of {max} time(s)")]
    AddAtTeamCap {
        team: String,
        school: String,
        max: u32,
    },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Validates and applies swap requests against the roster grid, eligibility
/// tracker, and deadline/quota rules.
///
/// Validation is fully ordered and short-circuits on the first failure; no
/// roster or eligibility mutation happens before every check passes.
#[derive(Debug, Clone)]
pub struct TransactionService {
    max_transactions: u32,
    per_team_cap: u32,
    final_deadline: DateTime<Utc>,
    owners: HashMap<String, Vec<String>>,
    admins: Vec<String>,
}

impl TransactionService {
    pub fn new(
        max_transactions: u32,
        per_team_cap: u32,
        final_deadline: DateTime<Utc>,
        owners: HashMap<String, Vec<String>>,
        admins: Vec<String>,
    ) -> Self {
        TransactionService {
            max_transactions,
            per_team_cap,
            final_deadline,
            owners,
            admins,
        }
    }

    pub fn from_config(config: &SeasonConfig) -> Self {
        Self::new(
            config.league.max_transactions,
            config.league.max_times_school_per_team,
            config.final_add_drop,
            config.league.owners.clone(),
            config.league.admins.clone(),
        )
    }

    fn is_authorized(&self, actor: &str, team: &str) -> bool {
        if self.admins.iter().any(|a| a == actor) {
            return true;
        }
        self.owners
            .get(team)
            .map(|owners| owners.iter().any(|o| o == actor))
            .unwrap_or(false)
    }

    /// Run the full validation chain without mutating anything. Returns the
    /// slot index the swap would land in.
    #[allow(clippy::too_many_arguments)]
    pub fn validate(
        &self,
        request: &SwapRequest,
        now: DateTime<Utc>,
        active_week: u8,
        week_kickoff: Option<DateTime<Utc>>,
        roster: &RosterStore,
        eligibility: &EligibilityTracker,
        db: &Database,
    ) -> Result<usize, TransactionError> {
        // 1. Roster size is fixed: every change must be a swap.
        if request.drop_school.is_empty() || request.add_school.is_empty() {
            return Err(TransactionError::HalfOpenSwap);
        }

        // 2. Only the team's owners or an admin may act for it.
        if !self.is_authorized(&request.actor, &request.team) {
            return Err(TransactionError::NotAuthorized {
                actor: request.actor.clone(),
                team: request.team.clone(),
            });
        }

        // 3. Season deadline, then this week's kickoff deadline.
        if now > self.final_deadline {
            return Err(TransactionError::FinalDeadlinePassed {
                deadline: self.final_deadline.format("%m/%d/%Y").to_string(),
            });
        }
        if let Some(kickoff) = week_kickoff {
            if now >= kickoff {
                return Err(TransactionError::WeekLocked { week: active_week });
            }
        }

        // 4. Season add/drop budget.
        let used = db.transaction_count(&request.team)?;
        if used >= self.max_transactions {
            return Err(TransactionError::QuotaExhausted {
                team: request.team.clone(),
                max: self.max_transactions,
            });
        }

        // 5. The dropped school must be on the active-week roster.
        let slot = roster
            .slot_of(&request.team, active_week, &request.drop_school)
            .ok_or_else(|| TransactionError::DropNotOnRoster {
                school: request.drop_school.clone(),
                team: request.team.clone(),
                week: active_week,
            })?;

        // 6. The added school must be available globally and under this
        //    team's per-team cap.
        if !eligibility.is_available(&request.add_school) {
            return Err(TransactionError::AddAtGlobalCap {
                school: request.add_school.clone(),
                max: eligibility.max_selections(),
            });
        }
        if roster.count_for_team(&request.team, active_week, &request.add_school)
            >= self.per_team_cap as usize
        {
            return Err(TransactionError::AddAtTeamCap {
                team: request.team.clone(),
                school: request.add_school.clone(),
                max: self.per_team_cap,
            });
        }

        Ok(slot)
    }

    /// Validate and apply a swap. On success the added school occupies the
    /// dropped school's slot from the active week through week 16, the
    /// eligibility counters are swapped and persisted, and the transaction
    /// is appended to the history.
    #[allow(clippy::too_many_arguments)]
    pub fn submit(
        &self,
        request: &SwapRequest,
        now: DateTime<Utc>,
        active_week: u8,
        week_kickoff: Option<DateTime<Utc>>,
        roster: &mut RosterStore,
        eligibility: &mut EligibilityTracker,
        db: &Database,
    ) -> Result<TransactionRecord, TransactionError> {
        let slot = self.validate(
            request,
            now,
            active_week,
            week_kickoff,
            roster,
            eligibility,
            db,
        )?;

        let position = db.apply_swap(
            &request.team,
            active_week,
            LAST_ROSTER_WEEK,
            slot,
            &request.drop_school,
            &request.add_school,
            now,
        )?;
        roster.swap_forward(&request.team, active_week, slot, &request.add_school);

        eligibility.record_transaction(Some(&request.drop_school), Some(&request.add_school));
        eligibility.save(db)?;

        info!(
            "applied swap #{position} for {}: {} -> {} (week {active_week}, slot {slot})",
            request.team, request.drop_school, request.add_school
        );

        Ok(TransactionRecord {
            position,
            timestamp: now,
            team: request.team.clone(),
            week: active_week,
            dropped: request.drop_school.clone(),
            added: request.add_school.clone(),
            slot,
        })
    }
}
