// League-wide school selection counters and cap enforcement.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::store::Database;

/// Key in the season_state table holding the serialized tracker.
const ELIGIBILITY_STATE_KEY: &str = "eligibility";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{school} has reached the league-wide selection cap ({current}/{max})")]
pub struct EligibilityError {
    pub school: String,
    pub current: u32,
    pub max: u32,
}

/// Per-school selection counters with a uniform league-wide cap.
///
/// Mutated by every draft pick and add/drop swap, persisted to the season
/// key-value store after each mutation, and reloaded at process start. If no
/// persisted state exists the caller must [`initialize`](Self::initialize)
/// before the draft opens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityTracker {
    max_selections: u32,
    counts: HashMap<String, u32>,
}

/// One counter overwritten during [`EligibilityTracker::reconcile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Correction {
    pub school: String,
    pub from: u32,
    pub to: u32,
}

impl EligibilityTracker {
    /// Reset every school's counter to 0 under the given cap.
    pub fn initialize<I, S>(schools: I, max_selections: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let counts = schools.into_iter().map(|s| (s.into(), 0)).collect();
        EligibilityTracker {
            max_selections,
            counts,
        }
    }

    pub fn max_selections(&self) -> u32 {
        self.max_selections
    }

    /// Current league-wide selection count for a school.
    pub fn current(&self, school: &str) -> u32 {
        self.counts.get(school).copied().unwrap_or(0)
    }

    /// Whether the school can still be selected anywhere in the league.
    pub fn is_available(&self, school: &str) -> bool {
        self.current(school) < self.max_selections
    }

    /// Claim one selection of `school`, failing if the cap is reached.
    /// The counter is untouched on failure.
    pub fn try_select(&mut self, school: &str) -> Result<(), EligibilityError> {
        let current = self.current(school);
        if current >= self.max_selections {
            return Err(EligibilityError {
                school: school.to_string(),
                current,
                max: self.max_selections,
            });
        }
        *self.counts.entry(school.to_string()).or_insert(0) += 1;
        Ok(())
    }

    /// Apply an add/drop swap to the counters.
    ///
    /// The dropped school's counter floors at 0: an underflow means the
    /// caller recorded a drop the tracker never saw, which is logged rather
    /// than panicked on. There is no built-in dedup — callers must guarantee
    /// at-most-once invocation per applied transaction.
    pub fn record_transaction(&mut self, dropped: Option<&str>, added: Option<&str>) {
        if let Some(school) = dropped {
            let entry = self.counts.entry(school.to_string()).or_insert(0);
            if *entry == 0 {
                warn!("eligibility counter underflow for {school}; flooring at 0");
            } else {
                *entry -= 1;
            }
        }
        if let Some(school) = added {
            *self.counts.entry(school.to_string()).or_insert(0) += 1;
        }
    }

    /// Overwrite every counter with ground truth computed from the
    /// authoritative roster store, returning the drift that was corrected.
    /// Schools absent from `actual` are reset to 0.
    pub fn reconcile(&mut self, actual: &HashMap<String, u32>) -> Vec<Correction> {
        let mut corrections = Vec::new();

        for (school, count) in self.counts.iter_mut() {
            let truth = actual.get(school).copied().unwrap_or(0);
            if *count != truth {
                corrections.push(Correction {
                    school: school.clone(),
                    from: *count,
                    to: truth,
                });
                *count = truth;
            }
        }

        // Ground truth may reference schools the tracker has never seen.
        for (school, &truth) in actual {
            if !self.counts.contains_key(school) && truth > 0 {
                corrections.push(Correction {
                    school: school.clone(),
                    from: 0,
                    to: truth,
                });
                self.counts.insert(school.clone(), truth);
            }
        }

        if !corrections.is_empty() {
            warn!(
                "eligibility reconciliation corrected {} counter(s)",
                corrections.len()
            );
        }
        corrections
    }

    /// Zero every counter (draft reset).
    pub fn reset_counts(&mut self) {
        for count in self.counts.values_mut() {
            *count = 0;
        }
    }

    /// Persist the full tracker state to the season key-value store.
    pub fn save(&self, db: &Database) -> anyhow::Result<()> {
        db.save_state(ELIGIBILITY_STATE_KEY, &serde_json::to_value(self)?)
    }

    /// Load previously persisted state. `Ok(None)` means no state exists and
    /// the caller should [`initialize`](Self::initialize).
    pub fn load(db: &Database) -> anyhow::Result<Option<Self>> {
        match db.load_state(ELIGIBILITY_STATE_KEY)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}
