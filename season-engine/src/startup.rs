// Resumable four-phase season initialization.

use anyhow::Context;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SeasonConfig;
use crate::eligibility::EligibilityTracker;
use crate::ingest::feed::ScoreFeed;
use crate::ingest::pipeline::CALENDAR_CACHE_KEY;
use crate::registry::SchoolRegistry;
use crate::store::Database;

/// Key in the season_state table holding the index of the last completed
/// setup phase.
const SETUP_PHASE_KEY: &str = "setup_phase";

/// The four startup phases, run in order. Phase status is recorded
/// externally after each completes, so a failure in phase N never silently
/// continues to phase N+1, and a re-run resumes from the first incomplete
/// phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupPhase {
    Schema,
    Registry,
    Calendar,
    Eligibility,
}

impl SetupPhase {
    pub fn all() -> [SetupPhase; 4] {
        [
            SetupPhase::Schema,
            SetupPhase::Registry,
            SetupPhase::Calendar,
            SetupPhase::Eligibility,
        ]
    }

    pub fn index(&self) -> u8 {
        match self {
            SetupPhase::Schema => 1,
            SetupPhase::Registry => 2,
            SetupPhase::Calendar => 3,
            SetupPhase::Eligibility => 4,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SetupPhase::Schema => "schema",
            SetupPhase::Registry => "registry",
            SetupPhase::Calendar => "calendar",
            SetupPhase::Eligibility => "eligibility",
        }
    }
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("season setup failed in phase {phase}: {source}")]
    Phase {
        phase: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// What a setup run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupOutcome {
    /// Phases executed by this run (phases already recorded as completed
    /// are skipped).
    pub ran: Vec<SetupPhase>,
    /// Index of the last phase that was already complete before this run
    /// (0 = fresh system).
    pub resumed_after: u8,
}

fn last_completed(db: &Database) -> Result<u8, SetupError> {
    let value = db.load_state(SETUP_PHASE_KEY).map_err(|e| SetupError::Phase {
        phase: "schema",
        source: e,
    })?;
    Ok(value.and_then(|v| v.as_u64()).unwrap_or(0) as u8)
}

fn mark_completed(db: &Database, phase: SetupPhase) -> Result<(), SetupError> {
    db.save_state(SETUP_PHASE_KEY, &serde_json::json!(phase.index()))
        .map_err(|e| SetupError::Phase {
            phase: phase.name(),
            source: e,
        })
}

/// Run (or resume) the season initialization sequence.
///
/// 1. Schema — verify the database tables exist.
/// 2. Registry — validate and persist the school catalog.
/// 3. Calendar — populate the season calendar from the feed. A feed outage
///    here logs and continues with partial data rather than aborting.
/// 4. Eligibility — initialize counters unless persisted state already
///    exists.
pub async fn run_season_setup<F: ScoreFeed>(
    db: &Database,
    registry: &SchoolRegistry,
    feed: &F,
    config: &SeasonConfig,
) -> Result<SetupOutcome, SetupError> {
    let resumed_after = last_completed(db)?;
    if resumed_after > 0 {
        info!("resuming season setup after phase {resumed_after}");
    }

    let mut ran = Vec::new();
    for phase in SetupPhase::all() {
        if phase.index() <= resumed_after {
            continue;
        }
        run_phase(phase, db, registry, feed, config).await?;
        mark_completed(db, phase)?;
        ran.push(phase);
        info!("setup phase {} complete", phase.name());
    }

    Ok(SetupOutcome { ran, resumed_after })
}

async fn run_phase<F: ScoreFeed>(
    phase: SetupPhase,
    db: &Database,
    registry: &SchoolRegistry,
    feed: &F,
    config: &SeasonConfig,
) -> Result<(), SetupError> {
    let wrap = |source: anyhow::Error| SetupError::Phase {
        phase: phase.name(),
        source,
    };

    match phase {
        SetupPhase::Schema => db.verify_schema().map_err(wrap),
        SetupPhase::Registry => {
            let names: Vec<&str> = registry.names().collect();
            db.save_state(
                "school_catalog",
                &serde_json::to_value(&names)
                    .context("failed to serialize school catalog")
                    .map_err(wrap)?,
            )
            .map_err(wrap)?;
            info!("school catalog persisted ({} schools)", names.len());
            Ok(())
        }
        SetupPhase::Calendar => {
            match feed.calendar().await {
                Ok(calendar) => {
                    db.save_state(
                        CALENDAR_CACHE_KEY,
                        &serde_json::to_value(&calendar)
                            .context("failed to serialize calendar")
                            .map_err(wrap)?,
                    )
                    .map_err(wrap)?;
                    info!("season calendar populated ({} periods)", calendar.periods.len());
                }
                Err(e) => {
                    // Soft failure: schedule population continues with
                    // partial data and the next ingestion pass retries.
                    warn!("calendar population failed ({e}); continuing without it");
                }
            }
            Ok(())
        }
        SetupPhase::Eligibility => {
            match EligibilityTracker::load(db).map_err(wrap)? {
                Some(_) => {
                    info!("eligibility state already persisted; leaving it untouched");
                }
                None => {
                    let tracker = EligibilityTracker::initialize(
                        registry.names(),
                        config.league.max_school_selections,
                    );
                    tracker.save(db).map_err(wrap)?;
                    info!("eligibility counters initialized");
                }
            }
            Ok(())
        }
    }
}
