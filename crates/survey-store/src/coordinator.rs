//! Load coordinator: decides how a freshly built schema and its validated
//! rows join a survey's history.
//!
//! `plan` reads the stored schema and latest `load_counter` and lands in
//! one of three states. `commit` turns a plan into a single precondition-
//! checked store write. `load` runs both, re-planning when another run
//! committed in between.

use std::fmt;

use survey_model::{Schema, SchemaDiff, ValidatedRow};

use crate::error::{LoadError, StoreError};
use crate::store::SurveyStore;
use crate::types::{Precondition, SurveyId, WaveRecord, WriteRequest};

pub const DEFAULT_COMMIT_ATTEMPTS: u32 = 3;

/// Coordinator states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    NoHistory,
    HistoryMatch,
    HistoryMismatch,
    Committed,
}

impl LoadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoadState::NoHistory => "NO_HISTORY",
            LoadState::HistoryMatch => "HISTORY_MATCH",
            LoadState::HistoryMismatch => "HISTORY_MISMATCH",
            LoadState::Committed => "COMMITTED",
        }
    }
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of comparing a fresh schema with storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadPlan {
    /// Nothing stored: persist the schema and load as wave 0.
    NoHistory,
    /// Stored schema is equivalent: append as the next wave.
    HistoryMatch {
        fingerprint: String,
        max_load_counter: u64,
    },
    /// Stored schema differs; nothing may be written.
    HistoryMismatch { diff: SchemaDiff },
}

impl LoadPlan {
    pub fn state(&self) -> LoadState {
        match self {
            LoadPlan::NoHistory => LoadState::NoHistory,
            LoadPlan::HistoryMatch { .. } => LoadState::HistoryMatch,
            LoadPlan::HistoryMismatch { .. } => LoadState::HistoryMismatch,
        }
    }

    /// Counter the rows would be committed with.
    pub fn load_counter(&self) -> Option<u64> {
        match self {
            LoadPlan::NoHistory => Some(0),
            LoadPlan::HistoryMatch {
                max_load_counter, ..
            } => Some(max_load_counter + 1),
            LoadPlan::HistoryMismatch { .. } => None,
        }
    }
}

impl fmt::Display for LoadPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadPlan::NoHistory => write!(f, "{} (load_counter 0)", self.state()),
            LoadPlan::HistoryMatch {
                max_load_counter, ..
            } => write!(
                f,
                "{} (load_counter {})",
                self.state(),
                max_load_counter + 1
            ),
            LoadPlan::HistoryMismatch { diff } => {
                write!(f, "{}:\n{diff}", self.state())
            }
        }
    }
}

/// A committed wave and the state it was committed from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    pub from: LoadState,
    pub wave: WaveRecord,
    /// Commit attempts used, starting at 1.
    pub attempts: u32,
}

/// Runs the versioned append protocol against a store.
#[derive(Debug)]
pub struct LoadCoordinator<'a, S: SurveyStore + ?Sized> {
    store: &'a S,
    max_attempts: u32,
}

impl<'a, S: SurveyStore + ?Sized> LoadCoordinator<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            max_attempts: DEFAULT_COMMIT_ATTEMPTS,
        }
    }

    /// Commit attempts before giving up on conflicts; at least 1.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Compare `schema` with storage. Reads only.
    pub fn plan(&self, survey: &SurveyId, schema: &Schema) -> Result<LoadPlan, LoadError> {
        let Some(stored) = self.store.get_schema(survey)? else {
            tracing::debug!(survey_id = %survey, "no stored schema");
            return Ok(LoadPlan::NoHistory);
        };
        let diff = stored.diff(schema);
        if !diff.is_empty() {
            tracing::debug!(survey_id = %survey, differences = diff.len(), "stored schema differs");
            return Ok(LoadPlan::HistoryMismatch { diff });
        }
        let max_load_counter =
            self.store
                .get_max_load_counter(survey)?
                .ok_or_else(|| StoreError::Corrupt {
                    survey_id: survey.to_string(),
                    reason: "schema is stored but no wave was committed".to_string(),
                })?;
        Ok(LoadPlan::HistoryMatch {
            fingerprint: stored.fingerprint(),
            max_load_counter,
        })
    }

    /// Write `rows` as planned. A mismatch plan fails with
    /// [`LoadError::SchemaDrift`] before touching the store.
    pub fn commit(
        &self,
        survey: &SurveyId,
        plan: &LoadPlan,
        schema: &Schema,
        rows: &[ValidatedRow],
        poll_id: Option<u64>,
    ) -> Result<WaveRecord, LoadError> {
        let (precondition, load_counter) = match plan {
            LoadPlan::NoHistory => (Precondition::NoHistory, 0),
            LoadPlan::HistoryMatch {
                fingerprint,
                max_load_counter,
            } => (
                Precondition::SchemaMatches {
                    fingerprint: fingerprint.clone(),
                    max_load_counter: *max_load_counter,
                },
                max_load_counter + 1,
            ),
            LoadPlan::HistoryMismatch { diff } => {
                return Err(LoadError::SchemaDrift {
                    survey_id: survey.to_string(),
                    diff: diff.clone(),
                });
            }
        };
        let wave = self.store.write(
            survey,
            WriteRequest {
                schema,
                rows,
                load_counter,
                poll_id,
                precondition: &precondition,
            },
        )?;
        Ok(wave)
    }

    /// Plan and commit, re-planning after a conflicting concurrent commit.
    pub fn load(
        &self,
        survey: &SurveyId,
        schema: &Schema,
        rows: &[ValidatedRow],
        poll_id: Option<u64>,
    ) -> Result<LoadOutcome, LoadError> {
        let span = tracing::info_span!("load", survey_id = %survey, rows = rows.len());
        let _guard = span.enter();

        for attempt in 1..=self.max_attempts {
            let plan = self.plan(survey, schema)?;
            tracing::info!(state = %plan.state(), attempt, "planned load");
            match self.commit(survey, &plan, schema, rows, poll_id) {
                Ok(wave) => {
                    tracing::info!(
                        state = %LoadState::Committed,
                        load_counter = wave.load_counter,
                        rows = wave.rows,
                        "committed wave"
                    );
                    return Ok(LoadOutcome {
                        from: plan.state(),
                        wave,
                        attempts: attempt,
                    });
                }
                Err(LoadError::Store(error)) if error.is_conflict() => {
                    tracing::warn!(attempt, %error, "commit conflicted; re-planning");
                }
                Err(error) => return Err(error),
            }
        }
        Err(LoadError::RetriesExhausted {
            survey_id: survey.to_string(),
            attempts: self.max_attempts,
        })
    }
}
