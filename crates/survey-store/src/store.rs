//! Storage collaborator trait and the in-memory store.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use survey_model::{CommittedRow, Schema};

use crate::error::StoreError;
use crate::types::{Precondition, SurveyId, WaveRecord, WriteRequest};

/// Persisted schema and wave history per survey identity.
///
/// `write` is the only mutating operation. It checks the request's
/// precondition and commits schema, rows and wave record as one unit, or
/// fails with [`StoreError::Conflict`] and changes nothing.
pub trait SurveyStore {
    fn get_schema(&self, survey: &SurveyId) -> Result<Option<Schema>, StoreError>;

    fn get_max_load_counter(&self, survey: &SurveyId) -> Result<Option<u64>, StoreError>;

    fn write(&self, survey: &SurveyId, request: WriteRequest<'_>)
    -> Result<WaveRecord, StoreError>;

    /// Committed waves, oldest first.
    fn waves(&self, survey: &SurveyId) -> Result<Vec<WaveRecord>, StoreError>;

    /// Committed rows in commit order.
    fn rows(&self, survey: &SurveyId) -> Result<Vec<CommittedRow>, StoreError>;
}

#[derive(Debug, Default)]
struct SurveyHistory {
    schema: Option<(Schema, String)>,
    waves: Vec<WaveRecord>,
    rows: Vec<CommittedRow>,
}

/// Process-local store, mainly for tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    surveys: Mutex<BTreeMap<SurveyId, SurveyHistory>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SurveyStore for MemoryStore {
    fn get_schema(&self, survey: &SurveyId) -> Result<Option<Schema>, StoreError> {
        let surveys = self.surveys.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(surveys
            .get(survey)
            .and_then(|history| history.schema.as_ref())
            .map(|(schema, _)| schema.clone()))
    }

    fn get_max_load_counter(&self, survey: &SurveyId) -> Result<Option<u64>, StoreError> {
        let surveys = self.surveys.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(surveys
            .get(survey)
            .and_then(|history| history.waves.last())
            .map(|wave| wave.load_counter))
    }

    fn write(
        &self,
        survey: &SurveyId,
        request: WriteRequest<'_>,
    ) -> Result<WaveRecord, StoreError> {
        let mut surveys = self.surveys.lock().unwrap_or_else(PoisonError::into_inner);
        let history = surveys.entry(survey.clone()).or_default();
        let stored_fingerprint = history.schema.as_ref().map(|(_, print)| print.as_str());
        let stored_max = history.waves.last().map(|wave| wave.load_counter);
        if let Some(reason) = request.conflict_with(stored_fingerprint, stored_max) {
            return Err(StoreError::Conflict {
                survey_id: survey.to_string(),
                reason,
            });
        }

        if *request.precondition == Precondition::NoHistory {
            history.schema = Some((request.schema.clone(), request.schema.fingerprint()));
        }
        let wave = WaveRecord {
            load_counter: request.load_counter,
            poll_id: request.poll_id,
            rows: request.rows.len(),
            committed_at: Utc::now(),
        };
        history
            .rows
            .extend(request.rows.iter().cloned().map(|row| CommittedRow {
                load_counter: request.load_counter,
                row,
            }));
        history.waves.push(wave.clone());
        Ok(wave)
    }

    fn waves(&self, survey: &SurveyId) -> Result<Vec<WaveRecord>, StoreError> {
        let surveys = self.surveys.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(surveys
            .get(survey)
            .map(|history| history.waves.clone())
            .unwrap_or_default())
    }

    fn rows(&self, survey: &SurveyId) -> Result<Vec<CommittedRow>, StoreError> {
        let surveys = self.surveys.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(surveys
            .get(survey)
            .map(|history| history.rows.clone())
            .unwrap_or_default())
    }
}
