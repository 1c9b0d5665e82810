//! Wave pipeline: fetch, parse, infer, transform, load.
//!
//! Every stage before the load is a pure function of its inputs, so any
//! failure up to the load leaves storage untouched. Each run ends committed,
//! aborted with a diagnostic, or aborted with a drift report.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info_span;

use survey_infer::{
    CachedNamer, NoopNamer, PinnedNames, SuggestionTable, VariableNamer, build_schema,
};
use survey_ingest::{ParseOptions, SurveySource, parse_metadata};
use survey_model::{Schema, SurveyMetadata};
use survey_store::{LoadCoordinator, LoadOutcome, LoadPlan, SurveyId, SurveyStore};
use survey_transform::{TransformOutcome, transform_results};

use crate::logging::redact_value;

/// Everything a run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct WaveSettings {
    pub survey: SurveyId,
    pub poll_id: u64,
    pub parse: ParseOptions,
    pub commit_attempts: u32,
}

/// A wave fetched, typed and validated, not yet loaded.
#[derive(Debug, Clone)]
pub struct PreparedWave {
    pub metadata: SurveyMetadata,
    pub schema: Schema,
    pub outcome: TransformOutcome,
}

/// A committed wave.
#[derive(Debug, Clone)]
pub struct WaveResult {
    pub survey: SurveyId,
    pub poll_id: u64,
    pub prepared: PreparedWave,
    pub load: LoadOutcome,
}

/// Build the naming collaborator: a cached suggestion table when a file is
/// configured, otherwise slug naming only.
pub fn build_namer(suggestions: Option<&Path>) -> Result<Box<dyn VariableNamer>> {
    match suggestions {
        Some(path) => {
            let table = SuggestionTable::from_path(path)
                .with_context(|| format!("load name suggestions {}", path.display()))?;
            tracing::info!(entries = table.len(), "loaded name suggestions");
            Ok(Box::new(CachedNamer::new(table)))
        }
        None => Ok(Box::new(NoopNamer)),
    }
}

/// Infer the schema for a poll instance, pinning names already committed
/// for the survey.
pub fn infer_schema(
    source: &dyn SurveySource,
    store: &dyn SurveyStore,
    namer: &dyn VariableNamer,
    settings: &WaveSettings,
) -> Result<(SurveyMetadata, Schema)> {
    let payload = {
        let _span = info_span!("fetch", poll_id = settings.poll_id, what = "metadata").entered();
        source
            .fetch_metadata(settings.poll_id)
            .context("fetch metadata")?
    };

    let _span = info_span!("infer", survey_id = %settings.survey).entered();
    let metadata = parse_metadata(&payload, &settings.parse).context("parse metadata")?;
    let pinned = match store
        .get_schema(&settings.survey)
        .context("read stored schema")?
    {
        Some(stored) => PinnedNames::from_schema(&stored),
        None => PinnedNames::none(),
    };
    let schema = build_schema(&metadata, namer, &pinned).context("build schema")?;
    Ok((metadata, schema))
}

/// Run every stage up to, but not including, the load.
pub fn prepare_wave(
    source: &dyn SurveySource,
    store: &dyn SurveyStore,
    namer: &dyn VariableNamer,
    settings: &WaveSettings,
) -> Result<PreparedWave> {
    let (metadata, schema) = infer_schema(source, store, namer, settings)?;

    let rows = {
        let _span = info_span!("fetch", poll_id = settings.poll_id, what = "results").entered();
        source
            .fetch_results(settings.poll_id)
            .context("fetch results")?
    };

    let _span = info_span!("transform", survey_id = %settings.survey).entered();
    let outcome = transform_results(&rows, &schema);
    for rejection in &outcome.report.rejected {
        tracing::trace!(
            row_index = rejection.row_index,
            kind = %rejection.kind,
            message = redact_value(&rejection.message),
            "rejected row detail"
        );
    }
    Ok(PreparedWave {
        metadata,
        schema,
        outcome,
    })
}

/// Prepare a wave and report what the load would do. Writes nothing.
pub fn check_wave(
    source: &dyn SurveySource,
    store: &dyn SurveyStore,
    namer: &dyn VariableNamer,
    settings: &WaveSettings,
) -> Result<(PreparedWave, LoadPlan)> {
    let _span = info_span!("run", survey_id = %settings.survey, poll_id = settings.poll_id, dry_run = true)
        .entered();
    let prepared = prepare_wave(source, store, namer, settings)?;
    let plan = LoadCoordinator::new(store)
        .plan(&settings.survey, &prepared.schema)
        .context("plan load")?;
    Ok((prepared, plan))
}

/// Prepare and load a wave.
///
/// Schema drift surfaces as a [`survey_store::LoadError::SchemaDrift`] that
/// callers can recover with `downcast_ref`.
pub fn run_wave(
    source: &dyn SurveySource,
    store: &dyn SurveyStore,
    namer: &dyn VariableNamer,
    settings: &WaveSettings,
) -> Result<WaveResult> {
    let _span =
        info_span!("run", survey_id = %settings.survey, poll_id = settings.poll_id).entered();
    let prepared = prepare_wave(source, store, namer, settings)?;
    let load = LoadCoordinator::new(store)
        .with_max_attempts(settings.commit_attempts)
        .load(
            &settings.survey,
            &prepared.schema,
            &prepared.outcome.rows,
            Some(settings.poll_id),
        )
        .context("load wave")?;
    Ok(WaveResult {
        survey: settings.survey.clone(),
        poll_id: settings.poll_id,
        prepared,
        load,
    })
}
