use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use survey_cli::config::EtlConfig;
use survey_cli::pipeline::{WaveSettings, build_namer, check_wave, infer_schema, run_wave};
use survey_ingest::DirectorySource;
use survey_store::{FileStore, LoadPlan, MemoryStore, SurveyStore};
use survey_transform::committed_frame;

use crate::cli::{ShowArgs, SurveyArgs, WaveArgs};
use crate::summary::{print_history, print_plan, print_schema, print_wave_summary};

/// Committed, or the command finished.
pub const EXIT_OK: i32 = 0;
/// Aborted with a diagnostic.
pub const EXIT_FAILED: i32 = 1;
/// Aborted with a schema drift report.
pub const EXIT_DRIFT: i32 = 2;

fn wave_settings(config: &EtlConfig) -> Result<WaveSettings> {
    Ok(WaveSettings {
        survey: config.survey_id()?,
        poll_id: config.poll_id()?,
        parse: config.parse_options(),
        commit_attempts: config.commit_attempts(),
    })
}

pub fn run_run(config_path: Option<&Path>, args: &WaveArgs) -> Result<i32> {
    let config = EtlConfig::load(config_path, &args.overrides())?;
    let settings = wave_settings(&config)?;
    let source = DirectorySource::new(config.source_dir()?);
    let store = FileStore::new(config.store_dir()?);
    let namer = build_namer(config.suggestions())?;

    let result = run_wave(&source, &store, namer.as_ref(), &settings)?;
    print_wave_summary(
        &result.survey,
        result.poll_id,
        &result.prepared,
        Some(&result.load),
    );
    Ok(EXIT_OK)
}

pub fn run_check(config_path: Option<&Path>, args: &WaveArgs) -> Result<i32> {
    let config = EtlConfig::load(config_path, &args.overrides())?;
    let settings = wave_settings(&config)?;
    let source = DirectorySource::new(config.source_dir()?);
    let store = FileStore::new(config.store_dir()?);
    let namer = build_namer(config.suggestions())?;

    let (prepared, plan) = check_wave(&source, &store, namer.as_ref(), &settings)?;
    print_wave_summary(&settings.survey, settings.poll_id, &prepared, None);
    print_plan(&plan);
    Ok(match plan {
        LoadPlan::HistoryMismatch { .. } => EXIT_DRIFT,
        _ => EXIT_OK,
    })
}

/// Pins names from the store when one is configured.
pub fn run_schema(config_path: Option<&Path>, args: &WaveArgs) -> Result<()> {
    let config = EtlConfig::load(config_path, &args.overrides())?;
    let settings = wave_settings(&config)?;
    let source = DirectorySource::new(config.source_dir()?);
    let namer = build_namer(config.suggestions())?;

    let store: Box<dyn SurveyStore> = match config.store.dir.as_deref() {
        Some(dir) => Box::new(FileStore::new(dir)),
        None => Box::new(MemoryStore::new()),
    };
    let (metadata, schema) = infer_schema(&source, store.as_ref(), namer.as_ref(), &settings)?;
    info!(questions = metadata.questions.len(), "inferred schema");
    print_schema(&schema);
    Ok(())
}

pub fn run_history(config_path: Option<&Path>, args: &SurveyArgs) -> Result<()> {
    let config = EtlConfig::load(config_path, &args.overrides())?;
    let survey = config.survey_id()?;
    let store = FileStore::new(config.store_dir()?);
    let waves = store.waves(&survey).context("read wave history")?;
    print_history(&survey, &waves);
    Ok(())
}

pub fn run_show(config_path: Option<&Path>, args: &ShowArgs) -> Result<()> {
    let config = EtlConfig::load(config_path, &args.survey.overrides())?;
    let survey = config.survey_id()?;
    let store = FileStore::new(config.store_dir()?);
    let Some(schema) = store.get_schema(&survey).context("read stored schema")? else {
        println!("Survey {survey} has no committed waves.");
        return Ok(());
    };
    let rows: Vec<_> = store
        .rows(&survey)
        .context("read committed rows")?
        .into_iter()
        .filter(|row| {
            args.load_counter
                .is_none_or(|counter| row.load_counter == counter)
        })
        .collect();
    let frame = committed_frame(&rows, &schema).context("build frame")?;
    println!("{}", frame.head(Some(args.limit)));
    println!("{} row(s)", frame.height());
    Ok(())
}
