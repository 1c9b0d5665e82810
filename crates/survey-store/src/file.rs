//! File-backed store.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/<survey_id>/survey.json        manifest: schema, fingerprint, waves
//! <root>/<survey_id>/waves/<n>.json     rows committed with load_counter n
//! <root>/<survey_id>/.lock              advisory lock taken while writing
//! ```
//!
//! The manifest is the commit point. A wave file is written first and only
//! becomes visible once the manifest that lists it has been renamed into
//! place, so an interrupted write leaves the previous state readable.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use survey_model::{CommittedRow, Schema, ValidatedRow};

use crate::error::StoreError;
use crate::store::SurveyStore;
use crate::types::{Precondition, SurveyId, WaveRecord, WriteRequest};

pub const MANIFEST_FILE: &str = "survey.json";
pub const WAVES_DIR: &str = "waves";
pub const LOCK_FILE: &str = ".lock";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Manifest {
    survey_id: SurveyId,
    fingerprint: String,
    schema: Schema,
    waves: Vec<ManifestWave>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ManifestWave {
    #[serde(flatten)]
    record: WaveRecord,
    /// Path of the rows file, relative to the survey directory.
    file: String,
}

/// Exclusive write access to one survey directory.
///
/// An advisory lock on `.lock`, held through the open handle. The OS drops it
/// when the handle closes or the owning process dies, so a lock file left on
/// disk by a killed run does not block later writers.
#[derive(Debug)]
struct SurveyLock {
    file: File,
    path: PathBuf,
}

impl SurveyLock {
    fn acquire(survey: &SurveyId, dir: &Path) -> Result<Self, StoreError> {
        create_dir(dir)?;
        let path = dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|source| StoreError::Io {
                operation: "open lock",
                path: path.clone(),
                source,
            })?;
        match file.try_lock() {
            Ok(()) => Ok(Self { file, path }),
            Err(TryLockError::WouldBlock) => Err(StoreError::Locked {
                survey_id: survey.to_string(),
                path,
            }),
            Err(TryLockError::Error(source)) => Err(StoreError::Io {
                operation: "lock",
                path,
                source,
            }),
        }
    }
}

impl Drop for SurveyLock {
    fn drop(&mut self) {
        if let Err(error) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), %error, "failed to release survey lock");
        }
    }
}

/// Stores each survey as a directory of JSON files.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn survey_dir(&self, survey: &SurveyId) -> PathBuf {
        self.root.join(survey.as_str())
    }

    fn read_manifest(&self, survey: &SurveyId) -> Result<Option<Manifest>, StoreError> {
        let path = self.survey_dir(survey).join(MANIFEST_FILE);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StoreError::Io {
                    operation: "read",
                    path,
                    source,
                });
            }
        };
        let manifest: Manifest = serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::Deserialization { path, source })?;
        if manifest.survey_id != *survey {
            return Err(StoreError::Corrupt {
                survey_id: survey.to_string(),
                reason: format!("manifest belongs to '{}'", manifest.survey_id),
            });
        }
        Ok(Some(manifest))
    }

    fn read_wave(&self, survey: &SurveyId, wave: &ManifestWave) -> Result<Vec<CommittedRow>, StoreError> {
        let path = self.survey_dir(survey).join(&wave.file);
        let bytes = fs::read(&path).map_err(|source| StoreError::Io {
            operation: "read",
            path: path.clone(),
            source,
        })?;
        let rows: Vec<ValidatedRow> = serde_json::from_slice(&bytes)
            .map_err(|source| StoreError::Deserialization { path, source })?;
        if rows.len() != wave.record.rows {
            return Err(StoreError::Corrupt {
                survey_id: survey.to_string(),
                reason: format!(
                    "wave {} lists {} rows but its file holds {}",
                    wave.record.load_counter,
                    wave.record.rows,
                    rows.len()
                ),
            });
        }
        Ok(rows
            .into_iter()
            .map(|row| CommittedRow {
                load_counter: wave.record.load_counter,
                row,
            })
            .collect())
    }
}

impl SurveyStore for FileStore {
    fn get_schema(&self, survey: &SurveyId) -> Result<Option<Schema>, StoreError> {
        Ok(self.read_manifest(survey)?.map(|manifest| manifest.schema))
    }

    fn get_max_load_counter(&self, survey: &SurveyId) -> Result<Option<u64>, StoreError> {
        Ok(self
            .read_manifest(survey)?
            .and_then(|manifest| manifest.waves.last().map(|wave| wave.record.load_counter)))
    }

    fn write(
        &self,
        survey: &SurveyId,
        request: WriteRequest<'_>,
    ) -> Result<WaveRecord, StoreError> {
        let dir = self.survey_dir(survey);
        let _lock = SurveyLock::acquire(survey, &dir)?;

        let current = self.read_manifest(survey)?;
        let stored_fingerprint = current.as_ref().map(|manifest| manifest.fingerprint.as_str());
        let stored_max = current
            .as_ref()
            .and_then(|manifest| manifest.waves.last())
            .map(|wave| wave.record.load_counter);
        if let Some(reason) = request.conflict_with(stored_fingerprint, stored_max) {
            return Err(StoreError::Conflict {
                survey_id: survey.to_string(),
                reason,
            });
        }

        let mut manifest = match (current, request.precondition) {
            (Some(manifest), _) => manifest,
            (None, Precondition::NoHistory) => Manifest {
                survey_id: survey.clone(),
                fingerprint: request.schema.fingerprint(),
                schema: request.schema.clone(),
                waves: Vec::new(),
            },
            (None, Precondition::SchemaMatches { .. }) => {
                return Err(StoreError::Corrupt {
                    survey_id: survey.to_string(),
                    reason: "no manifest for a matching schema".to_string(),
                });
            }
        };

        let file = format!("{WAVES_DIR}/{}.json", request.load_counter);
        let rows = serde_json::to_vec(request.rows).map_err(|source| StoreError::Serialization {
            what: "wave rows",
            source,
        })?;
        write_atomic(&dir.join(&file), &rows)?;

        let record = WaveRecord {
            load_counter: request.load_counter,
            poll_id: request.poll_id,
            rows: request.rows.len(),
            committed_at: Utc::now(),
        };
        manifest.waves.push(ManifestWave {
            record: record.clone(),
            file,
        });
        let bytes =
            serde_json::to_vec_pretty(&manifest).map_err(|source| StoreError::Serialization {
                what: "survey manifest",
                source,
            })?;
        write_atomic(&dir.join(MANIFEST_FILE), &bytes)?;

        tracing::debug!(
            survey_id = %survey,
            load_counter = record.load_counter,
            rows = record.rows,
            "committed wave"
        );
        Ok(record)
    }

    fn waves(&self, survey: &SurveyId) -> Result<Vec<WaveRecord>, StoreError> {
        Ok(self
            .read_manifest(survey)?
            .map(|manifest| manifest.waves.into_iter().map(|wave| wave.record).collect())
            .unwrap_or_default())
    }

    fn rows(&self, survey: &SurveyId) -> Result<Vec<CommittedRow>, StoreError> {
        let Some(manifest) = self.read_manifest(survey)? else {
            return Ok(Vec::new());
        };
        let mut rows = Vec::new();
        for wave in &manifest.waves {
            rows.extend(self.read_wave(survey, wave)?);
        }
        Ok(rows)
    }
}

fn create_dir(dir: &Path) -> Result<(), StoreError> {
    fs::create_dir_all(dir).map_err(|source| StoreError::Io {
        operation: "create directory",
        path: dir.to_path_buf(),
        source,
    })
}

/// Write to a sibling temp file, then rename it over the target.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        create_dir(parent)?;
    }
    let temp_path = path.with_extension("json.tmp");
    let io_error = |operation: &'static str| {
        let temp_path = temp_path.clone();
        move |source| StoreError::Io {
            operation,
            path: temp_path,
            source,
        }
    };
    let mut file = File::create(&temp_path).map_err(io_error("create"))?;
    file.write_all(bytes).map_err(io_error("write"))?;
    file.sync_all().map_err(io_error("sync"))?;
    drop(file);

    fs::rename(&temp_path, path).map_err(|source| StoreError::AtomicWriteFailed {
        temp_path: temp_path.clone(),
        target_path: path.to_path_buf(),
        source,
    })
}
