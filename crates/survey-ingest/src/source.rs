//! Fetch collaborators.

use serde_json::Value;
use std::path::{Path, PathBuf};

use survey_model::ResponseRow;

use crate::error::FetchError;
use crate::results::parse_results_csv;

pub const METADATA_FILE: &str = "questions.json";
pub const RESULTS_CSV_FILE: &str = "results.csv";
pub const RESULTS_JSON_FILE: &str = "results.json";

/// Supplies raw metadata and results for a poll instance.
///
/// Implementations may block; a failure aborts the run before any state
/// changes.
pub trait SurveySource {
    fn fetch_metadata(&self, poll_id: u64) -> Result<Value, FetchError>;

    fn fetch_results(&self, poll_id: u64) -> Result<Vec<ResponseRow>, FetchError>;
}

/// Reads exported poll data from `<root>/<poll_id>/`.
///
/// Metadata comes from `questions.json`. Results come from `results.csv`, or
/// from `results.json` whose `data` field holds the CSV text as the platform
/// API returns it.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn poll_dir(&self, poll_id: u64) -> PathBuf {
        self.root.join(poll_id.to_string())
    }
}

impl SurveySource for DirectorySource {
    fn fetch_metadata(&self, poll_id: u64) -> Result<Value, FetchError> {
        let path = self.poll_dir(poll_id).join(METADATA_FILE);
        let text = read_file(&path)?;
        let payload = serde_json::from_str(&text).map_err(|source| FetchError::Json {
            path: path.clone(),
            source,
        })?;
        tracing::info!(path = %path.display(), "fetched metadata");
        Ok(payload)
    }

    fn fetch_results(&self, poll_id: u64) -> Result<Vec<ResponseRow>, FetchError> {
        let dir = self.poll_dir(poll_id);
        let csv_path = dir.join(RESULTS_CSV_FILE);
        let rows = if csv_path.is_file() {
            parse_results_csv(&read_file(&csv_path)?)?
        } else {
            let json_path = dir.join(RESULTS_JSON_FILE);
            let text = read_file(&json_path)?;
            let payload: Value = serde_json::from_str(&text).map_err(|source| FetchError::Json {
                path: json_path.clone(),
                source,
            })?;
            let data = payload
                .get("data")
                .and_then(Value::as_str)
                .ok_or(FetchError::MissingField {
                    path: json_path,
                    field: "data",
                })?;
            parse_results_csv(data)?
        };
        tracing::info!(poll_id, rows = rows.len(), "fetched results");
        Ok(rows)
    }
}

fn read_file(path: &Path) -> Result<String, FetchError> {
    std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            FetchError::FileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            FetchError::FileRead {
                path: path.to_path_buf(),
                source: e,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_poll_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let source = DirectorySource::new(dir.path());
        let err = source.fetch_metadata(42).unwrap_err();
        assert!(matches!(err, FetchError::FileNotFound { .. }));
        let err = source.fetch_results(42).unwrap_err();
        assert!(matches!(err, FetchError::FileNotFound { .. }));
    }

    #[test]
    fn results_json_requires_data_field() {
        let dir = tempfile::tempdir().unwrap();
        let poll = dir.path().join("5");
        std::fs::create_dir_all(&poll).unwrap();
        std::fs::write(poll.join(RESULTS_JSON_FILE), r#"{"rows": []}"#).unwrap();
        let err = DirectorySource::new(dir.path()).fetch_results(5).unwrap_err();
        assert!(matches!(err, FetchError::MissingField { field: "data", .. }));
    }

    #[test]
    fn results_json_wraps_csv_text() {
        let dir = tempfile::tempdir().unwrap();
        let poll = dir.path().join("5");
        std::fs::create_dir_all(&poll).unwrap();
        std::fs::write(
            poll.join(RESULTS_JSON_FILE),
            r#"{"data": "vID,vCOMPLETED,V1\n1,1,3\n2,0,\n"}"#,
        )
        .unwrap();
        let rows = DirectorySource::new(dir.path()).fetch_results(5).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].answer("V1"), Some("3"));
    }
}
