//! Error types for metadata parsing and result fetching.

use std::path::PathBuf;
use thiserror::Error;

/// Structural problems in a raw metadata payload.
#[derive(Debug, Error)]
pub enum MetadataError {
    /// A required field is missing or a group's counts are inconsistent.
    #[error("malformed metadata{}: {reason}", location(*question_id, *group_index))]
    Malformed {
        question_id: Option<i64>,
        group_index: Option<usize>,
        reason: String,
    },

    /// The payload is not valid JSON for the expected layout.
    #[error("metadata payload could not be decoded: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
    },
}

impl MetadataError {
    pub(crate) fn question(question_id: Option<i64>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            question_id,
            group_index: None,
            reason: reason.into(),
        }
    }

    pub(crate) fn group(question_id: Option<i64>, group_index: usize, reason: impl Into<String>) -> Self {
        Self::Malformed {
            question_id,
            group_index: Some(group_index),
            reason: reason.into(),
        }
    }
}

fn location(question_id: Option<i64>, group_index: Option<usize>) -> String {
    match (question_id, group_index) {
        (Some(question), Some(group)) => format!(" in question {question}, group {group}"),
        (Some(question), None) => format!(" in question {question}"),
        (None, Some(group)) => format!(" in group {group}"),
        (None, None) => String::new(),
    }
}

/// Failures of the fetch collaborators. All of them abort the run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("source file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to read {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("results payload in {path} has no '{field}' field")]
    MissingField { path: PathBuf, field: &'static str },

    #[error("failed to parse results CSV: {message}")]
    Csv { message: String },
}

impl From<csv::Error> for FetchError {
    fn from(err: csv::Error) -> Self {
        Self::Csv {
            message: err.to_string(),
        }
    }
}
