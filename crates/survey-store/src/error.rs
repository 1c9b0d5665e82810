//! Storage and load errors.

use std::path::PathBuf;
use thiserror::Error;

use survey_model::SchemaDiff;

/// Storage collaborator failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid survey id '{survey_id}': {reason}")]
    InvalidSurveyId { survey_id: String, reason: String },

    #[error("failed to {operation} {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The temp file was written but could not replace the target.
    #[error("failed to commit {target_path}")]
    AtomicWriteFailed {
        temp_path: PathBuf,
        target_path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize {what}")]
    Serialization {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to read stored data at {path}")]
    Deserialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Another run holds the lock for this survey.
    #[error("survey '{survey_id}' is locked by another run ({path})")]
    Locked { survey_id: String, path: PathBuf },

    /// The write precondition no longer holds; re-plan and retry.
    #[error("concurrent change to survey '{survey_id}': {reason}")]
    Conflict { survey_id: String, reason: String },

    #[error("stored history for survey '{survey_id}' is inconsistent: {reason}")]
    Corrupt { survey_id: String, reason: String },
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// A hint for resolving this error, when one exists.
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::InvalidSurveyId { .. } => {
                Some("Survey ids may only contain letters, digits, '_' and '-'.".into())
            }
            Self::Io { operation, .. } => {
                if *operation == "read" {
                    Some("Check that the store directory exists and is readable.".into())
                } else {
                    Some("Check that you have permission to write to the store directory.".into())
                }
            }
            Self::AtomicWriteFailed { .. } => {
                Some("Free up disk space; the previous commit is still intact.".into())
            }
            Self::Locked { .. } => Some(
                "Wait for the other run to finish; its lock is released when it exits.".into(),
            ),
            Self::Conflict { .. } => Some("Re-run the load; it will re-plan from storage.".into()),
            Self::Serialization { .. } | Self::Deserialization { .. } | Self::Corrupt { .. } => {
                None
            }
        }
    }
}

/// Load coordination failure. Every variant leaves storage untouched.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The freshly inferred schema differs from the stored one.
    #[error("schema drift for survey '{survey_id}' ({} variable(s) differ):\n{diff}", .diff.len())]
    SchemaDrift { survey_id: String, diff: SchemaDiff },

    #[error("survey '{survey_id}' kept changing; gave up after {attempts} commit attempt(s)")]
    RetriesExhausted { survey_id: String, attempts: u32 },

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LoadError {
    pub fn is_drift(&self) -> bool {
        matches!(self, Self::SchemaDrift { .. })
    }
}
