//! Error types for inference, naming and schema building.

use std::path::PathBuf;
use thiserror::Error;

use survey_model::SchemaError;

use crate::classify::QuestionShape;

/// Structural failures while turning metadata into a schema. All are fatal.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// The question's shape has no entry in the decision table, or violates
    /// a convention of the shape it resembles.
    #[error("unsupported question shape {shape}{}: {reason}", question(*question_id))]
    UnsupportedQuestionShape {
        question_id: Option<i64>,
        shape: QuestionShape,
        reason: String,
    },

    /// A scale or matrix question declares no numeric bounds.
    #[error("question {question_id}, group {group_index} has no numeric range")]
    MissingRange {
        question_id: i64,
        group_index: usize,
    },

    /// The groups of a multi-slot input question declare different input kinds.
    #[error("question {question_id} mixes input kinds across groups: {kinds}")]
    InconsistentInputKinds { question_id: i64, kinds: String },

    /// Disambiguating a variable name produced a name that is already taken.
    #[error("duplicate variable name '{name}' in question {question_id}")]
    DuplicateVariableName { question_id: i64, name: String },

    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl InferenceError {
    /// Attach the question id to a shape error raised by pure classification.
    pub fn for_question(self, id: i64) -> Self {
        match self {
            InferenceError::UnsupportedQuestionShape {
                question_id: None,
                shape,
                reason,
            } => InferenceError::UnsupportedQuestionShape {
                question_id: Some(id),
                shape,
                reason,
            },
            other => other,
        }
    }
}

fn question(question_id: Option<i64>) -> String {
    question_id
        .map(|id| format!(" in question {id}"))
        .unwrap_or_default()
}

/// Failures of the naming collaborator. Never fatal; callers fall back to
/// deterministic names.
#[derive(Debug, Error)]
pub enum NamingError {
    #[error("naming service unavailable: {message}")]
    Unavailable { message: String },

    #[error("failed to read name suggestions {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode name suggestions {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
