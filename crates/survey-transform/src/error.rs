//! Error types for row validation and frame export.

use thiserror::Error;

use survey_model::{DataKind, NumericRange, RejectionKind};

/// Why a single row was excluded. Recovered locally; never aborts a batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("'{variable}': code '{code}' is not in the choice domain")]
    UnknownChoiceCode { variable: String, code: String },

    #[error("'{variable}': '{value}' is not a valid {expected}")]
    TypeMismatch {
        variable: String,
        value: String,
        expected: DataKind,
    },

    #[error("'{variable}': {value} is outside {range}")]
    OutOfRange {
        variable: String,
        value: i64,
        range: NumericRange,
    },

    #[error("'{variable}': '{value}' is not an allowed value")]
    OutOfDomain { variable: String, value: String },
}

impl RowError {
    pub fn kind(&self) -> RejectionKind {
        match self {
            RowError::UnknownChoiceCode { .. } => RejectionKind::UnknownChoiceCode,
            RowError::TypeMismatch { .. } => RejectionKind::TypeMismatch,
            RowError::OutOfRange { .. } => RejectionKind::OutOfRange,
            RowError::OutOfDomain { .. } => RejectionKind::OutOfDomain,
        }
    }

    pub fn variable(&self) -> &str {
        match self {
            RowError::UnknownChoiceCode { variable, .. }
            | RowError::TypeMismatch { variable, .. }
            | RowError::OutOfRange { variable, .. }
            | RowError::OutOfDomain { variable, .. } => variable,
        }
    }
}

/// Failure to assemble a DataFrame from validated rows.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("DataFrame operation failed: {message}")]
    DataFrame { message: String },
}

impl From<polars::prelude::PolarsError> for FrameError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        Self::DataFrame {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_errors_map_to_rejection_kinds() {
        let err = RowError::OutOfRange {
            variable: "Q8".to_string(),
            value: 11,
            range: NumericRange::new(0, 10),
        };
        assert_eq!(err.kind(), RejectionKind::OutOfRange);
        assert_eq!(err.variable(), "Q8");
        assert_eq!(err.to_string(), "'Q8': 11 is outside 0..=10");
    }

    #[test]
    fn frame_error_from_polars() {
        let polars_err = polars::prelude::PolarsError::ColumnNotFound("Q1".into());
        let err: FrameError = polars_err.into();
        assert!(matches!(err, FrameError::DataFrame { .. }));
    }
}
