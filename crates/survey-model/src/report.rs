//! Transformation report: what happened to every input row.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reason a row was excluded during validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    UnknownChoiceCode,
    TypeMismatch,
    OutOfRange,
    OutOfDomain,
}

impl RejectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionKind::UnknownChoiceCode => "unknown_choice_code",
            RejectionKind::TypeMismatch => "type_mismatch",
            RejectionKind::OutOfRange => "out_of_range",
            RejectionKind::OutOfDomain => "out_of_domain",
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One excluded row, with the first offending variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowRejection {
    /// Zero-based index of the row in the fetched batch.
    pub row_index: usize,
    pub respondent_id: Option<String>,
    pub variable: String,
    pub kind: RejectionKind,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformReport {
    pub input_rows: usize,
    pub dropped_empty: usize,
    pub dropped_incomplete: usize,
    /// Choice codes replaced by their label text.
    pub decoded_values: usize,
    /// Rows whose combined "other" slot was split.
    pub other_splits: usize,
    pub rejected: Vec<RowRejection>,
    pub validated_rows: usize,
}

impl TransformReport {
    pub fn filtered(&self) -> usize {
        self.dropped_empty + self.dropped_incomplete
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }

    pub fn rejected_by_kind(&self) -> BTreeMap<RejectionKind, usize> {
        let mut counts = BTreeMap::new();
        for rejection in &self.rejected {
            *counts.entry(rejection.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Every input row is accounted for exactly once.
    pub fn is_balanced(&self) -> bool {
        self.filtered() + self.rejected_count() + self.validated_rows == self.input_rows
    }
}
