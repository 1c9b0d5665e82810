//! Survey identity, wave records and write requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use survey_model::{Schema, ValidatedRow};

use crate::error::StoreError;

/// Stable identity of a survey across poll instances.
///
/// Used as a directory name by the file store, so only ASCII letters,
/// digits, `_` and `-` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SurveyId(String);

impl SurveyId {
    pub fn new(id: impl Into<String>) -> Result<Self, StoreError> {
        let id = id.into();
        let reason = if id.is_empty() {
            Some("must not be empty")
        } else if !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            Some("only ASCII letters, digits, '_' and '-' are allowed")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(StoreError::InvalidSurveyId {
                survey_id: id,
                reason: reason.to_string(),
            }),
            None => Ok(Self(id)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SurveyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SurveyId {
    type Error = StoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SurveyId> for String {
    fn from(value: SurveyId) -> Self {
        value.0
    }
}

/// One committed wave.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaveRecord {
    pub load_counter: u64,
    /// Poll instance the rows were fetched from.
    pub poll_id: Option<u64>,
    pub rows: usize,
    pub committed_at: DateTime<Utc>,
}

/// State the store must still be in for a write to commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Precondition {
    /// No schema is stored for the survey.
    NoHistory,
    /// The stored schema has this fingerprint and the latest wave has this
    /// counter.
    SchemaMatches {
        fingerprint: String,
        max_load_counter: u64,
    },
}

/// A wave to append.
#[derive(Debug, Clone, Copy)]
pub struct WriteRequest<'a> {
    /// Persisted only under [`Precondition::NoHistory`].
    pub schema: &'a Schema,
    pub rows: &'a [ValidatedRow],
    pub load_counter: u64,
    pub poll_id: Option<u64>,
    pub precondition: &'a Precondition,
}

impl WriteRequest<'_> {
    /// Check the request against the stored state, returning the reason it
    /// cannot commit.
    pub(crate) fn conflict_with(
        &self,
        stored_fingerprint: Option<&str>,
        stored_max: Option<u64>,
    ) -> Option<String> {
        match (self.precondition, stored_fingerprint) {
            (Precondition::NoHistory, None) => {
                (self.load_counter != 0).then(|| {
                    format!("first wave must use load_counter 0, not {}", self.load_counter)
                })
            }
            (Precondition::NoHistory, Some(_)) => {
                Some("a schema was stored since the load was planned".to_string())
            }
            (Precondition::SchemaMatches { .. }, None) => {
                Some("the stored schema disappeared since the load was planned".to_string())
            }
            (
                Precondition::SchemaMatches {
                    fingerprint,
                    max_load_counter,
                },
                Some(stored),
            ) => {
                if fingerprint != stored {
                    Some("the stored schema changed since the load was planned".to_string())
                } else if stored_max != Some(*max_load_counter) {
                    Some(format!(
                        "latest load_counter is {stored_max:?}, planned against {max_load_counter}"
                    ))
                } else if self.load_counter != max_load_counter + 1 {
                    Some(format!(
                        "load_counter {} does not follow {max_load_counter}",
                        self.load_counter
                    ))
                } else {
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn survey_ids_are_path_safe() {
        assert!(SurveyId::new("employee-survey_2024").is_ok());
        assert!(SurveyId::new("").is_err());
        assert!(SurveyId::new("../etc").is_err());
        assert!(SurveyId::new("a b").is_err());
    }

    #[test]
    fn survey_id_serde_validates() {
        let id: SurveyId = serde_json::from_str("\"demo\"").unwrap();
        assert_eq!(id.as_str(), "demo");
        assert!(serde_json::from_str::<SurveyId>("\"no/slash\"").is_err());
    }

    #[test]
    fn preconditions() {
        let schema = Schema::new(Vec::new()).unwrap();
        let first = WriteRequest {
            schema: &schema,
            rows: &[],
            load_counter: 0,
            poll_id: None,
            precondition: &Precondition::NoHistory,
        };
        assert_eq!(first.conflict_with(None, None), None);
        assert!(first.conflict_with(Some("abc"), Some(0)).is_some());

        let matches = Precondition::SchemaMatches {
            fingerprint: "abc".to_string(),
            max_load_counter: 2,
        };
        let next = WriteRequest {
            load_counter: 3,
            precondition: &matches,
            ..first
        };
        assert_eq!(next.conflict_with(Some("abc"), Some(2)), None);
        assert!(next.conflict_with(Some("abc"), Some(3)).is_some());
        assert!(next.conflict_with(Some("def"), Some(2)).is_some());
        assert!(next.conflict_with(None, None).is_some());
    }
}
