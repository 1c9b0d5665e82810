//! Response rows before and after validation.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// System columns the platform attaches to every respondent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespondentMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

/// One respondent's raw answers, keyed by platform varname.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRow {
    pub respondent: RespondentMeta,
    pub answers: BTreeMap<String, String>,
}

impl ResponseRow {
    pub fn answer(&self, varname: &str) -> Option<&str> {
        self.answers.get(varname).map(String::as_str)
    }

    /// True when every answer slot is blank after trimming.
    pub fn is_blank(&self) -> bool {
        self.answers.values().all(|value| value.trim().is_empty())
    }

    /// True when the platform flagged the response as not completed.
    pub fn is_marked_incomplete(&self) -> bool {
        self.respondent
            .completed
            .as_deref()
            .is_some_and(|value| value.trim() == "0")
    }
}

/// A typed cell of a validated row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            CellValue::Boolean(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            CellValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => Ok(()),
            CellValue::Boolean(value) => write!(f, "{value}"),
            CellValue::Integer(value) => write!(f, "{value}"),
            CellValue::Text(value) => f.write_str(value),
        }
    }
}

/// A response row decoded and typed against a schema, keyed by variable name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedRow {
    pub respondent: RespondentMeta,
    pub values: BTreeMap<String, CellValue>,
}

impl ValidatedRow {
    pub fn get(&self, variable: &str) -> Option<&CellValue> {
        self.values.get(variable)
    }
}

/// A validated row as persisted, tagged with the wave that wrote it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommittedRow {
    pub load_counter: u64,
    #[serde(flatten)]
    pub row: ValidatedRow,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(answers: &[(&str, &str)], completed: Option<&str>) -> ResponseRow {
        ResponseRow {
            respondent: RespondentMeta {
                completed: completed.map(str::to_string),
                ..RespondentMeta::default()
            },
            answers: answers
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        }
    }

    #[test]
    fn blank_rows_ignore_whitespace() {
        assert!(row(&[("V1", " "), ("V2", "")], None).is_blank());
        assert!(!row(&[("V1", "2")], None).is_blank());
        assert!(row(&[], None).is_blank());
    }

    #[test]
    fn only_explicit_zero_marks_incomplete() {
        assert!(row(&[], Some("0")).is_marked_incomplete());
        assert!(!row(&[], Some("1")).is_marked_incomplete());
        assert!(!row(&[], None).is_marked_incomplete());
    }

    #[test]
    fn cell_values_serialize_untagged() {
        let values = vec![
            CellValue::Null,
            CellValue::Boolean(true),
            CellValue::Integer(4),
            CellValue::Text("Berlin".to_string()),
        ];
        let json = serde_json::to_string(&values).unwrap();
        assert_eq!(json, r#"[null,true,4,"Berlin"]"#);
        let back: Vec<CellValue> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, values);
    }
}
