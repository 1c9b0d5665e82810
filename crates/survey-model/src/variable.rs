//! Output variables: one variable per output column.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::metadata::NumericRange;
use crate::question_type::QuestionType;

/// Semantic data kind of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    String,
    Integer,
    Boolean,
}

impl DataKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataKind::String => "string",
            DataKind::Integer => "integer",
            DataKind::Boolean => "boolean",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "string" | "text" => Ok(DataKind::String),
            "integer" | "int" | "int64" => Ok(DataKind::Integer),
            "boolean" | "bool" => Ok(DataKind::Boolean),
            _ => Err(format!("Unknown data kind: {s}")),
        }
    }
}

/// Role a variable plays within its question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableRole {
    #[default]
    Answer,
    /// "Was the other option selected" flag of a `multiple_choice_other` question.
    OtherFlag,
    /// Free text typed into the other option.
    OtherText,
}

/// One allowed value of a choice variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Choice {
    pub code: String,
    pub label: String,
}

impl Choice {
    pub fn new(code: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            label: label.into(),
        }
    }
}

/// Fixed, ordered set of values a variable may take.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValueDomain {
    choices: Vec<Choice>,
}

impl ValueDomain {
    pub fn new(choices: Vec<Choice>) -> Self {
        Self { choices }
    }

    pub fn choices(&self) -> &[Choice] {
        &self.choices
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// Decode a raw code to its label. Codes are compared after trimming.
    pub fn label_for(&self, code: &str) -> Option<&str> {
        let code = code.trim();
        self.choices
            .iter()
            .find(|choice| choice.code == code)
            .map(|choice| choice.label.as_str())
    }

    pub fn contains_label(&self, label: &str) -> bool {
        self.choices.iter().any(|choice| choice.label == label)
    }

    /// Order-insensitive view used for equivalence checks.
    pub fn as_set(&self) -> BTreeSet<&Choice> {
        self.choices.iter().collect()
    }
}

/// The unit of analysis; one output column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    /// Stable output name, unique within a schema.
    pub name: String,
    /// Platform varname the values are read from.
    pub source: String,
    pub kind: DataKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<NumericRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<ValueDomain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub question_id: i64,
    pub question_position: usize,
    pub group_index: usize,
    pub question_type: QuestionType,
    pub question_text: String,
    #[serde(default)]
    pub role: VariableRole,
    /// Labels of the scale points for matrix statements.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scale_labels: Vec<String>,
}

impl Variable {
    /// The attributes that take part in schema equivalence.
    pub fn signature(&self) -> VariableSignature {
        VariableSignature {
            name: self.name.clone(),
            kind: self.kind,
            range: self.range,
            domain: self
                .domain
                .as_ref()
                .map(|domain| domain.as_set().into_iter().cloned().collect()),
        }
    }
}

/// Equivalence-relevant projection of a [`Variable`].
///
/// The domain is held as a set so that two schemas listing the same choices
/// in a different order compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariableSignature {
    pub name: String,
    pub kind: DataKind,
    pub range: Option<NumericRange>,
    pub domain: Option<BTreeSet<Choice>>,
}

impl fmt::Display for VariableSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.kind)?;
        if let Some(range) = &self.range {
            write!(f, " range {range}")?;
        }
        if let Some(domain) = &self.domain {
            let labels: Vec<String> = domain
                .iter()
                .map(|choice| format!("{}={}", choice.code, choice.label))
                .collect();
            write!(f, " domain [{}]", labels.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_decodes_trimmed_codes() {
        let domain = ValueDomain::new(vec![Choice::new("1", "Ja"), Choice::new("2", "Nein")]);
        assert_eq!(domain.label_for(" 2 "), Some("Nein"));
        assert_eq!(domain.label_for("3"), None);
        assert!(domain.contains_label("Ja"));
    }

    #[test]
    fn data_kind_parses_aliases() {
        assert_eq!("Int64".parse::<DataKind>().unwrap(), DataKind::Integer);
        assert_eq!("bool".parse::<DataKind>().unwrap(), DataKind::Boolean);
        assert!("float".parse::<DataKind>().is_err());
    }
}
