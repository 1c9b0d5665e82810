//! Survey metadata entity graph.
//!
//! The graph is a plain owned tree: a [`SurveyMetadata`] owns its questions,
//! each [`Question`] owns its groups, and each [`Group`] owns its varnames,
//! items and labels. Nothing points back up the tree; consumers that need the
//! originating question carry it alongside the group they are looking at.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Raw question type as reported by the survey platform.
///
/// Only the four types with a known variable layout are named. Anything else
/// is preserved verbatim so the inference engine can reject it with the
/// offending shape instead of the parser failing on an unknown string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PlatformType {
    Input,
    Choice,
    Scale,
    Matrix,
    Other(String),
}

impl PlatformType {
    pub fn as_str(&self) -> &str {
        match self {
            PlatformType::Input => "INPUT",
            PlatformType::Choice => "CHOICE",
            PlatformType::Scale => "SCALE",
            PlatformType::Matrix => "MATRIX",
            PlatformType::Other(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for PlatformType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for PlatformType {
    fn from(raw: String) -> Self {
        match raw.trim().to_uppercase().as_str() {
            "INPUT" => PlatformType::Input,
            "CHOICE" => PlatformType::Choice,
            "SCALE" => PlatformType::Scale,
            "MATRIX" => PlatformType::Matrix,
            _ => PlatformType::Other(raw),
        }
    }
}

impl From<PlatformType> for String {
    fn from(value: PlatformType) -> Self {
        value.as_str().to_string()
    }
}

/// Expected input shape of a free-entry slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InputKind {
    SingleLine,
    MultiLine,
    Integer,
}

impl InputKind {
    /// Lowercase token used inside inferred question type names.
    pub fn as_str(&self) -> &'static str {
        match self {
            InputKind::SingleLine => "singleline",
            InputKind::MultiLine => "multiline",
            InputKind::Integer => "integer",
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "SINGLELINE" => Ok(InputKind::SingleLine),
            "MULTILINE" => Ok(InputKind::MultiLine),
            "INTEGER" => Ok(InputKind::Integer),
            _ => Err(format!("Unknown input type: {s}")),
        }
    }
}

/// Inclusive numeric bounds declared by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: i64,
    pub max: i64,
}

impl NumericRange {
    pub fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: i64) -> bool {
        value >= self.min && value <= self.max
    }
}

impl fmt::Display for NumericRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.min, self.max)
    }
}

/// The atomic answer slot that becomes one output column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Varname(String);

impl Varname {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Varname {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Expected input shape for a varname.
///
/// `input_type` and `range` may both be absent; absence means the item puts
/// no further constraint on the slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    pub id: Option<String>,
    pub name: Option<String>,
    pub input_type: Option<InputKind>,
    pub range: Option<NumericRange>,
}

/// An enumerable answer option.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Label {
    pub text: Option<String>,
}

impl Label {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
        }
    }

    /// Label text, or the empty string when the platform sent none.
    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

/// Structural subdivision of a question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Group {
    /// Zero-based position of the group within its question.
    pub index: usize,
    pub name: Option<String>,
    pub varnames: Vec<Varname>,
    pub items: Vec<Item>,
    pub labels: Vec<Label>,
    /// Explicit answer codes, parallel to `labels` when present.
    pub codes: Vec<String>,
    pub input_type: Option<InputKind>,
    pub range: Option<NumericRange>,
}

impl Group {
    /// Input kind of the group: the first item's declared kind, else the
    /// group-level declaration.
    pub fn effective_input_type(&self) -> Option<InputKind> {
        self.items
            .iter()
            .find_map(|item| item.input_type)
            .or(self.input_type)
    }

    /// Numeric bounds of the group: the first item's declared range, else the
    /// group-level declaration.
    pub fn effective_range(&self) -> Option<NumericRange> {
        self.items.iter().find_map(|item| item.range).or(self.range)
    }
}

/// One task unit of the survey.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: i64,
    pub platform_type: PlatformType,
    pub text: String,
    /// 1-based position of the question across the whole survey.
    pub position: usize,
    /// Position within its section, as reported by the platform.
    pub relative_position: Option<i64>,
    /// 1-based page number, derived from the rank of the platform page id.
    pub page_number: usize,
    pub groups: Vec<Group>,
}

impl Question {
    /// Base variable name shared by every variable of this question.
    pub fn base_name(&self) -> String {
        format!("Q{}", self.position)
    }

    pub fn varname_count(&self) -> usize {
        self.groups.iter().map(|group| group.varnames.len()).sum()
    }
}

/// Parsed metadata of one poll instance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SurveyMetadata {
    pub questions: Vec<Question>,
}

impl SurveyMetadata {
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn varname_count(&self) -> usize {
        self.questions.iter().map(Question::varname_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_type_round_trips_unknown_values() {
        assert_eq!(PlatformType::from("choice".to_string()), PlatformType::Choice);
        let other = PlatformType::from("RANKING".to_string());
        assert_eq!(other, PlatformType::Other("RANKING".to_string()));
        assert_eq!(String::from(other), "RANKING");
    }

    #[test]
    fn group_prefers_item_level_declarations() {
        let group = Group {
            input_type: Some(InputKind::SingleLine),
            range: Some(NumericRange::new(0, 10)),
            items: vec![Item {
                input_type: Some(InputKind::Integer),
                range: Some(NumericRange::new(1, 5)),
                ..Item::default()
            }],
            ..Group::default()
        };
        assert_eq!(group.effective_input_type(), Some(InputKind::Integer));
        assert_eq!(group.effective_range(), Some(NumericRange::new(1, 5)));

        let bare = Group {
            input_type: Some(InputKind::MultiLine),
            items: vec![Item::default()],
            ..Group::default()
        };
        assert_eq!(bare.effective_input_type(), Some(InputKind::MultiLine));
        assert_eq!(bare.effective_range(), None);
    }
}
