//! Inferred question types.
//!
//! The taxonomy is closed: every question either lands in one of these
//! variants or is rejected during inference.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::metadata::InputKind;
use crate::variable::DataKind;

/// Token used in type names when an input slot declares no input kind.
const UNCONSTRAINED_INPUT: &str = "text";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum QuestionType {
    /// One free-entry slot.
    InputSingle(Option<InputKind>),
    /// Several free-entry slots of the same kind, one per group.
    InputMultiple(Option<InputKind>),
    /// Pick exactly one label.
    SingleChoice,
    /// Pick any subset of labels; one boolean per label.
    MultipleChoice,
    /// Like `MultipleChoice`, plus a free-text "other" slot.
    MultipleChoiceOther,
    /// One integer on a declared scale.
    Scale,
    /// Several statements rated on a shared integer scale.
    Matrix,
}

impl QuestionType {
    pub fn name(&self) -> String {
        match self {
            QuestionType::InputSingle(kind) => format!("input_single_{}", input_token(*kind)),
            QuestionType::InputMultiple(kind) => {
                format!("input_multiple_{}", input_token(*kind))
            }
            QuestionType::SingleChoice => "single_choice".to_string(),
            QuestionType::MultipleChoice => "multiple_choice".to_string(),
            QuestionType::MultipleChoiceOther => "multiple_choice_other".to_string(),
            QuestionType::Scale => "scale".to_string(),
            QuestionType::Matrix => "matrix".to_string(),
        }
    }

    /// Data kind of the question's regular answer variables.
    ///
    /// The free-text slot of `MultipleChoiceOther` is the one exception and
    /// is typed separately by the inference engine.
    pub fn answer_kind(&self) -> DataKind {
        match self {
            QuestionType::InputSingle(Some(InputKind::Integer))
            | QuestionType::InputMultiple(Some(InputKind::Integer))
            | QuestionType::Scale
            | QuestionType::Matrix => DataKind::Integer,
            QuestionType::InputSingle(_)
            | QuestionType::InputMultiple(_)
            | QuestionType::SingleChoice => DataKind::String,
            QuestionType::MultipleChoice | QuestionType::MultipleChoiceOther => DataKind::Boolean,
        }
    }

    /// Attach the declared input kind to an input shape; other shapes are
    /// returned unchanged.
    pub fn with_input_kind(self, kind: Option<InputKind>) -> Self {
        match self {
            QuestionType::InputSingle(_) => QuestionType::InputSingle(kind),
            QuestionType::InputMultiple(_) => QuestionType::InputMultiple(kind),
            other => other,
        }
    }

    /// True for shapes whose variables carry a numeric range.
    pub fn is_ranged(&self) -> bool {
        matches!(self, QuestionType::Scale | QuestionType::Matrix)
    }

    /// True for shapes whose raw values are choice codes.
    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            QuestionType::SingleChoice
                | QuestionType::MultipleChoice
                | QuestionType::MultipleChoiceOther
        )
    }
}

fn input_token(kind: Option<InputKind>) -> &'static str {
    kind.map_or(UNCONSTRAINED_INPUT, |kind| kind.as_str())
}

fn parse_input_token(token: &str) -> Result<Option<InputKind>, String> {
    if token == UNCONSTRAINED_INPUT {
        return Ok(None);
    }
    token.parse::<InputKind>().map(Some)
}

impl fmt::Display for QuestionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl FromStr for QuestionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "single_choice" => return Ok(QuestionType::SingleChoice),
            "multiple_choice" => return Ok(QuestionType::MultipleChoice),
            "multiple_choice_other" => return Ok(QuestionType::MultipleChoiceOther),
            "scale" => return Ok(QuestionType::Scale),
            "matrix" => return Ok(QuestionType::Matrix),
            _ => {}
        }
        if let Some(token) = normalized.strip_prefix("input_single_") {
            return parse_input_token(token).map(QuestionType::InputSingle);
        }
        if let Some(token) = normalized.strip_prefix("input_multiple_") {
            return parse_input_token(token).map(QuestionType::InputMultiple);
        }
        Err(format!("Unknown question type: {s}"))
    }
}

impl TryFrom<String> for QuestionType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<QuestionType> for String {
    fn from(value: QuestionType) -> Self {
        value.name()
    }
}
