//! Structural classification of questions.
//!
//! The question type is a pure function of the platform type, the number of
//! groups and the number of varnames in each group. Label text never takes
//! part in the decision.

use std::fmt;

use survey_model::{PlatformType, Question, QuestionType};

use crate::error::InferenceError;

/// The classification triple of a question.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QuestionShape {
    pub platform: PlatformType,
    pub vars_per_group: Vec<usize>,
}

impl QuestionShape {
    pub fn new(platform: PlatformType, vars_per_group: Vec<usize>) -> Self {
        Self {
            platform,
            vars_per_group,
        }
    }

    pub fn of(question: &Question) -> Self {
        Self::new(
            question.platform_type.clone(),
            question.groups.iter().map(|group| group.varnames.len()).collect(),
        )
    }

    pub fn groups(&self) -> usize {
        self.vars_per_group.len()
    }
}

impl fmt::Display for QuestionShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {} groups, varnames per group {:?})",
            self.platform,
            self.groups(),
            self.vars_per_group
        )
    }
}

/// Classify a question by its structural triple.
///
/// | Platform | Groups | Varnames per group | Type |
/// |---|---|---|---|
/// | INPUT | 1 | 1 | `input_single_<kind>` |
/// | INPUT | >1 | 1 each | `input_multiple_<kind>` |
/// | CHOICE | 1 | 1 | `single_choice` |
/// | CHOICE | 1 | >1 | `multiple_choice` |
/// | CHOICE | 2 | >1, then 1 | `multiple_choice_other` |
/// | SCALE | 1 | 1 | `scale` |
/// | MATRIX | 1 | >1 | `matrix` |
///
/// Input types come back without an input kind; the kind is read from the
/// question's items afterwards.
pub fn infer_question_type(
    platform: &PlatformType,
    groups: usize,
    vars_per_group: &[usize],
) -> Result<QuestionType, InferenceError> {
    let unsupported = |reason: &str| InferenceError::UnsupportedQuestionShape {
        question_id: None,
        shape: QuestionShape::new(platform.clone(), vars_per_group.to_vec()),
        reason: reason.to_string(),
    };

    if groups != vars_per_group.len() {
        return Err(unsupported("group count disagrees with the per-group varname counts"));
    }

    let question_type = match (platform, vars_per_group) {
        (PlatformType::Input, [1]) => QuestionType::InputSingle(None),
        (PlatformType::Input, counts) if counts.len() > 1 && counts.iter().all(|&n| n == 1) => {
            QuestionType::InputMultiple(None)
        }
        (PlatformType::Choice, [1]) => QuestionType::SingleChoice,
        (PlatformType::Choice, [n]) if *n > 1 => QuestionType::MultipleChoice,
        (PlatformType::Choice, [n, 1]) if *n > 1 => QuestionType::MultipleChoiceOther,
        (PlatformType::Scale, [1]) => QuestionType::Scale,
        (PlatformType::Matrix, [n]) if *n > 1 => QuestionType::Matrix,
        _ => return Err(unsupported("no matching question type")),
    };
    Ok(question_type)
}

/// Classify a parsed question, including the input kind for input shapes.
pub fn classify_question(question: &Question) -> Result<QuestionType, InferenceError> {
    let shape = QuestionShape::of(question);
    let question_type = infer_question_type(&shape.platform, shape.groups(), &shape.vars_per_group)
        .map_err(|err| err.for_question(question.id))?;

    match question_type {
        QuestionType::InputSingle(_) | QuestionType::InputMultiple(_) => {
            let kinds: Vec<_> = question
                .groups
                .iter()
                .map(survey_model::Group::effective_input_type)
                .collect();
            let first = kinds.first().copied().flatten();
            if kinds.iter().any(|kind| *kind != first) {
                let listed: Vec<String> = kinds
                    .iter()
                    .map(|kind| kind.map_or("none".to_string(), |kind| kind.to_string()))
                    .collect();
                return Err(InferenceError::InconsistentInputKinds {
                    question_id: question.id,
                    kinds: listed.join(", "),
                });
            }
            Ok(question_type.with_input_kind(first))
        }
        other => Ok(other),
    }
}
