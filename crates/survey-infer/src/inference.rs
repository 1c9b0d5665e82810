//! Type inference: one question in, its variables out.

use survey_model::{
    Choice, DataKind, Group, InputKind, Label, NumericRange, Question, QuestionType, ValueDomain,
    Variable, VariableRole,
};

use crate::classify::{QuestionShape, classify_question};
use crate::error::InferenceError;
use crate::naming::NamingContext;

/// Suffix of the "other option selected" flag.
const OTHER_SUFFIX: &str = "other";
/// Suffix of the free text typed into the other option.
const OTHER_TEXT_SUFFIX: &str = "other_text";

/// A variable before it has a name.
#[derive(Debug, Clone)]
struct Slot {
    source: String,
    kind: DataKind,
    range: Option<NumericRange>,
    domain: Option<ValueDomain>,
    label: Option<String>,
    group_index: usize,
    role: VariableRole,
    scale_labels: Vec<String>,
}

impl Slot {
    fn new(source: &str, kind: DataKind, group_index: usize) -> Self {
        Self {
            source: source.to_string(),
            kind,
            range: None,
            domain: None,
            label: None,
            group_index,
            role: VariableRole::Answer,
            scale_labels: Vec::new(),
        }
    }
}

/// Classify `question` and emit one variable per output slot, named.
pub fn infer_question(
    question: &Question,
    naming: &mut NamingContext<'_>,
) -> Result<Vec<Variable>, InferenceError> {
    let question_type = classify_question(question)?;
    let slots = match question_type {
        QuestionType::InputSingle(kind) | QuestionType::InputMultiple(kind) => {
            input_slots(question, kind)
        }
        QuestionType::SingleChoice => single_choice_slots(&question.groups[0]),
        QuestionType::MultipleChoice => multiple_choice_slots(&question.groups[0]),
        QuestionType::MultipleChoiceOther => other_slots(question)?,
        QuestionType::Scale => scale_slots(question)?,
        QuestionType::Matrix => matrix_slots(question)?,
    };
    tracing::debug!(
        question_id = question.id,
        question_type = %question_type,
        variables = slots.len(),
        "inferred question type"
    );

    let base = question.base_name();
    let single = slots.len() == 1;
    let mut variables = Vec::with_capacity(slots.len());
    for (index, slot) in slots.into_iter().enumerate() {
        let name = match naming.pinned(&slot.source) {
            Some(pinned) => naming.claim_exact(question.id, pinned)?,
            None => {
                let proposed = match slot.role {
                    VariableRole::OtherFlag => format!("{base}_{OTHER_SUFFIX}"),
                    VariableRole::OtherText => format!("{base}_{OTHER_TEXT_SUFFIX}"),
                    VariableRole::Answer if single => base.clone(),
                    VariableRole::Answer => {
                        let suffix =
                            naming.suffix_for(&question.text, slot.label.as_deref(), index);
                        format!("{base}_{suffix}")
                    }
                };
                naming.claim(question.id, proposed)?
            }
        };
        variables.push(Variable {
            name,
            source: slot.source,
            kind: slot.kind,
            range: slot.range,
            domain: slot.domain,
            label: slot.label,
            question_id: question.id,
            question_position: question.position,
            group_index: slot.group_index,
            question_type,
            question_text: question.text.clone(),
            role: slot.role,
            scale_labels: slot.scale_labels,
        });
    }
    Ok(variables)
}

fn input_kind_to_data_kind(kind: Option<InputKind>) -> DataKind {
    match kind {
        Some(InputKind::Integer) => DataKind::Integer,
        _ => DataKind::String,
    }
}

fn input_slots(question: &Question, kind: Option<InputKind>) -> Vec<Slot> {
    let data_kind = input_kind_to_data_kind(kind);
    question
        .groups
        .iter()
        .map(|group| {
            let mut slot = Slot::new(group.varnames[0].as_str(), data_kind, group.index);
            slot.label = group
                .name
                .clone()
                .or_else(|| group.items.first().and_then(|item| item.name.clone()));
            if data_kind == DataKind::Integer {
                slot.range = group.effective_range();
            }
            slot
        })
        .collect()
}

/// Domain of a single-choice group: `(code, label)` pairs in label order.
///
/// Codes default to `1..=N` when none are declared; entries with a blank
/// code or label are skipped.
fn choice_domain(group: &Group) -> Option<ValueDomain> {
    let declared = group.codes.iter().any(|code| !code.trim().is_empty());
    let choices: Vec<Choice> = group
        .labels
        .iter()
        .enumerate()
        .filter_map(|(index, label)| {
            let code = if declared {
                group.codes.get(index)?.trim().to_string()
            } else {
                (index + 1).to_string()
            };
            let text = label.text.as_deref()?.trim();
            (!code.is_empty() && !text.is_empty()).then(|| Choice::new(code, text))
        })
        .collect();
    (!choices.is_empty()).then(|| ValueDomain::new(choices))
}

fn single_choice_slots(group: &Group) -> Vec<Slot> {
    let mut slot = Slot::new(group.varnames[0].as_str(), DataKind::String, group.index);
    slot.domain = choice_domain(group);
    vec![slot]
}

fn label_text(labels: &[Label], index: usize) -> Option<String> {
    labels
        .get(index)
        .and_then(|label| label.text.clone())
        .filter(|text| !text.trim().is_empty())
}

fn multiple_choice_slots(group: &Group) -> Vec<Slot> {
    group
        .varnames
        .iter()
        .enumerate()
        .map(|(index, varname)| {
            let mut slot = Slot::new(varname.as_str(), DataKind::Boolean, group.index);
            slot.label = label_text(&group.labels, index);
            slot
        })
        .collect()
}

/// Regular options first, then the other flag, then its free text.
fn other_slots(question: &Question) -> Result<Vec<Slot>, InferenceError> {
    let primary = &question.groups[0];
    let other = &question.groups[1];
    let text_varname = other.varnames[0].as_str();
    let unsupported = |reason: String| InferenceError::UnsupportedQuestionShape {
        question_id: Some(question.id),
        shape: QuestionShape::of(question),
        reason,
    };

    let (flag_varname, _) = text_varname.split_once('.').ok_or_else(|| {
        unsupported(format!(
            "other text varname '{text_varname}' is not of the form <flag>.<n>"
        ))
    })?;
    let flag_index = primary
        .varnames
        .iter()
        .position(|varname| varname.as_str() == flag_varname)
        .ok_or_else(|| {
            unsupported(format!(
                "other flag '{flag_varname}' is not among the primary group's varnames"
            ))
        })?;

    let mut slots: Vec<Slot> = multiple_choice_slots(primary);
    let mut flag = slots.remove(flag_index);
    flag.role = VariableRole::OtherFlag;
    let flag_label = flag.label.clone().unwrap_or_default();

    let mut text = Slot::new(text_varname, DataKind::String, other.index);
    text.role = VariableRole::OtherText;
    text.label = Some(format!("{flag_label} (Text)"));

    slots.push(flag);
    slots.push(text);
    Ok(slots)
}

fn required_range(question: &Question, group: &Group) -> Result<NumericRange, InferenceError> {
    group
        .effective_range()
        .ok_or(InferenceError::MissingRange {
            question_id: question.id,
            group_index: group.index,
        })
}

fn scale_points(group: &Group) -> Vec<String> {
    group
        .labels
        .iter()
        .map(|label| label.text_or_empty().to_string())
        .collect()
}

fn scale_slots(question: &Question) -> Result<Vec<Slot>, InferenceError> {
    let group = &question.groups[0];
    let mut slot = Slot::new(group.varnames[0].as_str(), DataKind::Integer, group.index);
    slot.range = Some(required_range(question, group)?);
    slot.scale_labels = scale_points(group);
    Ok(vec![slot])
}

/// One integer variable per statement on the shared scale.
fn matrix_slots(question: &Question) -> Result<Vec<Slot>, InferenceError> {
    let group = &question.groups[0];
    let range = required_range(question, group)?;
    let points = scale_points(group);
    Ok(group
        .varnames
        .iter()
        .enumerate()
        .map(|(index, varname)| {
            let mut slot = Slot::new(varname.as_str(), DataKind::Integer, group.index);
            slot.range = Some(range);
            slot.label = group.items.get(index).and_then(|item| item.name.clone());
            slot.scale_labels = points.clone();
            slot
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{NoopNamer, PinnedNames};
    use survey_model::{Item, PlatformType, Varname};

    fn group(index: usize, varnames: &[&str], labels: &[&str]) -> Group {
        Group {
            index,
            varnames: varnames.iter().map(|name| Varname::new(*name)).collect(),
            labels: labels.iter().map(|text| Label::new(*text)).collect(),
            ..Group::default()
        }
    }

    fn question(platform: PlatformType, groups: Vec<Group>) -> Question {
        Question {
            id: 40,
            platform_type: platform,
            text: "Frage".to_string(),
            position: 4,
            relative_position: Some(1),
            page_number: 1,
            groups,
        }
    }

    fn infer(question: &Question) -> Result<Vec<Variable>, InferenceError> {
        let pinned = PinnedNames::none();
        let mut naming = NamingContext::new(&NoopNamer, &pinned);
        infer_question(question, &mut naming)
    }

    #[test]
    fn single_choice_defaults_codes_and_skips_blank_labels() {
        let mut choice = group(0, &["V5"], &["Ja", "", "Nein"]);
        choice.labels[1] = Label::default();
        let vars = infer(&question(PlatformType::Choice, vec![choice])).unwrap();
        assert_eq!(vars.len(), 1);
        assert_eq!(vars[0].name, "Q4");
        let domain = vars[0].domain.as_ref().unwrap();
        assert_eq!(
            domain.choices(),
            &[Choice::new("1", "Ja"), Choice::new("3", "Nein")]
        );
    }

    #[test]
    fn single_choice_uses_declared_codes() {
        let mut choice = group(0, &["V5"], &["Ja", "Nein"]);
        choice.codes = vec!["10".to_string(), "20".to_string()];
        let vars = infer(&question(PlatformType::Choice, vec![choice])).unwrap();
        assert_eq!(vars[0].domain.as_ref().unwrap().label_for("20"), Some("Nein"));
    }

    #[test]
    fn other_question_orders_flag_and_text_last() {
        let primary = group(0, &["V9", "V10", "V11"], &["Spaß", "Anderes", "Lernen"]);
        let other = group(1, &["V10.1"], &[]);
        let vars = infer(&question(PlatformType::Choice, vec![primary, other])).unwrap();
        let names: Vec<&str> = vars.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["Q4_spass", "Q4_lernen", "Q4_other", "Q4_other_text"]);
        assert_eq!(vars[2].source, "V10");
        assert_eq!(vars[2].role, VariableRole::OtherFlag);
        assert_eq!(vars[3].kind, DataKind::String);
        assert_eq!(vars[3].label.as_deref(), Some("Anderes (Text)"));
        assert_eq!(vars[3].group_index, 1);
    }

    #[test]
    fn other_flag_must_be_in_primary_group() {
        let primary = group(0, &["V9", "V10"], &["A", "B"]);
        let other = group(1, &["V12.1"], &[]);
        let err = infer(&question(PlatformType::Choice, vec![primary, other])).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::UnsupportedQuestionShape {
                question_id: Some(40),
                ..
            }
        ));
    }

    #[test]
    fn scale_without_range_fails() {
        let scale = group(0, &["V15"], &[]);
        let err = infer(&question(PlatformType::Scale, vec![scale])).unwrap_err();
        assert!(matches!(
            err,
            InferenceError::MissingRange {
                question_id: 40,
                group_index: 0
            }
        ));
    }

    #[test]
    fn matrix_statements_share_the_range() {
        let mut matrix = group(0, &["V12", "V13"], &["gut", "schlecht"]);
        matrix.range = Some(NumericRange::new(1, 2));
        matrix.items = vec![
            Item {
                name: Some("Team".to_string()),
                ..Item::default()
            },
            Item {
                name: Some("Inhalte".to_string()),
                ..Item::default()
            },
        ];
        let vars = infer(&question(PlatformType::Matrix, vec![matrix])).unwrap();
        assert_eq!(vars[0].name, "Q4_team");
        assert_eq!(vars[1].name, "Q4_inhalte");
        assert!(vars.iter().all(|v| v.range == Some(NumericRange::new(1, 2))));
        assert_eq!(vars[0].scale_labels, vec!["gut", "schlecht"]);
    }

    #[test]
    fn input_kinds_must_agree() {
        let mut first = group(0, &["V1"], &[]);
        first.input_type = Some(InputKind::Integer);
        let mut second = group(1, &["V2"], &[]);
        second.input_type = Some(InputKind::SingleLine);
        let err = infer(&question(PlatformType::Input, vec![first, second])).unwrap_err();
        assert!(matches!(err, InferenceError::InconsistentInputKinds { .. }));
    }

    #[test]
    fn pinned_names_override_fresh_names() {
        let colors = group(0, &["V6", "V7"], &["Rot", "Blau"]);
        let q = question(PlatformType::Choice, vec![colors]);
        let stored = survey_model::Schema::new(vec![Variable {
            name: "Q4_red".to_string(),
            ..infer(&q).unwrap().remove(0)
        }])
        .unwrap();
        let pinned = PinnedNames::from_schema(&stored);
        let mut naming = NamingContext::new(&NoopNamer, &pinned);
        let vars = infer_question(&q, &mut naming).unwrap();
        assert_eq!(vars[0].name, "Q4_red");
        assert_eq!(vars[1].name, "Q4_blau");
    }
}
