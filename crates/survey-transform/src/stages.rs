//! Transformation stages.
//!
//! Each stage takes its input by reference or by value and returns a new
//! value; nothing is mutated in place. The order is fixed: filter, decode,
//! split other answers, cast and validate.

use std::collections::BTreeMap;

use survey_model::{
    CellValue, DataKind, QuestionType, RespondentMeta, ResponseRow, RowRejection, Schema,
    TransformReport, ValidatedRow, Variable, VariableRole,
};

use crate::error::RowError;

/// Rows that survived filtering, with their index in the fetched batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterOutcome {
    pub kept: Vec<(usize, ResponseRow)>,
    pub dropped_empty: usize,
    pub dropped_incomplete: usize,
}

/// Drop rows without a single answer and rows the platform marked
/// incomplete. A row that is both is counted as empty.
pub fn filter_rows(rows: &[ResponseRow]) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();
    for (index, row) in rows.iter().enumerate() {
        if row.is_blank() {
            outcome.dropped_empty += 1;
        } else if row.is_marked_incomplete() {
            outcome.dropped_incomplete += 1;
        } else {
            outcome.kept.push((index, row.clone()));
        }
    }
    outcome
}

/// A row between stages: one optional text value per variable name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagedRow {
    pub respondent: RespondentMeta,
    /// `None` when the slot is blank.
    pub cells: BTreeMap<String, Option<String>>,
    /// Choice codes replaced by label text in this row.
    pub decoded: usize,
    /// Other options separated into flag and text in this row.
    pub other_splits: usize,
}

impl StagedRow {
    pub fn cell(&self, variable: &str) -> Option<&str> {
        self.cells.get(variable).and_then(|value| value.as_deref())
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Read every variable's slot and replace single-choice codes with labels.
pub fn decode_row(row: &ResponseRow, schema: &Schema) -> Result<StagedRow, RowError> {
    let mut staged = StagedRow {
        respondent: row.respondent.clone(),
        ..StagedRow::default()
    };
    for variable in schema.variables() {
        let mut value = trimmed(row.answer(&variable.source));
        if variable.question_type == QuestionType::SingleChoice {
            if let (Some(code), Some(domain)) = (value.as_deref(), variable.domain.as_ref()) {
                let label = domain
                    .label_for(code)
                    .ok_or_else(|| RowError::UnknownChoiceCode {
                        variable: variable.name.clone(),
                        code: code.to_string(),
                    })?;
                value = Some(label.to_string());
                staged.decoded += 1;
            }
        }
        staged.cells.insert(variable.name.clone(), value);
    }
    Ok(staged)
}

/// Separate each "other" answer into its selected flag and its free text.
///
/// The flag is selected when it reads `1`, when free text was typed, or when
/// the flag slot itself holds the text. Unselected options end with flag
/// `0` and no text.
pub fn split_other(row: StagedRow, schema: &Schema) -> StagedRow {
    let mut staged = row;
    for flag in schema
        .variables()
        .iter()
        .filter(|variable| variable.role == VariableRole::OtherFlag)
    {
        let Some(text) = schema.variables().iter().find(|variable| {
            variable.role == VariableRole::OtherText && variable.question_id == flag.question_id
        }) else {
            continue;
        };
        let flag_value = staged.cell(&flag.name).map(str::to_string);
        let text_value = staged.cell(&text.name).map(str::to_string);

        let (selected, text_value) = match flag_value.as_deref() {
            Some("1") => (Some("1".to_string()), text_value),
            None | Some("0") if text_value.is_some() => (Some("1".to_string()), text_value),
            None | Some("0") => (Some("0".to_string()), None),
            Some(combined) if combined.parse::<f64>().is_err() => (
                Some("1".to_string()),
                text_value.or_else(|| Some(combined.to_string())),
            ),
            Some(_) => (flag_value.clone(), text_value),
        };
        if selected.as_deref() == Some("1") {
            staged.other_splits += 1;
        }
        staged.cells.insert(flag.name.clone(), selected);
        staged.cells.insert(text.name.clone(), text_value);
    }
    staged
}

fn cast_value(variable: &Variable, value: Option<&str>) -> Result<CellValue, RowError> {
    let mismatch = |value: &str| RowError::TypeMismatch {
        variable: variable.name.clone(),
        value: value.to_string(),
        expected: variable.kind,
    };
    match variable.kind {
        DataKind::Boolean => match value {
            None | Some("0") | Some("false") => Ok(CellValue::Boolean(false)),
            Some("1") | Some("true") => Ok(CellValue::Boolean(true)),
            Some(other) => Err(mismatch(other)),
        },
        DataKind::Integer => {
            let Some(raw) = value else {
                return Ok(CellValue::Null);
            };
            let number: i64 = raw.parse().map_err(|_| mismatch(raw))?;
            match variable.range {
                Some(range) if !range.contains(number) => Err(RowError::OutOfRange {
                    variable: variable.name.clone(),
                    value: number,
                    range,
                }),
                _ => Ok(CellValue::Integer(number)),
            }
        }
        DataKind::String => {
            let Some(text) = value else {
                return Ok(CellValue::Null);
            };
            match &variable.domain {
                Some(domain) if !domain.contains_label(text) => Err(RowError::OutOfDomain {
                    variable: variable.name.clone(),
                    value: text.to_string(),
                }),
                _ => Ok(CellValue::Text(text.to_string())),
            }
        }
    }
}

/// Cast every cell to its variable's kind and check ranges and domains.
pub fn cast_and_validate(row: StagedRow, schema: &Schema) -> Result<ValidatedRow, RowError> {
    let values = schema
        .variables()
        .iter()
        .map(|variable| {
            cast_value(variable, row.cell(&variable.name))
                .map(|value| (variable.name.clone(), value))
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;
    Ok(ValidatedRow {
        respondent: row.respondent,
        values,
    })
}

/// Validated rows plus the account of every input row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOutcome {
    pub rows: Vec<ValidatedRow>,
    pub report: TransformReport,
}

/// Run all stages over a fetched batch.
///
/// Failing rows are excluded and recorded in the report; the batch itself
/// never fails.
pub fn transform_results(rows: &[ResponseRow], schema: &Schema) -> TransformOutcome {
    let mut report = TransformReport {
        input_rows: rows.len(),
        ..TransformReport::default()
    };

    if let Some(first) = rows.first() {
        let missing: Vec<&str> = schema
            .variables()
            .iter()
            .filter(|variable| !first.answers.contains_key(&variable.source))
            .map(|variable| variable.source.as_str())
            .collect();
        if !missing.is_empty() {
            tracing::warn!(
                count = missing.len(),
                varnames = ?missing,
                "results have no column for some varnames; treating them as blank"
            );
        }
    }

    let filtered = filter_rows(rows);
    report.dropped_empty = filtered.dropped_empty;
    report.dropped_incomplete = filtered.dropped_incomplete;

    let mut validated = Vec::with_capacity(filtered.kept.len());
    for (index, row) in filtered.kept {
        let outcome = decode_row(&row, schema).and_then(|staged| {
            let staged = split_other(staged, schema);
            let (decoded, splits) = (staged.decoded, staged.other_splits);
            cast_and_validate(staged, schema).map(|row| (row, decoded, splits))
        });
        match outcome {
            Ok((row, decoded, splits)) => {
                report.decoded_values += decoded;
                report.other_splits += splits;
                validated.push(row);
            }
            Err(error) => {
                tracing::debug!(
                    row_index = index,
                    variable = error.variable(),
                    kind = %error.kind(),
                    "rejected row"
                );
                report.rejected.push(RowRejection {
                    row_index: index,
                    respondent_id: row.respondent.id.clone(),
                    variable: error.variable().to_string(),
                    kind: error.kind(),
                    message: error.to_string(),
                });
            }
        }
    }
    report.validated_rows = validated.len();

    tracing::info!(
        input = report.input_rows,
        validated = report.validated_rows,
        dropped_empty = report.dropped_empty,
        dropped_incomplete = report.dropped_incomplete,
        rejected = report.rejected_count(),
        "transformed results"
    );
    TransformOutcome {
        rows: validated,
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use survey_model::{Choice, NumericRange, ValueDomain};

    fn variable(name: &str, source: &str, kind: DataKind, question_type: QuestionType) -> Variable {
        Variable {
            name: name.to_string(),
            source: source.to_string(),
            kind,
            range: None,
            domain: None,
            label: None,
            question_id: 1,
            question_position: 1,
            group_index: 0,
            question_type,
            question_text: String::new(),
            role: VariableRole::Answer,
            scale_labels: Vec::new(),
        }
    }

    fn row(answers: &[(&str, &str)]) -> ResponseRow {
        ResponseRow {
            respondent: RespondentMeta::default(),
            answers: answers
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        }
    }

    fn other_schema() -> Schema {
        let mut flag = variable("Q6_other", "V11", DataKind::Boolean, QuestionType::MultipleChoiceOther);
        flag.role = VariableRole::OtherFlag;
        let mut text = variable(
            "Q6_other_text",
            "V11.1",
            DataKind::String,
            QuestionType::MultipleChoiceOther,
        );
        text.role = VariableRole::OtherText;
        text.group_index = 1;
        Schema::new(vec![flag, text]).unwrap()
    }

    fn split(answers: &[(&str, &str)]) -> (Option<String>, Option<String>) {
        let schema = other_schema();
        let staged = split_other(decode_row(&row(answers), &schema).unwrap(), &schema);
        (
            staged.cell("Q6_other").map(str::to_string),
            staged.cell("Q6_other_text").map(str::to_string),
        )
    }

    #[test]
    fn filter_counts_each_reason_once() {
        let mut incomplete = row(&[("V1", "x")]);
        incomplete.respondent.completed = Some("0".to_string());
        let mut blank_and_incomplete = row(&[("V1", "")]);
        blank_and_incomplete.respondent.completed = Some("0".to_string());
        let rows = vec![row(&[("V1", "x")]), incomplete, blank_and_incomplete, row(&[])];
        let outcome = filter_rows(&rows);
        assert_eq!(outcome.kept.len(), 1);
        assert_eq!(outcome.kept[0].0, 0);
        assert_eq!(outcome.dropped_empty, 2);
        assert_eq!(outcome.dropped_incomplete, 1);
    }

    #[test]
    fn unknown_choice_code_fails_the_row() {
        let mut choice = variable("Q4", "V5", DataKind::String, QuestionType::SingleChoice);
        choice.domain = Some(ValueDomain::new(vec![Choice::new("1", "Ja"), Choice::new("2", "Nein")]));
        let schema = Schema::new(vec![choice]).unwrap();

        let staged = decode_row(&row(&[("V5", " 2 ")]), &schema).unwrap();
        assert_eq!(staged.cell("Q4"), Some("Nein"));
        assert_eq!(staged.decoded, 1);

        let err = decode_row(&row(&[("V5", "7")]), &schema).unwrap_err();
        assert_eq!(
            err,
            RowError::UnknownChoiceCode {
                variable: "Q4".to_string(),
                code: "7".to_string()
            }
        );

        let blank = decode_row(&row(&[("V5", "")]), &schema).unwrap();
        assert_eq!(blank.cell("Q4"), None);
    }

    #[test]
    fn other_split_rules() {
        assert_eq!(
            split(&[("V11", "1"), ("V11.1", "Freunde")]),
            (Some("1".to_string()), Some("Freunde".to_string()))
        );
        assert_eq!(
            split(&[("V11", "0"), ("V11.1", "")]),
            (Some("0".to_string()), None)
        );
        assert_eq!(split(&[]), (Some("0".to_string()), None));
        assert_eq!(
            split(&[("V11", ""), ("V11.1", "Verein")]),
            (Some("1".to_string()), Some("Verein".to_string()))
        );
        assert_eq!(
            split(&[("V11", "Nachbarn")]),
            (Some("1".to_string()), Some("Nachbarn".to_string()))
        );
    }

    #[test]
    fn casts_check_kind_and_range() {
        let mut scale = variable("Q8", "V15", DataKind::Integer, QuestionType::Scale);
        scale.range = Some(NumericRange::new(0, 10));
        let flag = variable("Q5_rot", "V6", DataKind::Boolean, QuestionType::MultipleChoice);

        assert_eq!(cast_value(&scale, Some("7")).unwrap(), CellValue::Integer(7));
        assert_eq!(cast_value(&scale, None).unwrap(), CellValue::Null);
        assert!(matches!(
            cast_value(&scale, Some("11")),
            Err(RowError::OutOfRange { value: 11, .. })
        ));
        assert!(matches!(
            cast_value(&scale, Some("sieben")),
            Err(RowError::TypeMismatch { .. })
        ));

        assert_eq!(cast_value(&flag, Some("1")).unwrap(), CellValue::Boolean(true));
        assert_eq!(cast_value(&flag, None).unwrap(), CellValue::Boolean(false));
        assert!(matches!(
            cast_value(&flag, Some("2")),
            Err(RowError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn decoded_labels_must_stay_in_domain() {
        let mut choice = variable("Q4", "V5", DataKind::String, QuestionType::SingleChoice);
        choice.domain = Some(ValueDomain::new(vec![Choice::new("1", "Ja")]));
        assert_eq!(
            cast_value(&choice, Some("Ja")).unwrap(),
            CellValue::Text("Ja".to_string())
        );
        assert!(matches!(
            cast_value(&choice, Some("Vielleicht")),
            Err(RowError::OutOfDomain { .. })
        ));
    }
}
