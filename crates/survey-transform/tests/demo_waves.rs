//! Transformation of the demo waves against the inferred schema.

use std::collections::BTreeMap;
use std::path::PathBuf;

use proptest::prelude::*;
use survey_infer::{NoopNamer, PinnedNames, build_schema};
use survey_ingest::{DirectorySource, ParseOptions, SurveySource, parse_metadata};
use survey_model::{
    CellValue, Choice, DataKind, NumericRange, QuestionType, RejectionKind, RespondentMeta,
    ResponseRow, Schema, ValueDomain, Variable, VariableRole,
};
use survey_transform::{transform_results, validated_frame};

fn mockdata_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../mockdata")
}

fn demo(poll_id: u64) -> (Schema, Vec<ResponseRow>) {
    let source = DirectorySource::new(mockdata_dir());
    let payload = source.fetch_metadata(poll_id).expect("fetch metadata");
    let metadata = parse_metadata(&payload, &ParseOptions::default()).expect("parse metadata");
    let schema = build_schema(&metadata, &NoopNamer, &PinnedNames::none()).expect("schema");
    let rows = source.fetch_results(poll_id).expect("fetch results");
    (schema, rows)
}

#[test]
fn demo_wave_counts() {
    let (schema, rows) = demo(123);
    let outcome = transform_results(&rows, &schema);
    let report = &outcome.report;

    assert_eq!(report.input_rows, 7);
    assert_eq!(report.validated_rows, 3);
    assert_eq!(report.dropped_empty, 1);
    assert_eq!(report.dropped_incomplete, 1);
    assert_eq!(report.rejected_count(), 2);
    assert_eq!(report.decoded_values, 3);
    assert_eq!(report.other_splits, 1);
    assert!(report.is_balanced());

    let by_kind = report.rejected_by_kind();
    assert_eq!(by_kind.get(&RejectionKind::UnknownChoiceCode), Some(&1));
    assert_eq!(by_kind.get(&RejectionKind::OutOfRange), Some(&1));

    let unknown = &report.rejected[0];
    assert_eq!(unknown.row_index, 5);
    assert_eq!(unknown.variable, "Q4");
    let out_of_range = &report.rejected[1];
    assert_eq!(out_of_range.respondent_id.as_deref(), Some("7"));
    assert_eq!(out_of_range.variable, "Q8");
}

#[test]
fn demo_rows_are_typed_and_decoded() {
    let (schema, rows) = demo(123);
    let outcome = transform_results(&rows, &schema);
    let alice = &outcome.rows[0];

    assert_eq!(alice.respondent.id.as_deref(), Some("1"));
    assert_eq!(alice.get("Q1"), Some(&CellValue::Text("Alice".to_string())));
    assert_eq!(alice.get("Q2"), Some(&CellValue::Integer(25)));
    assert_eq!(
        alice.get("Q4"),
        Some(&CellValue::Text("Sehr zufrieden".to_string()))
    );
    assert_eq!(alice.get("Q5_blau"), Some(&CellValue::Boolean(false)));
    assert_eq!(alice.get("Q6_other"), Some(&CellValue::Boolean(false)));
    assert_eq!(alice.get("Q6_other_text"), Some(&CellValue::Null));
    assert_eq!(alice.get("Q8"), Some(&CellValue::Integer(8)));

    let charlie = &outcome.rows[2];
    assert_eq!(charlie.get("Q6_other"), Some(&CellValue::Boolean(true)));
    assert_eq!(
        charlie.get("Q6_other_text"),
        Some(&CellValue::Text("Other reason".to_string()))
    );
}

#[test]
fn second_wave_validates_fully() {
    let (schema, rows) = demo(124);
    let outcome = transform_results(&rows, &schema);
    assert_eq!(outcome.report.validated_rows, 2);
    assert!(outcome.report.rejected.is_empty());

    let hanna = &outcome.rows[1];
    assert_eq!(hanna.get("Q3_e_mail"), Some(&CellValue::Null));
    assert_eq!(hanna.get("Q8"), Some(&CellValue::Integer(0)));

    let frame = validated_frame(&outcome.rows, &schema).expect("frame");
    assert_eq!(frame.height(), 2);
}

fn variable(name: &str, source: &str, kind: DataKind, question_type: QuestionType) -> Variable {
    Variable {
        name: name.to_string(),
        source: source.to_string(),
        kind,
        range: None,
        domain: None,
        label: Some(name.to_string()),
        question_id: 1,
        question_position: 1,
        group_index: 0,
        question_type,
        question_text: "Frage".to_string(),
        role: VariableRole::Answer,
        scale_labels: Vec::new(),
    }
}

fn row(answers: &[(&str, &str)]) -> ResponseRow {
    ResponseRow {
        respondent: RespondentMeta {
            id: Some("r1".to_string()),
            completed: Some("1".to_string()),
            ..RespondentMeta::default()
        },
        answers: answers
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    }
}

#[test]
fn multiple_choice_row_becomes_booleans() {
    let schema = Schema::new(
        ["A", "B", "C", "D"]
            .iter()
            .enumerate()
            .map(|(index, label)| {
                variable(
                    &format!("Q1_{}", label.to_lowercase()),
                    &format!("V{}", index + 1),
                    DataKind::Boolean,
                    QuestionType::MultipleChoice,
                )
            })
            .collect(),
    )
    .expect("schema");
    let outcome = transform_results(
        &[row(&[("V1", "1"), ("V2", "0"), ("V3", "1"), ("V4", "0")])],
        &schema,
    );
    let values: Vec<Option<bool>> = outcome.rows[0]
        .values
        .values()
        .map(CellValue::as_bool)
        .collect();
    assert_eq!(outcome.rows[0].values.len(), 4);
    assert_eq!(outcome.rows[0].get("Q1_a"), Some(&CellValue::Boolean(true)));
    assert_eq!(outcome.rows[0].get("Q1_b"), Some(&CellValue::Boolean(false)));
    assert_eq!(outcome.rows[0].get("Q1_c"), Some(&CellValue::Boolean(true)));
    assert_eq!(outcome.rows[0].get("Q1_d"), Some(&CellValue::Boolean(false)));
    assert!(values.iter().all(Option::is_some));
}

#[test]
fn integer_range_from_string_bounds() {
    let mut count = variable(
        "Q2_anzahl",
        "V1",
        DataKind::Integer,
        QuestionType::InputSingle(Some(survey_model::InputKind::Integer)),
    );
    count.range = Some(NumericRange::new(3, 10));
    let schema = Schema::new(vec![count]).expect("schema");

    let outcome = transform_results(&[row(&[("V1", "5")]), row(&[("V1", "12")])], &schema);
    assert_eq!(outcome.report.validated_rows, 1);
    assert_eq!(outcome.rows[0].get("Q2_anzahl"), Some(&CellValue::Integer(5)));
    assert_eq!(outcome.report.rejected[0].kind, RejectionKind::OutOfRange);
    assert_eq!(outcome.report.rejected[0].row_index, 1);
}

#[test]
fn empty_row_is_filtered_not_rejected() {
    let schema = Schema::new(vec![variable(
        "Q1",
        "V1",
        DataKind::String,
        QuestionType::InputSingle(None),
    )])
    .expect("schema");
    let outcome = transform_results(&[row(&[("V1", "  ")])], &schema);
    assert!(outcome.rows.is_empty());
    assert_eq!(outcome.report.dropped_empty, 1);
    assert!(outcome.report.rejected.is_empty());
}

fn choice_schema() -> Schema {
    let mut choice = variable("Q1", "V1", DataKind::String, QuestionType::SingleChoice);
    choice.domain = Some(ValueDomain::new(vec![
        Choice::new("1", "Ja"),
        Choice::new("2", "Nein"),
    ]));
    let mut scale = variable("Q2", "V2", DataKind::Integer, QuestionType::Scale);
    scale.range = Some(NumericRange::new(1, 5));
    Schema::new(vec![choice, scale]).expect("schema")
}

fn cell() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        Just("1".to_string()),
        Just("2".to_string()),
        Just("9".to_string()),
        "[a-z]{1,4}",
        (0i64..8).prop_map(|n| n.to_string()),
    ]
}

proptest! {
    #[test]
    fn every_input_row_is_accounted_for(
        cells in prop::collection::vec((cell(), cell(), prop::bool::ANY), 0..20),
    ) {
        let rows: Vec<ResponseRow> = cells
            .iter()
            .map(|(first, second, completed)| {
                let mut row = row(&[("V1", first.as_str()), ("V2", second.as_str())]);
                row.respondent.completed = Some(if *completed { "1" } else { "0" }.to_string());
                row
            })
            .collect();
        let schema = choice_schema();
        let outcome = transform_results(&rows, &schema);
        prop_assert!(outcome.report.is_balanced());
        prop_assert_eq!(outcome.rows.len(), outcome.report.validated_rows);

        let counts: BTreeMap<_, _> = outcome.report.rejected_by_kind();
        let total: usize = counts.values().sum();
        prop_assert_eq!(total, outcome.report.rejected_count());

        for validated in &outcome.rows {
            prop_assert_eq!(validated.values.len(), schema.len());
            if let Some(CellValue::Integer(value)) = validated.get("Q2") {
                prop_assert!((1..=5).contains(value));
            }
        }
    }
}
