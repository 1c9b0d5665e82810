//! Schema building against the demo poll and structural properties of the
//! classifier.

use std::path::PathBuf;

use proptest::prelude::*;
use survey_infer::{
    InferenceError, NamingError, NoopNamer, PinnedNames, SuggestionTable, VariableNamer,
    build_schema, infer_question_type,
};
use survey_ingest::{DirectorySource, ParseOptions, SurveySource, parse_metadata};
use survey_model::{
    DataKind, Group, InputKind, Item, Label, NumericRange, PlatformType, Question, QuestionType,
    SurveyMetadata, Varname,
};

fn mockdata_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../mockdata")
}

fn demo_metadata(poll_id: u64) -> SurveyMetadata {
    let payload = DirectorySource::new(mockdata_dir())
        .fetch_metadata(poll_id)
        .expect("fetch metadata");
    parse_metadata(&payload, &ParseOptions::default()).expect("parse metadata")
}

#[test]
fn demo_schema_names_and_kinds() {
    let schema = build_schema(&demo_metadata(123), &NoopNamer, &PinnedNames::none())
        .expect("build schema");
    let names: Vec<&str> = schema.names().collect();
    assert_eq!(
        names,
        vec![
            "Q1",
            "Q2",
            "Q3_e_mail",
            "Q3_telefon",
            "Q4",
            "Q5_rot",
            "Q5_blau",
            "Q5_gruen",
            "Q6_spass",
            "Q6_lernen",
            "Q6_other",
            "Q6_other_text",
            "Q7_die_ausbildung_war_gut",
            "Q7_das_team_war_hilfsbereit",
            "Q7_die_inhalte_waren_relevant",
            "Q8",
        ]
    );

    let age = schema.get("Q2").expect("age variable");
    assert_eq!(age.kind, DataKind::Integer);
    assert_eq!(
        age.question_type,
        QuestionType::InputSingle(Some(InputKind::Integer))
    );

    let satisfaction = schema.get("Q4").expect("satisfaction variable");
    assert_eq!(satisfaction.question_type, QuestionType::SingleChoice);
    let domain = satisfaction.domain.as_ref().expect("domain");
    assert_eq!(domain.label_for("3"), Some("Neutral"));

    let other_text = schema.get("Q6_other_text").expect("other text");
    assert_eq!(other_text.source, "V11.1");
    assert_eq!(other_text.label.as_deref(), Some("Anderes (Text)"));

    let statement = schema.get("Q7_das_team_war_hilfsbereit").expect("matrix");
    assert_eq!(statement.range, Some(NumericRange::new(1, 3)));
    assert_eq!(statement.scale_labels.len(), 3);

    assert_eq!(schema.get("Q8").and_then(|v| v.range), Some(NumericRange::new(0, 10)));
}

#[test]
fn rebuilding_is_byte_identical() {
    let metadata = demo_metadata(123);
    let first = build_schema(&metadata, &NoopNamer, &PinnedNames::none()).expect("first");
    let second = build_schema(&metadata, &NoopNamer, &PinnedNames::none()).expect("second");
    assert_eq!(
        serde_json::to_vec(&first).expect("serialize"),
        serde_json::to_vec(&second).expect("serialize")
    );
    assert_eq!(first.fingerprint(), second.fingerprint());
}

#[test]
fn changed_input_kind_is_drift() {
    let stored = build_schema(&demo_metadata(123), &NoopNamer, &PinnedNames::none())
        .expect("stored");
    let same = build_schema(&demo_metadata(124), &NoopNamer, &PinnedNames::none())
        .expect("same");
    let drifted = build_schema(&demo_metadata(125), &NoopNamer, &PinnedNames::none())
        .expect("drifted");

    assert!(stored.is_equivalent(&same));
    let diff = stored.diff(&drifted);
    assert_eq!(diff.changed.len(), 1);
    assert!(diff.added.is_empty() && diff.removed.is_empty());
    assert_eq!(diff.changed[0].stored.name, "Q2");
    assert_eq!(diff.changed[0].inferred.kind, DataKind::String);
}

#[test]
fn suggestions_replace_slugs_when_usable() {
    let mut table = SuggestionTable::default();
    table.insert("Rot", "red");
    table.insert("Blau", "Blue Sky");
    let schema = build_schema(&demo_metadata(123), &table, &PinnedNames::none())
        .expect("build schema");
    assert!(schema.get("Q5_red").is_some());
    assert!(schema.get("Q5_blau").is_some());
}

struct BrokenNamer;

impl VariableNamer for BrokenNamer {
    fn suggest_name(&self, _: &str, _: &str) -> Result<Option<String>, NamingError> {
        Err(NamingError::Unavailable {
            message: "connection refused".to_string(),
        })
    }
}

#[test]
fn naming_failures_never_block_the_build() {
    let with_failures = build_schema(&demo_metadata(123), &BrokenNamer, &PinnedNames::none())
        .expect("build schema");
    let plain = build_schema(&demo_metadata(123), &NoopNamer, &PinnedNames::none())
        .expect("build schema");
    assert_eq!(with_failures, plain);
}

#[test]
fn pinned_names_survive_a_different_namer() {
    let mut table = SuggestionTable::default();
    table.insert("Rot", "red");
    let stored = build_schema(&demo_metadata(123), &table, &PinnedNames::none()).expect("stored");
    let pinned = PinnedNames::from_schema(&stored);
    let rebuilt = build_schema(&demo_metadata(124), &NoopNamer, &pinned).expect("rebuilt");
    assert!(stored.is_equivalent(&rebuilt));
    assert!(rebuilt.get("Q5_red").is_some());
}

fn question(id: i64, platform: PlatformType, groups: Vec<Group>) -> Question {
    Question {
        id,
        platform_type: platform,
        text: format!("Frage {id}"),
        position: id as usize,
        relative_position: None,
        page_number: 1,
        groups,
    }
}

fn group(index: usize, varnames: &[&str], labels: &[&str]) -> Group {
    Group {
        index,
        varnames: varnames.iter().map(|name| Varname::new(*name)).collect(),
        labels: labels.iter().map(|text| Label::new(*text)).collect(),
        ..Group::default()
    }
}

#[test]
fn choice_with_four_varnames_is_multiple_choice() {
    let metadata = SurveyMetadata {
        questions: vec![question(
            1,
            PlatformType::Choice,
            vec![group(0, &["V1", "V2", "V3", "V4"], &["A", "B", "C", "D"])],
        )],
    };
    let schema = build_schema(&metadata, &NoopNamer, &PinnedNames::none()).expect("schema");
    assert_eq!(schema.len(), 4);
    assert!(schema.variables().iter().all(|v| v.kind == DataKind::Boolean
        && v.question_type == QuestionType::MultipleChoice));
    let names: Vec<&str> = schema.names().collect();
    assert_eq!(names, vec!["Q1_a", "Q1_b", "Q1_c", "Q1_d"]);
}

#[test]
fn two_integer_inputs_are_input_multiple_integer() {
    let integer_group = |index: usize, varname: &str, name: &str| Group {
        name: Some(name.to_string()),
        items: vec![Item {
            input_type: Some(InputKind::Integer),
            ..Item::default()
        }],
        ..group(index, &[varname], &[])
    };
    let metadata = SurveyMetadata {
        questions: vec![question(
            2,
            PlatformType::Input,
            vec![integer_group(0, "V1", "min"), integer_group(1, "V2", "max")],
        )],
    };
    let schema = build_schema(&metadata, &NoopNamer, &PinnedNames::none()).expect("schema");
    assert_eq!(schema.len(), 2);
    for variable in schema.variables() {
        assert_eq!(variable.kind, DataKind::Integer);
        assert_eq!(variable.question_type.name(), "input_multiple_integer");
    }
    assert_eq!(schema.names().collect::<Vec<_>>(), vec!["Q2_min", "Q2_max"]);
}

#[test]
fn duplicate_labels_are_disambiguated() {
    let metadata = SurveyMetadata {
        questions: vec![question(
            3,
            PlatformType::Choice,
            vec![group(0, &["V1", "V2", "V3"], &["Ja", "Ja", "Ja!"])],
        )],
    };
    let schema = build_schema(&metadata, &NoopNamer, &PinnedNames::none()).expect("schema");
    assert_eq!(
        schema.names().collect::<Vec<_>>(),
        vec!["Q3_ja", "Q3_ja_2", "Q3_ja_3"]
    );
}

#[test]
fn unsupported_question_aborts_the_build() {
    let metadata = SurveyMetadata {
        questions: vec![
            question(1, PlatformType::Scale, vec![{
                let mut scale = group(0, &["V1"], &[]);
                scale.range = Some(NumericRange::new(1, 5));
                scale
            }]),
            question(
                2,
                PlatformType::Choice,
                vec![group(0, &["V2"], &["A"]), group(1, &["V2.1"], &[])],
            ),
        ],
    };
    let err = build_schema(&metadata, &NoopNamer, &PinnedNames::none()).unwrap_err();
    assert!(matches!(
        err,
        InferenceError::UnsupportedQuestionShape {
            question_id: Some(2),
            ..
        }
    ));
}

fn in_decision_table(platform: &PlatformType, counts: &[usize]) -> bool {
    match platform {
        PlatformType::Input => {
            !counts.is_empty() && counts.iter().all(|&n| n == 1)
        }
        PlatformType::Choice => match counts {
            [n] => *n >= 1,
            [n, 1] => *n > 1,
            _ => false,
        },
        PlatformType::Scale => counts == [1],
        PlatformType::Matrix => matches!(counts, [n] if *n > 1),
        PlatformType::Other(_) => false,
    }
}

fn platform_strategy() -> impl Strategy<Value = PlatformType> {
    prop_oneof![
        Just(PlatformType::Input),
        Just(PlatformType::Choice),
        Just(PlatformType::Scale),
        Just(PlatformType::Matrix),
        Just(PlatformType::Other("RANKING".to_string())),
    ]
}

proptest! {
    #[test]
    fn classification_matches_the_decision_table(
        platform in platform_strategy(),
        counts in prop::collection::vec(0usize..4, 0..4),
    ) {
        let result = infer_question_type(&platform, counts.len(), &counts);
        if in_decision_table(&platform, &counts) {
            prop_assert!(result.is_ok());
        } else {
            let is_shape_error = matches!(
                result,
                Err(InferenceError::UnsupportedQuestionShape { .. })
            );
            prop_assert!(is_shape_error);
        }
    }

    #[test]
    fn classification_is_deterministic(
        platform in platform_strategy(),
        counts in prop::collection::vec(0usize..4, 0..4),
    ) {
        let first = infer_question_type(&platform, counts.len(), &counts).ok();
        let second = infer_question_type(&platform, counts.len(), &counts).ok();
        prop_assert_eq!(first, second);
    }
}
