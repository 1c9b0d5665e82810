//! Metadata parser: raw platform payload to the typed entity graph.

use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

use survey_model::{
    Group, InputKind, Item, Label, NumericRange, PlatformType, Question, SurveyMetadata, Varname,
};

use crate::error::MetadataError;
use crate::payload::{LangText, RawGroup, RawItem, RawQuestion, RawRange};

/// Language used to resolve text fields when none is configured.
pub const DEFAULT_LANGUAGE: &str = "de";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Preferred translation for question, group, item and label text.
    pub language: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }
}

impl ParseOptions {
    pub fn with_language(language: impl Into<String>) -> Self {
        Self {
            language: language.into(),
        }
    }
}

/// Parse a metadata payload into the entity graph.
///
/// The payload is either a list of questions or an object with a
/// `questions` list. Questions keep payload order; positions are 1-based and
/// page numbers are the dense rank of the platform page ids.
pub fn parse_metadata(
    payload: &Value,
    opts: &ParseOptions,
) -> Result<SurveyMetadata, MetadataError> {
    let entries = match payload {
        Value::Array(entries) => entries,
        Value::Object(map) => match map.get("questions") {
            Some(Value::Array(entries)) => entries,
            _ => {
                return Err(MetadataError::question(
                    None,
                    "payload object has no 'questions' list",
                ));
            }
        },
        _ => {
            return Err(MetadataError::question(
                None,
                "payload must be a list of questions",
            ));
        }
    };

    let raw_questions = entries
        .iter()
        .map(|entry| {
            RawQuestion::deserialize(entry).map_err(|source| MetadataError::Decode { source })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let pages = page_ranks(&raw_questions);
    let mut questions = Vec::with_capacity(raw_questions.len());
    for (index, raw) in raw_questions.into_iter().enumerate() {
        let page_number = pages.get(&raw.page_id).copied().unwrap_or(1);
        let question = parse_question(raw, index + 1, page_number, opts)?;
        tracing::debug!(
            question_id = question.id,
            position = question.position,
            platform_type = %question.platform_type,
            groups = question.groups.len(),
            "parsed question"
        );
        questions.push(question);
    }

    Ok(SurveyMetadata { questions })
}

/// Parse metadata from JSON text.
pub fn parse_metadata_str(text: &str, opts: &ParseOptions) -> Result<SurveyMetadata, MetadataError> {
    let payload: Value =
        serde_json::from_str(text).map_err(|source| MetadataError::Decode { source })?;
    parse_metadata(&payload, opts)
}

fn page_ranks(questions: &[RawQuestion]) -> BTreeMap<Option<i64>, usize> {
    questions
        .iter()
        .map(|question| question.page_id)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .enumerate()
        .map(|(rank, page_id)| (page_id, rank + 1))
        .collect()
}

fn parse_question(
    raw: RawQuestion,
    position: usize,
    page_number: usize,
    opts: &ParseOptions,
) -> Result<Question, MetadataError> {
    let id = raw
        .id
        .ok_or_else(|| MetadataError::question(None, format!("question at position {position} has no id")))?;
    let platform_type = raw
        .kind
        .filter(|kind| !kind.trim().is_empty())
        .map(PlatformType::from)
        .ok_or_else(|| MetadataError::question(Some(id), "question has no type"))?;
    let raw_groups = raw
        .groups
        .filter(|groups| !groups.is_empty())
        .ok_or_else(|| MetadataError::question(Some(id), "question has no groups"))?;

    let mut seen = BTreeSet::new();
    let mut groups = Vec::with_capacity(raw_groups.len());
    for (index, raw_group) in raw_groups.into_iter().enumerate() {
        let group = parse_group(raw_group, id, index, &platform_type, opts)?;
        for varname in &group.varnames {
            if !seen.insert(varname.clone()) {
                return Err(MetadataError::group(
                    Some(id),
                    index,
                    format!("varname '{varname}' appears more than once in the question"),
                ));
            }
        }
        groups.push(group);
    }

    Ok(Question {
        id,
        platform_type,
        text: text_of(&raw.question, opts).unwrap_or_default(),
        position,
        relative_position: raw.position,
        page_number,
        groups,
    })
}

fn parse_group(
    raw: RawGroup,
    question_id: i64,
    index: usize,
    platform_type: &PlatformType,
    opts: &ParseOptions,
) -> Result<Group, MetadataError> {
    let malformed = |reason: String| MetadataError::group(Some(question_id), index, reason);

    let varnames = raw
        .varnames
        .ok_or_else(|| malformed("group has no 'varnames' field".to_string()))?
        .into_iter()
        .map(|scalar| {
            scalar
                .0
                .map(|name| name.trim().to_string())
                .filter(|name| !name.is_empty())
                .map(Varname::new)
                .ok_or_else(|| malformed("group contains a blank varname".to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if varnames.is_empty() {
        return Err(malformed("group declares no varnames".to_string()));
    }

    if !raw.items.is_empty() && raw.items.len() != varnames.len() {
        return Err(malformed(format!(
            "group declares {} items for {} varnames",
            raw.items.len(),
            varnames.len()
        )));
    }

    let codes: Vec<String> = raw
        .codes
        .into_iter()
        .map(|code| code.0.map(|code| code.trim().to_string()).unwrap_or_default())
        .collect();
    let has_codes = codes.iter().any(|code| !code.is_empty());
    if has_codes && codes.len() != raw.labels.len() {
        return Err(malformed(format!(
            "group declares {} codes for {} labels",
            codes.len(),
            raw.labels.len()
        )));
    }

    match platform_type {
        PlatformType::Choice if varnames.len() > 1 && raw.labels.len() != varnames.len() => {
            return Err(malformed(format!(
                "choice group declares {} labels for {} varnames",
                raw.labels.len(),
                varnames.len()
            )));
        }
        PlatformType::Matrix if raw.items.len() != varnames.len() => {
            return Err(malformed(format!(
                "matrix group declares {} statements for {} varnames",
                raw.items.len(),
                varnames.len()
            )));
        }
        _ => {}
    }

    let items = raw
        .items
        .into_iter()
        .map(|item| parse_item(item, opts).map_err(&malformed))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Group {
        index,
        name: text_of(&raw.name, opts),
        varnames,
        items,
        labels: raw
            .labels
            .iter()
            .map(|label| Label {
                text: text_of(label, opts),
            })
            .collect(),
        codes,
        input_type: parse_input_type(raw.input_type.as_deref()).map_err(&malformed)?,
        range: parse_range(raw.range).map_err(&malformed)?,
    })
}

fn parse_item(raw: RawItem, opts: &ParseOptions) -> Result<Item, String> {
    Ok(Item {
        id: raw.id.0.filter(|id| !id.trim().is_empty()),
        name: text_of(&raw.name, opts),
        input_type: parse_input_type(raw.input_type.as_deref())?,
        range: parse_range(raw.range)?,
    })
}

fn parse_input_type(raw: Option<&str>) -> Result<Option<InputKind>, String> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => InputKind::from_str(value).map(Some),
    }
}

fn parse_range(raw: RawRange) -> Result<Option<NumericRange>, String> {
    match raw {
        RawRange::Absent => Ok(None),
        RawRange::Bounds { min, max } if min <= max => Ok(Some(NumericRange::new(min, max))),
        RawRange::Bounds { min, max } => Err(format!("range minimum {min} exceeds maximum {max}")),
        RawRange::Invalid(value) => Err(format!("unreadable range {value}")),
    }
}

fn text_of(text: &LangText, opts: &ParseOptions) -> Option<String> {
    text.resolve(&opts.language).map(|text| text.trim().to_string())
}
