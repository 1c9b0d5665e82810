//! Results CSV decoding into response rows.

use std::collections::BTreeMap;

use survey_model::{RespondentMeta, ResponseRow};

use crate::error::FetchError;

/// Where a results column ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnRole {
    Id,
    Completed,
    Finished,
    Duration,
    Start,
    End,
    Date,
    Answer,
    Ignored,
}

fn column_role(header: &str) -> ColumnRole {
    match header {
        "vID" => ColumnRole::Id,
        "vCOMPLETED" => ColumnRole::Completed,
        "vFINISHED" => ColumnRole::Finished,
        "vDURATION" => ColumnRole::Duration,
        "vSTART" => ColumnRole::Start,
        "vEND" => ColumnRole::End,
        "vDATE" => ColumnRole::Date,
        _ if is_answer_column(header) => ColumnRole::Answer,
        _ => ColumnRole::Ignored,
    }
}

/// Answer slots are `V` followed by a digit (`V12`, `V11.1`).
pub fn is_answer_column(header: &str) -> bool {
    let mut chars = header.chars();
    chars.next() == Some('V') && chars.next().is_some_and(|c| c.is_ascii_digit())
}

/// Decode the platform's results CSV.
///
/// System columns become [`RespondentMeta`]; `V<digit>` columns become
/// answers keyed by varname; everything else (`vANONYM`, `vLANG`,
/// page timings, quotas) is dropped.
pub fn parse_results_csv(text: &str) -> Result<Vec<ResponseRow>, FetchError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());
    let headers: Vec<(String, ColumnRole)> = reader
        .headers()?
        .iter()
        .map(|header| {
            let header = header.trim().to_string();
            let role = column_role(&header);
            (header, role)
        })
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut respondent = RespondentMeta::default();
        let mut answers = BTreeMap::new();
        for ((header, role), value) in headers.iter().zip(record.iter()) {
            let value = value.to_string();
            let slot = match role {
                ColumnRole::Id => &mut respondent.id,
                ColumnRole::Completed => &mut respondent.completed,
                ColumnRole::Finished => &mut respondent.finished,
                ColumnRole::Duration => &mut respondent.duration,
                ColumnRole::Start => &mut respondent.start,
                ColumnRole::End => &mut respondent.end,
                ColumnRole::Date => &mut respondent.date,
                ColumnRole::Answer => {
                    answers.insert(header.clone(), value);
                    continue;
                }
                ColumnRole::Ignored => continue,
            };
            *slot = Some(value).filter(|value| !value.trim().is_empty());
        }
        rows.push(ResponseRow {
            respondent,
            answers,
        });
    }

    let ignored = headers
        .iter()
        .filter(|(_, role)| *role == ColumnRole::Ignored)
        .count();
    tracing::debug!(rows = rows.len(), columns = headers.len(), ignored, "decoded results CSV");
    Ok(rows)
}
