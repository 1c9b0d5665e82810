//! DataFrame export of validated and committed rows.
//!
//! Columns follow schema order. Respondent metadata comes first, then
//! `load_counter` for committed rows, then one typed column per variable.

use polars::prelude::{Column, DataFrame, NamedFrom, Series};

use survey_model::{CommittedRow, DataKind, RespondentMeta, Schema, ValidatedRow};

use crate::error::FrameError;

/// Column holding the wave a committed row was loaded in.
pub const LOAD_COUNTER_COLUMN: &str = "load_counter";

/// Respondent metadata columns, in frame order.
pub const RESPONDENT_COLUMNS: [&str; 7] = [
    "respondent_id",
    "completed",
    "finished",
    "duration",
    "start",
    "end",
    "date",
];

fn respondent_field(meta: &RespondentMeta, column: usize) -> Option<String> {
    let field = match column {
        0 => &meta.id,
        1 => &meta.completed,
        2 => &meta.finished,
        3 => &meta.duration,
        4 => &meta.start,
        5 => &meta.end,
        _ => &meta.date,
    };
    field.clone()
}

fn build_columns(rows: &[&ValidatedRow], schema: &Schema) -> Vec<Column> {
    let mut columns: Vec<Column> = Vec::with_capacity(RESPONDENT_COLUMNS.len() + schema.len());
    for (index, name) in RESPONDENT_COLUMNS.iter().enumerate() {
        let values: Vec<Option<String>> = rows
            .iter()
            .map(|row| respondent_field(&row.respondent, index))
            .collect();
        columns.push(Series::new((*name).into(), values).into());
    }
    for variable in schema.variables() {
        let name = variable.name.as_str();
        let column: Column = match variable.kind {
            DataKind::Boolean => {
                let values: Vec<Option<bool>> = rows
                    .iter()
                    .map(|row| row.get(name).and_then(|value| value.as_bool()))
                    .collect();
                Series::new(name.into(), values).into()
            }
            DataKind::Integer => {
                let values: Vec<Option<i64>> = rows
                    .iter()
                    .map(|row| row.get(name).and_then(|value| value.as_i64()))
                    .collect();
                Series::new(name.into(), values).into()
            }
            DataKind::String => {
                let values: Vec<Option<String>> = rows
                    .iter()
                    .map(|row| {
                        row.get(name)
                            .and_then(|value| value.as_text())
                            .map(str::to_string)
                    })
                    .collect();
                Series::new(name.into(), values).into()
            }
        };
        columns.push(column);
    }
    columns
}

/// Build a frame of validated rows.
pub fn validated_frame(rows: &[ValidatedRow], schema: &Schema) -> Result<DataFrame, FrameError> {
    let rows: Vec<&ValidatedRow> = rows.iter().collect();
    Ok(DataFrame::new(build_columns(&rows, schema))?)
}

/// Build a frame of committed rows, with a leading `load_counter` column.
pub fn committed_frame(rows: &[CommittedRow], schema: &Schema) -> Result<DataFrame, FrameError> {
    let counters: Vec<u64> = rows.iter().map(|row| row.load_counter).collect();
    let validated: Vec<&ValidatedRow> = rows.iter().map(|row| &row.row).collect();
    let mut columns: Vec<Column> = Vec::with_capacity(1 + RESPONDENT_COLUMNS.len() + schema.len());
    columns.push(Series::new(LOAD_COUNTER_COLUMN.into(), counters).into());
    columns.extend(build_columns(&validated, schema));
    Ok(DataFrame::new(columns)?)
}
