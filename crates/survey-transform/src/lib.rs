//! Result transformation for survey waves.
//!
//! Raw rows pass through filtering, choice decoding, other-answer
//! splitting and type validation against a schema. Rows that fail are
//! reported, never loaded. Validated or committed rows can be exported as
//! a polars DataFrame.

mod error;
mod frame;
mod stages;

// === Errors ===
pub use error::{FrameError, RowError};

// === Stages ===
pub use stages::{
    FilterOutcome, StagedRow, TransformOutcome, cast_and_validate, decode_row, filter_rows,
    split_other, transform_results,
};

// === Export ===
pub use frame::{LOAD_COUNTER_COLUMN, RESPONDENT_COLUMNS, committed_frame, validated_frame};
