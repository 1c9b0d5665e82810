//! Survey data ingestion.
//!
//! Turns the survey platform's raw exports into typed values:
//!
//! - **Metadata parsing**: nested question payloads become the
//!   `Question -> Group -> {Varname, Item, Label}` graph
//! - **Results decoding**: the results CSV becomes one [`ResponseRow`] per
//!   respondent
//! - **Sources**: the [`SurveySource`] collaborator and a directory-backed
//!   implementation
//!
//! [`ResponseRow`]: survey_model::ResponseRow

mod error;
mod parser;
mod payload;
mod results;
mod source;

// === Error Types ===
pub use error::{FetchError, MetadataError};

// === Metadata ===
pub use parser::{DEFAULT_LANGUAGE, ParseOptions, parse_metadata, parse_metadata_str};

// === Results ===
pub use results::{is_answer_column, parse_results_csv};

// === Sources ===
pub use source::{
    DirectorySource, METADATA_FILE, RESULTS_CSV_FILE, RESULTS_JSON_FILE, SurveySource,
};
