//! Question type inference and schema building.
//!
//! Classification is structural: a question's type follows from its
//! platform type and the varname count of each group. Each classified
//! question yields one [`Variable`] per output column, named
//! `Q<position>` or `Q<position>_<suffix>`, and the builder assembles them
//! into one [`Schema`].
//!
//! [`Variable`]: survey_model::Variable
//! [`Schema`]: survey_model::Schema

mod builder;
mod classify;
mod error;
mod inference;
mod naming;

pub use builder::build_schema;
pub use classify::{QuestionShape, classify_question, infer_question_type};
pub use error::{InferenceError, NamingError};
pub use inference::infer_question;
pub use naming::{
    CachedNamer, NamingContext, NoopNamer, PinnedNames, SuggestionTable, VariableNamer,
    sanitize_suggestion, slugify, transliterate,
};
