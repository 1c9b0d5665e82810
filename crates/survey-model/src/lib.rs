pub mod error;
pub mod metadata;
pub mod question_type;
pub mod report;
pub mod row;
pub mod schema;
pub mod variable;

pub use error::{Result, SchemaError};
pub use metadata::{
    Group, InputKind, Item, Label, NumericRange, PlatformType, Question, SurveyMetadata, Varname,
};
pub use question_type::QuestionType;
pub use report::{RejectionKind, RowRejection, TransformReport};
pub use row::{CellValue, CommittedRow, RespondentMeta, ResponseRow, ValidatedRow};
pub use schema::{Schema, SchemaDiff, VariableChange};
pub use variable::{Choice, DataKind, ValueDomain, Variable, VariableRole, VariableSignature};
