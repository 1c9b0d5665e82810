use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("duplicate variable name '{name}' in schema")]
    DuplicateName { name: String },
}

pub type Result<T> = std::result::Result<T, SchemaError>;
