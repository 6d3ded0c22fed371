use thiserror::Error;

/// Type system invariant violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TypeError {
    #[error("Unknown type: {0}")]
    UnknownType(String),
    #[error("Name already registered: {0}")]
    DuplicateName(String),
    #[error("Not a structure type: {0}")]
    NotAStructure(String),
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),
}

pub type Result<T> = std::result::Result<T, TypeError>;
