use thiserror::Error;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("invalid mapping header: {0:?}")]
    InvalidHeader(String),

    #[error("duplicate namespace: {0}")]
    DuplicateNamespace(String),

    #[error("unknown namespace: {0}")]
    UnknownNamespace(String),

    #[error("line {line}: missing primary-namespace name")]
    MissingPrimaryName { line: usize },
}
