use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("invalid uuid: {0}")]
    InvalidUuid(#[from] uuid::Error),
}
