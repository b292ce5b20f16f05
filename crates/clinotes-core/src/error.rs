use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("remote error: {0}")]
    Remote(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("a sync is already in progress")]
    Busy,

    #[error("internal error: {0}")]
    Internal(String),
}
