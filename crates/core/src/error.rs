use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    #[error("comparison failed: {0}")]
    Comparison(String),

    #[error("digest failed: {0}")]
    Digest(String),

    #[error("invalid data: {0}")]
    InvalidData(String),
}
