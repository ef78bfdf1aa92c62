use thiserror::Error;

use crate::models::RecordId;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{label} not found")]
    NotFound { label: &'static str, id: RecordId },

    #[error("{0}")]
    Invalid(String),

    /// An object is already stored under this key.
    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Message from the hosted service, kept verbatim.
    #[error("{0}")]
    Remote(String),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Remote(err.to_string())
    }
}
