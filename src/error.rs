use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("vector database not found: {path}")]
    NotFound { path: PathBuf },

    #[error(
        "embedding model mismatch: database was generated with `{stored}` but the active model is `{active}`; re-generate the database or switch models"
    )]
    IncompatibleModel { stored: String, active: String },

    #[error("malformed record `{id}`: {reason}")]
    MalformedRecord { id: String, reason: String },

    #[error("embedding dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("embedding model error: {0}")]
    Model(String),

    #[error("data directory does not exist and could not be created: {0}")]
    DataDir(PathBuf),
}

impl Error {
    pub(crate) fn malformed(id: &str, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            id: id.to_string(),
            reason: reason.into(),
        }
    }
}
