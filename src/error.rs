use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("not found")]
    NotFound,

    /// A UNIQUE constraint rejected a write. `field` is the offending column.
    #[error("duplicate value for {field}")]
    UniqueViolation { field: String },

    #[error("session lookup collision")]
    SessionLookupCollision,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to connect to store: {0}")]
    Connection(String),

    #[error("hashing error: {0}")]
    Hash(String),

    #[error("invalid session token format")]
    InvalidTokenFormat,

    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("billing provider error: {0}")]
    Billing(String),
}

pub type Result<T> = std::result::Result<T, Error>;
