//! Database error types.

use std::path::PathBuf;

use thiserror::Error;
use vcow_immutable::DurableError;

/// Database error type.
#[derive(Debug, Error)]
pub enum DbError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The root value could not be encoded, or a transaction failed.
    #[error("durable value error: {0}")]
    Durable(#[from] DurableError),

    /// The encoded root does not fit in one slot.
    #[error("root block of {size} bytes exceeds the maximum of {max}")]
    BlockTooLarge { size: usize, max: usize },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// `create_new` found a file already at the path.
    #[error("database file already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    /// The file cannot be used as a database.
    #[error("cannot use {} as a database: {reason}", path.display())]
    Unusable { path: PathBuf, reason: String },

    /// Neither slot holds a valid root block.
    #[error("no valid root block in {}", .0.display())]
    NoValidRootBlock(PathBuf),

    /// The database is not open.
    #[error("database is not open")]
    NotOpen,
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;
