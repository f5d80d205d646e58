use rusqlite::Error as RusqliteError;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NamePulseError {
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("Database error: {0}")]
    DatabaseError(#[from] RusqliteError),

    #[error("Schema migration to version {version} failed: {source}")]
    Migration {
        version: u32,
        #[source]
        source: RusqliteError,
    },

    #[error("Database schema version {found} is newer than the latest supported version {latest}")]
    SchemaTooNew { found: u32, latest: u32 },

    #[error("Configuration error: {0}")]
    ConfigError(#[from] Box<figment::Error>),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Error: {0}")]
    Error(String),
}
