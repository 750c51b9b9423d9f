use std::fmt;

use starfall_core::{ConfigurationError, PersistenceError};

#[derive(Debug)]
pub enum StoreError {
    Sqlite(rusqlite::Error),
    Io(std::io::Error),
    Config(toml::de::Error),
    Catalog(ConfigurationError),
    InvalidData(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Sqlite(e) => write!(f, "SQLite error: {e}"),
            StoreError::Io(e) => write!(f, "I/O error: {e}"),
            StoreError::Config(e) => write!(f, "invalid config: {e}"),
            StoreError::Catalog(e) => write!(f, "invalid point catalog: {e}"),
            StoreError::InvalidData(msg) => write!(f, "invalid data: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Sqlite(e)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<toml::de::Error> for StoreError {
    fn from(e: toml::de::Error) -> Self {
        StoreError::Config(e)
    }
}

impl From<ConfigurationError> for StoreError {
    fn from(e: ConfigurationError) -> Self {
        StoreError::Catalog(e)
    }
}

impl From<StoreError> for PersistenceError {
    fn from(e: StoreError) -> Self {
        PersistenceError::Backend(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
