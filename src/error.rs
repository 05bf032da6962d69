//! Error types shared across the crate.

use thiserror::Error;

use crate::config::ConfigError;

/// Failures while reading time-series CSV data or wiring it into modules.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("cannot read \"{path}\": {source}")]
    Csv {
        path: String,
        #[source]
        source: csv::Error,
    },

    #[error("\"{path}\": missing column \"{column}\"")]
    MissingColumn { path: String, column: String },

    #[error("\"{path}\" row {row}: cannot parse \"{value}\" in column \"{column}\" as a number")]
    Parse {
        path: String,
        row: usize,
        column: String,
        value: String,
    },

    #[error("\"{path}\": no data rows")]
    Empty { path: String },

    #[error("grid \"{grid}\": {message}")]
    Grid { grid: String, message: String },
}

/// Failures of the SQLite persistence layer.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("failed to create database directory \"{path}\": {source}")]
    CreateDir {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database mutex poisoned")]
    Poisoned,
}

/// Failures while posting state to the HTTP endpoint.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("http client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Umbrella error for the dispatch loop.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    /// Every violation found in the scenario.
    #[error("invalid configuration: {}", join_errors(.0))]
    Config(Vec<ConfigError>),
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
