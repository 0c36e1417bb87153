//! Error types for Attune.

use thiserror::Error;

use crate::profile::ProfileKind;

/// Attune error type.
#[derive(Error, Debug)]
pub enum Error {
    /// Edit path could not be parsed
    #[error("invalid edit path: {0}")]
    InvalidPath(String),

    /// Edit value does not fit the addressed field
    #[error("invalid edit: {0}")]
    InvalidEdit(String),

    /// Section id is not part of the profile
    #[error("unknown section '{id}' in {kind} profile")]
    UnknownSection { kind: ProfileKind, id: String },

    /// Built-in entries can be toggled but never deleted
    #[error("built-in entry cannot be deleted: {0}")]
    Protected(String),

    /// Snapshot store write or read failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Deployment collaborator rejected the documents or was unreachable
    #[error("deploy failed: {0}")]
    Deploy(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML serialization error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for Attune.
pub type Result<T> = std::result::Result<T, Error>;
