use std::path::PathBuf;

use thiserror::Error;

/// Top-level error for the heimdall binary, aggregating the errors of the
/// library crates.
#[derive(Debug, Error)]
pub enum RootError {
    #[error("core error: {0}")]
    Core(#[from] heimdall_core::CoreError),

    #[error("credential error: {0}")]
    Credential(#[from] heimdall_cred::CredErrorDetail),

    #[error("presentation error: {0}")]
    Presentation(#[from] heimdall_proof::PresentationError),

    #[error("oracle did not answer within {0}s")]
    OracleTimeout(u64),

    #[error("presentation rejected: {}", .0.join(", "))]
    Rejected(Vec<String>),

    #[error("missing file: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RootError {
    fn from(e: serde_json::Error) -> Self {
        RootError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for RootError {
    fn from(e: toml::de::Error) -> Self {
        RootError::Config(format!("TOML parse error: {}", e))
    }
}

pub type RootResult<T> = Result<T, RootError>;
