use std::path::PathBuf;
use thiserror::Error;

use crate::types::PresentationState;

/// Error type for presentation construction and proof generation.
///
/// Tamper and proof-validity outcomes of `verify` are reported through the
/// `VerificationReport`, never through this type.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum PresentationError {
    #[error("credential error: {0}")]
    Credential(#[from] heimdall_cred::CredErrorDetail),

    #[error("core error: {0}")]
    Core(#[from] heimdall_core::CoreError),

    #[error("requested expiration {requested} exceeds credential expiration {credential}")]
    ExpirationExceedsCredential { requested: u64, credential: u64 },

    #[error("no attribute selected for disclosure")]
    EmptyDisclosure,

    #[error("{requested} disclosures requested, at most {max} supported")]
    UnsupportedDisclosureCount { requested: usize, max: usize },

    #[error("attribute index {index} out of range for {attributes} attributes")]
    DisclosureIndexOutOfRange { index: usize, attributes: usize },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("presentation is {actual}, expected {expected}")]
    InvalidState {
        expected: PresentationState,
        actual: PresentationState,
    },

    #[error("witness unavailable")]
    WitnessUnavailable,

    #[error("oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("expected {expected} public signals, got {actual}")]
    MalformedPublicSignals { expected: usize, actual: usize },

    #[error("self-check failed: {}", failed.join(", "))]
    SelfCheckFailed { failed: Vec<String> },

    #[error("unsupported presentation type: {0}")]
    UnsupportedPresentationType(String),

    #[error("presentation content does not match its type: {0}")]
    ContentMismatch(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type PresentationResult<T> = Result<T, PresentationError>;

impl From<serde_json::Error> for PresentationError {
    fn from(e: serde_json::Error) -> Self {
        PresentationError::Serialization(e.to_string())
    }
}

/// Error type for proving and verification backends.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OracleError {
    #[error("circuit artifact missing: {}", .0.display())]
    MissingArtifact(PathBuf),

    #[error("backend failed: {0}")]
    Backend(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed backend output: {0}")]
    MalformedOutput(String),
}

pub type OracleResult<T> = Result<T, OracleError>;

impl From<serde_json::Error> for OracleError {
    fn from(e: serde_json::Error) -> Self {
        OracleError::MalformedOutput(e.to_string())
    }
}
