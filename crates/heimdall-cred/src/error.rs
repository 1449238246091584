use std::fmt;
use thiserror::Error;

/// Error kinds for the credential and registry layer.
/// Display strings never carry key material or signature internals.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredError {
    #[error("malformed credential: {0}")]
    MalformedCredential(String),

    #[error("meta attribute {0} must be numeric")]
    NonNumericMeta(&'static str),

    #[error("index {index} out of range for {len} leaves")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{leaves} leaves exceed tree capacity {capacity}")]
    CapacityExceeded { leaves: usize, capacity: usize },

    #[error("invalid tree depth {0}")]
    InvalidDepth(usize),

    #[error("inconsistent tree snapshot: {0}")]
    InconsistentSnapshot(String),

    #[error("credential outside revocation registry")]
    OutsideRegistry,

    #[error("hashing failed")]
    HashFailed,

    #[error("signing failed")]
    SigningFailed,

    #[error("encoding failed")]
    EncodingFailed,
}

/// Structured error with a CredError kind and a safe message.
#[derive(Debug, Clone)]
pub struct CredErrorDetail {
    pub kind: CredError,
    pub message: String,
    pub credential_id: Option<u64>,
}

impl fmt::Display for CredErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(id) = self.credential_id {
            write!(f, " (credential: {})", id)?;
        }
        Ok(())
    }
}

impl std::error::Error for CredErrorDetail {}

impl CredErrorDetail {
    pub fn new(kind: CredError, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            credential_id: None,
        }
    }

    pub fn with_credential_id(mut self, id: u64) -> Self {
        self.credential_id = Some(id);
        self
    }
}

impl From<CredError> for CredErrorDetail {
    fn from(kind: CredError) -> Self {
        let message = kind.to_string();
        Self {
            kind,
            message,
            credential_id: None,
        }
    }
}

impl From<heimdall_core::CoreError> for CredErrorDetail {
    fn from(err: heimdall_core::CoreError) -> Self {
        use heimdall_core::CoreError;
        let kind = match err {
            CoreError::Hash(_) => CredError::HashFailed,
            // Signer errors may describe the key; keep them out of the message
            CoreError::Signing(_) | CoreError::InvalidSecretKey(_) => {
                return Self::new(CredError::SigningFailed, "signer rejected the request")
            }
            CoreError::InvalidFieldElement(_) | CoreError::Serialization(_) => {
                CredError::EncodingFailed
            }
        };
        Self::new(kind, err.to_string())
    }
}

pub type CredResult<T> = Result<T, CredErrorDetail>;
