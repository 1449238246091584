use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid field element: {0}")]
    InvalidFieldElement(String),

    #[error("hash error: {0}")]
    Hash(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("invalid secret key: {0}")]
    InvalidSecretKey(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serialization(e.to_string())
    }
}
