use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    #[error("seed not found: {0}")]
    NotFound(String),

    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("collaborator error: {0}")]
    Collaborator(String),
}

impl From<hoard_contracts::error::ContractError> for ImportError {
    fn from(err: hoard_contracts::error::ContractError) -> Self {
        ImportError::Collaborator(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
