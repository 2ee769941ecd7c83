use thiserror::Error;

/// Error surfaced by a collaborator trait call. Importers convert this into
/// a `SeedStatus::Failed` note at the point of the call; they never match on
/// its variants, so this stays deliberately coarse.
#[derive(Error, Debug)]
pub enum ContractError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("collaborator error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ContractError>;
