use crate::model::ModelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("exceeded max tool iterations ({0})")]
    IterationCapExceeded(u32),
}

impl Error {
    /// HTTP-style status for the chat-turn boundary.
    pub fn status(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Model(_) | Self::IterationCapExceeded(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
