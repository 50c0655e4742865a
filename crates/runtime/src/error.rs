use std::time::Duration;

use thiserror::Error;

use crate::model::ModelError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The tool server could not be reached, or the channel to it broke.
    #[error("connection error")]
    Connection(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("model did not respond within {0:?}")]
    Timeout(Duration),

    #[error("model still requested tools after {rounds} rounds")]
    LoopLimitExceeded { rounds: usize },
}

impl From<mcp::Error> for Error {
    fn from(error: mcp::Error) -> Self {
        Self::Connection(Box::new(error))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
