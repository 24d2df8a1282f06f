// src/proxy/error.rs
use crate::serial::TaskError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// Custom error type for leasing operations. Running out of endpoints is not
// an error: it surfaces as `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Transport error: {0}")]
    Transport(#[source] BoxError),

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Lease selection task failed: {0}")]
    Task(#[from] TaskError),

    #[error("Provider error: {0}")]
    Provider(String),
}

impl ProxyError {
    pub fn transport<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        ProxyError::Transport(err.into())
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ProxyError::Transport(_))
    }
}
