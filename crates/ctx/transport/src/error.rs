//! Transport errors.

use std::time::Duration;

use thiserror::Error;

use crate::endpoint::Endpoint;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Endpoint unreachable: {0}")]
    Unreachable(Endpoint),

    #[error("No reply within {0:?}")]
    Timeout(Duration),

    #[error("Connection closed by {0} before a reply")]
    Closed(Endpoint),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Message exceeds {0} bytes")]
    MessageTooLarge(usize),

    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("No discoverer answered after {attempts} attempts")]
    LookupExhausted { attempts: u32 },
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        TransportError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::Codec(err.to_string())
    }
}

pub type TransportResult<T> = Result<T, TransportError>;
