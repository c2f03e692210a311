//! Lease errors.

use ctx_transport::TransportError;
use ctx_types::{ComponentId, DecodeError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LeaseError {
    #[error("No lease held by {0}")]
    NotLeased(ComponentId),

    #[error("Unexpected reply '{0}'")]
    UnexpectedReply(String),

    #[error("Reply names {found}, expected {expected}")]
    WrongComponent {
        expected: ComponentId,
        found: ComponentId,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),
}

pub type LeaseResult<T> = Result<T, LeaseError>;
