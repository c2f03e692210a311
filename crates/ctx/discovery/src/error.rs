//! Discovery errors and their protocol codes.

use ctx_query::QueryError;
use ctx_registry::RegistryError;
use ctx_transport::TransportError;
use ctx_types::{ComponentId, DecodeError, ErrorCode, SubscriptionId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiscoveryError {
    #[error("Message addressed to {found}, this discoverer is {expected}")]
    InvalidId {
        expected: ComponentId,
        found: ComponentId,
    },

    #[error("Invalid data: {0}")]
    InvalidData(#[from] DecodeError),

    #[error("Invalid attribute: {0}")]
    InvalidAttribute(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(#[from] QueryError),

    #[error("Message carries no query")]
    EmptyQuery,

    #[error("Unknown component: {0}")]
    UnknownComponent(ComponentId),

    #[error("Unknown subscription: {0}")]
    UnknownSubscriber(SubscriptionId),

    #[error("Unknown callback: {0}")]
    UnknownCallback(String),

    #[error("Unknown query cursor: {0}")]
    QueryNotFound(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Discovery log error: {0}")]
    Log(String),
}

impl DiscoveryError {
    /// Code carried in the protocol reply.
    pub fn code(&self) -> ErrorCode {
        match self {
            DiscoveryError::InvalidId { .. } => ErrorCode::InvalidId,
            DiscoveryError::InvalidData(_) => ErrorCode::InvalidData,
            DiscoveryError::InvalidAttribute(_) => ErrorCode::InvalidAttribute,
            DiscoveryError::InvalidQuery(_) => ErrorCode::InvalidQuery,
            DiscoveryError::EmptyQuery => ErrorCode::EmptyQuery,
            DiscoveryError::UnknownComponent(_) => ErrorCode::UnknownComponent,
            DiscoveryError::UnknownSubscriber(_) => ErrorCode::UnknownSubscriber,
            DiscoveryError::UnknownCallback(_) => ErrorCode::UnknownCallback,
            DiscoveryError::QueryNotFound(_) => ErrorCode::QueryNotFound,
            DiscoveryError::Transport(_) | DiscoveryError::Log(_) => ErrorCode::IoError,
        }
    }
}

impl From<RegistryError> for DiscoveryError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::ComponentNotFound(id) => DiscoveryError::UnknownComponent(id),
            RegistryError::ConstantAttribute { .. } => {
                DiscoveryError::InvalidAttribute(err.to_string())
            }
            RegistryError::InvalidDescription(reason) => {
                DiscoveryError::InvalidData(DecodeError::InvalidValue {
                    field: "component".to_string(),
                    value: reason,
                })
            }
            RegistryError::Storage(reason) => DiscoveryError::Log(reason),
        }
    }
}

pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
