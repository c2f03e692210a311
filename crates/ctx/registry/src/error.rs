//! Registry error types

use ctx_types::ComponentId;
use thiserror::Error;

/// Registry errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Component not found: {0}")]
    ComponentNotFound(ComponentId),

    #[error("Attribute '{name}' of {id} is constant and cannot be updated")]
    ConstantAttribute { id: ComponentId, name: String },

    #[error("Invalid description: {0}")]
    InvalidDescription(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
